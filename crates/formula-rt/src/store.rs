//! The external mutable store that mutation functions write to.
//!
//! The engine never owns table data: tables live behind [`MutableStore`],
//! injected by the host. [`InMemoryStore`] is the reference implementation.
//!
//! ## Semantics
//!
//! - Every write to one table is serialized; concurrent writers see each
//!   other's results in lock order and the last write wins.
//! - Cancellation is checked after the table lock is acquired and before
//!   anything changes. There is no await between that check and the write.
//! - A failed operation changes nothing.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use formula_common::error::ErrorKind;
use formula_typeck::ty::TableType;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::cancel::CancellationSignal;
use crate::value::{ExpressionError, RecordValue, TableValue};

/// Store result type
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("no row in {table} matches the selector")]
    NotFound { table: String },

    #[error("table {0} is read-only")]
    ReadOnly(String),

    #[error("conflicting write to {0}")]
    Conflict(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// The expression error kind this store failure surfaces as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::TableNotFound(_) | StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::ReadOnly(_) => ErrorKind::ReadOnlyValue,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Cancelled => ErrorKind::Timeout,
            StoreError::Backend(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for ExpressionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => ExpressionError::cancelled(),
            other => ExpressionError::new(other.kind(), other.to_string()),
        }
    }
}

/// Table storage the mutation functions operate on.
#[async_trait]
pub trait MutableStore: Send + Sync + fmt::Debug {
    /// Merge `changes` (left to right) into the first row matching
    /// `selector` and return the updated row.
    async fn update_by_selector(
        &self,
        table: &str,
        selector: &RecordValue,
        changes: &[RecordValue],
        cancel: &CancellationSignal,
    ) -> Result<RecordValue>;

    /// Append rows and return the table as it is after the append.
    async fn append(
        &self,
        table: &str,
        rows: &[RecordValue],
        cancel: &CancellationSignal,
    ) -> Result<TableValue>;

    /// Remove the first row matching each record. Either every record finds
    /// a row and all of them are removed, or nothing is removed.
    async fn remove(
        &self,
        table: &str,
        rows: &[RecordValue],
        cancel: &CancellationSignal,
    ) -> Result<()>;

    /// Remove every row.
    async fn clear(&self, table: &str, cancel: &CancellationSignal) -> Result<()>;

    /// Current contents of a table, tagged with its source name.
    async fn snapshot(&self, table: &str) -> Result<TableValue>;
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

struct StoredTable {
    ty: TableType,
    read_only: bool,
    rows: tokio::sync::Mutex<Vec<RecordValue>>,
}

/// A process-local store.
///
/// The table map is guarded by a parking_lot RwLock that is only held long
/// enough to clone a table handle; row data sits behind a per-table tokio
/// Mutex so writers to one table queue up without blocking other tables.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<FxHashMap<String, Arc<StoredTable>>>,
    commits: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a writable table.
    pub fn insert_table(&self, name: impl Into<String>, ty: TableType, rows: Vec<RecordValue>) {
        self.insert(name.into(), ty, rows, false);
    }

    /// Create or replace a table every write to which fails with
    /// [`StoreError::ReadOnly`].
    pub fn insert_read_only_table(
        &self,
        name: impl Into<String>,
        ty: TableType,
        rows: Vec<RecordValue>,
    ) {
        self.insert(name.into(), ty, rows, true);
    }

    fn insert(&self, name: String, ty: TableType, rows: Vec<RecordValue>, read_only: bool) {
        let rows = rows
            .into_iter()
            .map(|row| row.conform_to(ty.element()))
            .collect();
        let table = StoredTable {
            ty,
            read_only,
            rows: tokio::sync::Mutex::new(rows),
        };
        self.tables.write().insert(name, Arc::new(table));
    }

    /// Number of successful writes so far, across all tables.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn table(&self, name: &str) -> Result<Arc<StoredTable>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn writable(&self, name: &str) -> Result<Arc<StoredTable>> {
        let table = self.table(name)?;
        if table.read_only {
            return Err(StoreError::ReadOnly(name.to_string()));
        }
        Ok(table)
    }

    fn committed(&self, table: &str, op: &str) {
        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!(table, op, "store commit");
    }
}

fn check_cancel(table: &str, cancel: &CancellationSignal) -> Result<()> {
    if cancel.is_cancelled() {
        debug!(table, "cancelled before commit");
        return Err(StoreError::Cancelled);
    }
    Ok(())
}

#[async_trait]
impl MutableStore for InMemoryStore {
    async fn update_by_selector(
        &self,
        table: &str,
        selector: &RecordValue,
        changes: &[RecordValue],
        cancel: &CancellationSignal,
    ) -> Result<RecordValue> {
        let stored = self.writable(table)?;
        let mut rows = stored.rows.lock().await;
        check_cancel(table, cancel)?;

        let row = rows
            .iter_mut()
            .find(|row| row.matches(selector))
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
            })?;
        for change in changes {
            row.merge(change);
        }
        let updated = row.clone();
        self.committed(table, "update");
        Ok(updated)
    }

    async fn append(
        &self,
        table: &str,
        new_rows: &[RecordValue],
        cancel: &CancellationSignal,
    ) -> Result<TableValue> {
        let stored = self.writable(table)?;
        let mut rows = stored.rows.lock().await;
        check_cancel(table, cancel)?;

        rows.extend(
            new_rows
                .iter()
                .map(|row| row.clone().conform_to(stored.ty.element())),
        );
        self.committed(table, "append");
        Ok(TableValue::new(stored.ty.clone(), rows.clone()).with_source(table))
    }

    async fn remove(
        &self,
        table: &str,
        targets: &[RecordValue],
        cancel: &CancellationSignal,
    ) -> Result<()> {
        let stored = self.writable(table)?;
        let mut rows = stored.rows.lock().await;
        check_cancel(table, cancel)?;

        let mut doomed: Vec<usize> = Vec::with_capacity(targets.len());
        for target in targets {
            let index = (0..rows.len())
                .find(|i| !doomed.contains(i) && rows[*i].matches(target))
                .ok_or_else(|| StoreError::NotFound {
                    table: table.to_string(),
                })?;
            doomed.push(index);
        }
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for index in doomed {
            rows.remove(index);
        }
        self.committed(table, "remove");
        Ok(())
    }

    async fn clear(&self, table: &str, cancel: &CancellationSignal) -> Result<()> {
        let stored = self.writable(table)?;
        let mut rows = stored.rows.lock().await;
        check_cancel(table, cancel)?;

        rows.clear();
        self.committed(table, "clear");
        Ok(())
    }

    async fn snapshot(&self, table: &str) -> Result<TableValue> {
        let stored = self.table(table)?;
        let rows = stored.rows.lock().await;
        Ok(TableValue::new(stored.ty.clone(), rows.clone()).with_source(table))
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("InMemoryStore")
            .field("tables", &names)
            .field("commits", &self.commit_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FormulaValue;
    use formula_typeck::ty::RecordType;

    fn text(s: &str) -> FormulaValue {
        FormulaValue::Text(s.to_string())
    }

    fn row(p1: &str, p2: &str) -> RecordValue {
        RecordValue::anonymous([("Prop1", text(p1)), ("Prop2", text(p2))])
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let ty = row("", "").ty.to_table();
        store.insert_table("T", ty.clone(), vec![row("a", "b"), row("c", "d")]);
        store.insert_read_only_table("RO", ty, vec![row("a", "b")]);
        store
    }

    fn sel(p1: &str) -> RecordValue {
        RecordValue::anonymous([("Prop1", text(p1))])
    }

    #[tokio::test]
    async fn update_merges_changes_in_order() {
        let store = store();
        let cancel = CancellationSignal::new();
        let changes = [
            RecordValue::anonymous([("Prop2", text("x"))]),
            RecordValue::anonymous([("Prop2", text("haha"))]),
        ];
        let updated = store
            .update_by_selector("T", &sel("c"), &changes, &cancel)
            .await
            .unwrap();
        assert_eq!(updated.get("Prop2"), text("haha"));
        let snap = store.snapshot("T").await.unwrap();
        assert_eq!(snap.rows[1].get("Prop2"), text("haha"));
        assert_eq!(snap.source.as_deref(), Some("T"));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn update_without_match_is_not_found() {
        let store = store();
        let err = store
            .update_by_selector("T", &sel("zzz"), &[], &CancellationSignal::new())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound { table: "T".into() });
        assert_eq!(ExpressionError::from(err).kind, ErrorKind::NotFound);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn read_only_tables_reject_writes() {
        let store = store();
        let cancel = CancellationSignal::new();
        let err = store.clear("RO", &cancel).await.unwrap_err();
        assert_eq!(err, StoreError::ReadOnly("RO".into()));
        assert_eq!(ExpressionError::from(err).kind, ErrorKind::ReadOnlyValue);
        assert_eq!(store.snapshot("RO").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_commit_changes_nothing() {
        let store = store();
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let err = store.clear("T", &cancel).await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
        let expr_err = ExpressionError::from(err);
        assert_eq!(expr_err.kind, ErrorKind::Timeout);
        assert_eq!(expr_err.message, "operation was cancelled");
        assert_eq!(store.snapshot("T").await.unwrap().len(), 2);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn remove_is_all_or_nothing() {
        let store = store();
        let cancel = CancellationSignal::new();
        let err = store
            .remove("T", &[sel("a"), sel("missing")], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.snapshot("T").await.unwrap().len(), 2);

        store.remove("T", &[sel("a"), sel("c")], &cancel).await.unwrap();
        assert!(store.snapshot("T").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_same_selector_twice_needs_two_rows() {
        let store = store();
        let cancel = CancellationSignal::new();
        let err = store.remove("T", &[sel("a"), sel("a")], &cancel).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn append_conforms_rows_to_the_table_type() {
        let store = InMemoryStore::new();
        let lazy = std::sync::Arc::new(formula_typeck::record::LazyRecordType::new("Pad"));
        lazy.set_type_properties([
            ("Prop1", formula_typeck::ty::FormulaType::Text),
            ("Prop2", formula_typeck::ty::FormulaType::Text),
        ]);
        let ty = RecordType::from(lazy).to_table();
        store.insert_table("P", ty, Vec::new());

        let table = store
            .append("P", &[sel("new")], &CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].get("Prop2"), FormulaValue::Blank);
        assert_eq!(table.rows[0].ty.type_name(), Some("Pad"));
    }

    #[tokio::test]
    async fn missing_table() {
        let store = InMemoryStore::new();
        let err = store.snapshot("Nope").await.unwrap_err();
        assert_eq!(err.to_string(), "table not found: Nope");
    }

    #[tokio::test]
    async fn concurrent_updates_serialize_last_write_wins() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let change = RecordValue::anonymous([("Prop2", FormulaValue::Number(i as f64))]);
                store
                    .update_by_selector("T", &sel("a"), &[change], &CancellationSignal::new())
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.commit_count(), 16);
        let snap = store.snapshot("T").await.unwrap();
        assert!(matches!(snap.rows[0].get("Prop2"), FormulaValue::Number(_)));
    }
}
