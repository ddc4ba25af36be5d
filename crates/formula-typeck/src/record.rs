//! Host-supplied record descriptors and the lazily-populated field registry.
//!
//! A host that knows its record shapes only at runtime implements
//! [`RecordDescriptor`] (or uses the stock [`LazyRecordType`]) and keeps
//! registering fields as it discovers them. The checker reads descriptors
//! through [`RecordType`](crate::ty::RecordType) and never assumes the field
//! set is final.
//!
//! ## Semantics
//!
//! - Registering a field that already exists replaces its type.
//! - Fields are never removed.
//! - A missing field means "not known yet", never "invalid".

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::ty::FormulaType;

/// A record shape supplied by the embedding host.
///
/// Implementations must be internally synchronized: the same descriptor may
/// be read by several checking passes while the host keeps registering
/// fields, and a lookup must never observe a half-written entry.
pub trait RecordDescriptor: fmt::Debug + Send + Sync {
    /// Stable type name. Named descriptors compare equal by name
    /// (case-insensitive); `None` falls back to structural comparison.
    fn type_name(&self) -> Option<&str>;

    /// Look up a field type. `None` means the field is not known yet.
    fn field_type(&self, name: &str) -> Option<FormulaType>;

    /// Snapshot of the currently known field names.
    fn field_names(&self) -> BTreeSet<String>;

    /// Add or replace a field binding.
    fn register_field(&self, name: &str, ty: FormulaType);

    /// Whether unknown fields are unconstrained (and may be registered by the
    /// checker) rather than rejected.
    fn is_extensible(&self) -> bool;

    /// Snapshot of all currently known fields.
    fn fields(&self) -> BTreeMap<String, FormulaType> {
        self.field_names()
            .into_iter()
            .filter_map(|name| {
                let ty = self.field_type(&name)?;
                Some((name, ty))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// FieldRegistry
// ---------------------------------------------------------------------------

/// Mutable backing store of field name -> type bindings.
///
/// Protected by an RwLock for concurrent reads with exclusive writes. Entries
/// are inserted whole under the write lock, so readers see either the old
/// binding or the new one.
#[derive(Default)]
pub struct FieldRegistry {
    fields: RwLock<FxHashMap<String, FormulaType>>,
}

impl FieldRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        FieldRegistry {
            fields: RwLock::new(FxHashMap::default()),
        }
    }

    /// Add or replace a binding.
    pub fn register(&self, name: &str, ty: FormulaType) {
        self.fields.write().insert(name.to_string(), ty);
    }

    /// Register many bindings under a single write lock.
    pub fn register_all<I, S>(&self, fields: I)
    where
        I: IntoIterator<Item = (S, FormulaType)>,
        S: Into<String>,
    {
        let mut map = self.fields.write();
        for (name, ty) in fields {
            map.insert(name.into(), ty);
        }
    }

    pub fn get(&self, name: &str) -> Option<FormulaType> {
        self.fields.read().get(name).cloned()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Consistent copy of every binding, taken under one read lock.
    pub fn snapshot(&self) -> BTreeMap<String, FormulaType> {
        self.fields
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }
}

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

// ---------------------------------------------------------------------------
// LazyRecordType
// ---------------------------------------------------------------------------

/// A named record type whose fields are registered incrementally by the host.
///
/// Share it as `Arc<LazyRecordType>` and convert with
/// `RecordType::from(arc.clone())`; every handle sees later registrations.
#[derive(Debug)]
pub struct LazyRecordType {
    type_name: String,
    registry: FieldRegistry,
    extensible: bool,
}

impl LazyRecordType {
    /// An open descriptor: fields it does not know yet are unconstrained.
    pub fn new(type_name: impl Into<String>) -> Self {
        LazyRecordType {
            type_name: type_name.into(),
            registry: FieldRegistry::new(),
            extensible: true,
        }
    }

    /// A sealed descriptor: fields it does not know are rejected by the checker.
    pub fn sealed(type_name: impl Into<String>) -> Self {
        LazyRecordType {
            extensible: false,
            ..LazyRecordType::new(type_name)
        }
    }

    pub fn name(&self) -> &str {
        &self.type_name
    }

    /// Register a batch of field bindings, replacing existing ones.
    pub fn set_type_properties<I, S>(&self, properties: I)
    where
        I: IntoIterator<Item = (S, FormulaType)>,
        S: Into<String>,
    {
        self.registry.register_all(properties);
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }
}

impl RecordDescriptor for LazyRecordType {
    fn type_name(&self) -> Option<&str> {
        Some(&self.type_name)
    }

    fn field_type(&self, name: &str) -> Option<FormulaType> {
        self.registry.get(name)
    }

    fn field_names(&self) -> BTreeSet<String> {
        self.registry.names()
    }

    fn register_field(&self, name: &str, ty: FormulaType) {
        self.registry.register(name, ty);
    }

    fn is_extensible(&self) -> bool {
        self.extensible
    }

    fn fields(&self) -> BTreeMap<String, FormulaType> {
        self.registry.snapshot()
    }
}

impl PartialEq for LazyRecordType {
    fn eq(&self, other: &Self) -> bool {
        self.type_name.to_lowercase() == other.type_name.to_lowercase()
    }
}

impl Eq for LazyRecordType {}

impl std::hash::Hash for LazyRecordType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_name.to_lowercase().hash(state);
    }
}
