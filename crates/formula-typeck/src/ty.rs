//! Type representation for formulas.
//!
//! Defines [`FormulaType`], the record type handle [`RecordType`] and the
//! table wrapper [`TableType`]. Record types are backed either by an
//! anonymous field map (built from record literals) or by a
//! [`RecordDescriptor`] supplied by the host, whose fields may keep growing
//! after the type was created.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::record::{LazyRecordType, RecordDescriptor};

/// A formula type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FormulaType {
    /// The type of `Blank()`. Accepted wherever any type is expected.
    Blank,
    Boolean,
    Number,
    Text,
    /// The result of functions that produce no value, e.g. `Clear`.
    Void,
    /// An unconstrained slot, such as a field an open descriptor has not
    /// registered yet. Compatible with everything in both directions.
    Unknown,
    Record(RecordType),
    Table(TableType),
}

impl FormulaType {
    /// The record type if this is a record.
    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            FormulaType::Record(rec) => Some(rec),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableType> {
        match self {
            FormulaType::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Build an anonymous record type from `(name, type)` pairs.
    pub fn record<I, S>(fields: I) -> FormulaType
    where
        I: IntoIterator<Item = (S, FormulaType)>,
        S: Into<String>,
    {
        FormulaType::Record(RecordType::anonymous(fields))
    }
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaType::Blank => write!(f, "Blank"),
            FormulaType::Boolean => write!(f, "Boolean"),
            FormulaType::Number => write!(f, "Number"),
            FormulaType::Text => write!(f, "Text"),
            FormulaType::Void => write!(f, "Void"),
            FormulaType::Unknown => write!(f, "Unknown"),
            FormulaType::Record(rec) => write!(f, "{}", rec),
            FormulaType::Table(table) => write!(f, "{}", table),
        }
    }
}

#[derive(Clone)]
enum RecordRepr {
    /// Structural record from a literal. Never changes after construction.
    Anonymous(Arc<BTreeMap<String, FormulaType>>),
    /// Host-supplied descriptor, possibly lazily populated.
    Described(Arc<dyn RecordDescriptor>),
}

/// A record type handle. Cheap to clone.
///
/// Identity rules:
/// - Two named records (descriptor with a type name) are equal iff their
///   names match case-insensitively, no matter which fields each has
///   registered so far. A host may describe the same external type from
///   several call sites and they must stay interchangeable.
/// - Two unnamed records are equal iff their current field maps are equal.
/// - A named and an unnamed record are never equal.
#[derive(Clone)]
pub struct RecordType {
    repr: RecordRepr,
}

impl RecordType {
    /// An anonymous structural record type.
    pub fn anonymous<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, FormulaType)>,
        S: Into<String>,
    {
        let map = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        RecordType {
            repr: RecordRepr::Anonymous(Arc::new(map)),
        }
    }

    /// A record type backed by a host descriptor.
    pub fn from_descriptor(descriptor: Arc<dyn RecordDescriptor>) -> Self {
        RecordType {
            repr: RecordRepr::Described(descriptor),
        }
    }

    /// The stable type name, if the record comes from a named descriptor.
    pub fn type_name(&self) -> Option<&str> {
        match &self.repr {
            RecordRepr::Anonymous(_) => None,
            RecordRepr::Described(d) => d.type_name(),
        }
    }

    /// Look up a field. `None` means "not known (yet)", not "invalid".
    pub fn field_type(&self, name: &str) -> Option<FormulaType> {
        match &self.repr {
            RecordRepr::Anonymous(map) => map.get(name).cloned(),
            RecordRepr::Described(d) => d.field_type(name),
        }
    }

    /// Snapshot of the currently known field names.
    pub fn field_names(&self) -> BTreeSet<String> {
        match &self.repr {
            RecordRepr::Anonymous(map) => map.keys().cloned().collect(),
            RecordRepr::Described(d) => d.field_names(),
        }
    }

    /// Snapshot of the currently known fields and their types.
    pub fn fields(&self) -> BTreeMap<String, FormulaType> {
        match &self.repr {
            RecordRepr::Anonymous(map) => (**map).clone(),
            RecordRepr::Described(d) => d.fields(),
        }
    }

    /// Add or replace a field binding on the backing descriptor.
    ///
    /// Returns `false` for anonymous records, which are immutable.
    pub fn register_field(&self, name: &str, ty: FormulaType) -> bool {
        match &self.repr {
            RecordRepr::Anonymous(_) => false,
            RecordRepr::Described(d) => {
                d.register_field(name, ty);
                true
            }
        }
    }

    /// Whether fields this type does not know about are unconstrained (and
    /// may be registered) rather than rejected.
    pub fn is_extensible(&self) -> bool {
        match &self.repr {
            RecordRepr::Anonymous(_) => false,
            RecordRepr::Described(d) => d.is_extensible(),
        }
    }

    /// Stable key of the backing descriptor, used to cache per-pass
    /// snapshots. `None` for anonymous records.
    pub fn descriptor_key(&self) -> Option<usize> {
        match &self.repr {
            RecordRepr::Anonymous(_) => None,
            RecordRepr::Described(d) => Some(Arc::as_ptr(d) as *const () as usize),
        }
    }

    /// Wrap this record type as the element type of a table.
    pub fn to_table(&self) -> TableType {
        TableType::new(self.clone())
    }
}

impl From<Arc<LazyRecordType>> for RecordType {
    fn from(lazy: Arc<LazyRecordType>) -> Self {
        RecordType::from_descriptor(lazy)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        match (self.type_name(), other.type_name()) {
            (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
            (None, None) => self.fields() == other.fields(),
            _ => false,
        }
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.type_name() {
            // Lowercased so the hash agrees with case-insensitive equality.
            Some(name) => name.to_lowercase().hash(state),
            None => self.field_names().hash(state),
        }
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(f, "RecordType({:?})", name),
            None => f.debug_map().entries(self.fields()).finish(),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.type_name() {
            return write!(f, "{}", name);
        }
        write!(f, "{{")?;
        for (i, (name, ty)) in self.fields().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        write!(f, "}}")
    }
}

/// A table type: a sequence of records sharing one element record type.
///
/// Field queries are forwarded to the element descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableType {
    element: RecordType,
}

impl TableType {
    pub fn new(element: RecordType) -> Self {
        TableType { element }
    }

    pub fn element(&self) -> &RecordType {
        &self.element
    }

    pub fn field_type(&self, name: &str) -> Option<FormulaType> {
        self.element.field_type(name)
    }

    pub fn field_names(&self) -> BTreeSet<String> {
        self.element.field_names()
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.element)
    }
}
