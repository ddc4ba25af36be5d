//! Structural compatibility between formula types.
//!
//! Compatibility is directional: `found` is the value being supplied
//! (a selector, a change record, a table item) and `expected` is the type it
//! must fit into. Records are compared field by field through a
//! [`FieldSource`], so the checker can answer lookups from a per-pass
//! snapshot instead of the live descriptor.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::ty::{FormulaType, RecordType};

/// Why `found` does not fit `expected`.
#[derive(Clone, Debug, PartialEq)]
pub enum Incompatibility {
    /// The top-level shapes differ, e.g. a Number where a record is expected.
    Shape {
        expected: FormulaType,
        found: FormulaType,
    },
    /// `found` has a field the expected record does not know and cannot gain.
    UnknownField { field: String },
    /// A field exists on both sides with incompatible types.
    FieldType {
        field: String,
        expected: FormulaType,
        found: FormulaType,
    },
}

/// Answers field lookups on record types.
pub trait FieldSource {
    fn field_type(&mut self, record: &RecordType, name: &str) -> Option<FormulaType>;
    fn fields(&mut self, record: &RecordType) -> BTreeMap<String, FormulaType>;
}

/// Reads descriptors directly, observing every registration immediately.
pub struct LiveFields;

impl FieldSource for LiveFields {
    fn field_type(&mut self, record: &RecordType, name: &str) -> Option<FormulaType> {
        record.field_type(name)
    }

    fn fields(&mut self, record: &RecordType) -> BTreeMap<String, FormulaType> {
        record.fields()
    }
}

/// Per-pass view of lazy descriptors.
///
/// Each descriptor is copied on first touch; later lookups in the same pass
/// read the copy, so host registrations made mid-pass do not change the
/// outcome of a check already underway. Registrations made through
/// [`Snapshots::register`] land in the copy at once and reach the
/// descriptor only on [`Snapshots::commit`], so a failed pass leaves host
/// types untouched.
#[derive(Default)]
pub struct Snapshots {
    taken: FxHashMap<usize, BTreeMap<String, FormulaType>>,
    pending: Vec<(RecordType, String, FormulaType)>,
}

impl Snapshots {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&mut self, record: &RecordType) -> Option<&mut BTreeMap<String, FormulaType>> {
        let key = record.descriptor_key()?;
        Some(self.taken.entry(key).or_insert_with(|| record.fields()))
    }

    /// Register a field in this pass's copy and queue it for the descriptor.
    ///
    /// Returns `false` if the record cannot be extended.
    pub fn register(&mut self, record: &RecordType, name: &str, ty: FormulaType) -> bool {
        if !record.is_extensible() {
            return false;
        }
        let Some(snapshot) = self.snapshot(record) else {
            return false;
        };
        snapshot.insert(name.to_string(), ty.clone());
        self.pending.push((record.clone(), name.to_string(), ty));
        true
    }

    /// Write queued registrations to their descriptors, in order.
    pub fn commit(self) {
        for (record, name, ty) in self.pending {
            record.register_field(&name, ty);
        }
    }
}

impl FieldSource for Snapshots {
    fn field_type(&mut self, record: &RecordType, name: &str) -> Option<FormulaType> {
        match self.snapshot(record) {
            Some(snapshot) => snapshot.get(name).cloned(),
            None => record.field_type(name),
        }
    }

    fn fields(&mut self, record: &RecordType) -> BTreeMap<String, FormulaType> {
        match self.snapshot(record) {
            Some(snapshot) => snapshot.clone(),
            None => record.fields(),
        }
    }
}

/// Check that a value of type `found` may be used where `expected` is required.
///
/// - `Blank` and `Unknown` fit anywhere and accept anything.
/// - Named records with equal names fit each other whatever their fields.
/// - Otherwise every field of a `found` record must exist in `expected` with a
///   compatible type. Fields missing from an extensible `expected` record are
///   tolerated.
/// - Tables compare their element records.
pub fn check_compatible(
    fields: &mut dyn FieldSource,
    expected: &FormulaType,
    found: &FormulaType,
) -> Result<(), Incompatibility> {
    use FormulaType::*;

    match (expected, found) {
        (Blank | Unknown, _) | (_, Blank | Unknown) => Ok(()),
        (Boolean, Boolean) | (Number, Number) | (Text, Text) | (Void, Void) => Ok(()),
        (Record(exp), Record(got)) => check_record(fields, exp, got),
        (Table(exp), Table(got)) => check_record(fields, exp.element(), got.element()),
        _ => Err(Incompatibility::Shape {
            expected: expected.clone(),
            found: found.clone(),
        }),
    }
}

fn check_record(
    fields: &mut dyn FieldSource,
    expected: &RecordType,
    found: &RecordType,
) -> Result<(), Incompatibility> {
    if expected.type_name().is_some() && expected == found {
        return Ok(());
    }
    for (name, found_ty) in fields.fields(found) {
        match fields.field_type(expected, &name) {
            Some(expected_ty) => {
                if check_compatible(fields, &expected_ty, &found_ty).is_err() {
                    return Err(Incompatibility::FieldType {
                        field: name,
                        expected: expected_ty,
                        found: found_ty,
                    });
                }
            }
            None if expected.is_extensible() => {}
            None => return Err(Incompatibility::UnknownField { field: name }),
        }
    }
    Ok(())
}
