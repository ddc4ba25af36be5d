//! Symbol tables: the variables a formula may reference.
//!
//! A [`SymbolTable`] maps variable names to their declared type and a
//! mutability flag. The checker resolves names through a [`SymbolStack`]
//! (engine table first, per-call tables after it), searching from the
//! innermost table outward so later tables shadow earlier ones.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::ty::FormulaType;

/// A declared variable.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolEntry {
    pub name: String,
    pub ty: FormulaType,
    /// Whether mutation functions may target this variable.
    pub mutable: bool,
}

/// Errors raised while populating a symbol table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolError {
    AlreadyDefined { name: String },
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::AlreadyDefined { name } => {
                write!(f, "variable `{}` is already defined", name)
            }
        }
    }
}

impl std::error::Error for SymbolError {}

/// A flat table of variables plus the mutation-function switch.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: FxHashMap<String, SymbolEntry>,
    /// Declaration order, for stable iteration.
    order: Vec<String>,
    mutation_functions: bool,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Names are unique within a table.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        ty: FormulaType,
        mutable: bool,
    ) -> Result<(), SymbolError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(SymbolError::AlreadyDefined { name });
        }
        self.order.push(name.clone());
        self.entries.insert(
            name.clone(),
            SymbolEntry { name, ty, mutable },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.get(name)
    }

    /// Allow `Patch`, `Collect`, `Remove` and `Clear` in formulas checked
    /// against this table.
    pub fn enable_mutation_functions(&mut self) {
        self.mutation_functions = true;
    }

    pub fn mutation_functions_enabled(&self) -> bool {
        self.mutation_functions
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A read-only view over several symbol tables.
///
/// Index 0 is the outermost table. Lookups search from the last table
/// backwards.
#[derive(Clone, Copy)]
pub struct SymbolStack<'a> {
    tables: &'a [&'a SymbolTable],
}

impl<'a> SymbolStack<'a> {
    pub fn new(tables: &'a [&'a SymbolTable]) -> Self {
        SymbolStack { tables }
    }

    /// Look up a name, searching from the innermost table outward.
    pub fn lookup(&self, name: &str) -> Option<&'a SymbolEntry> {
        self.tables.iter().rev().find_map(|table| table.lookup(name))
    }

    /// Mutation functions are callable if any table in the stack enables them.
    pub fn mutation_functions_enabled(&self) -> bool {
        self.tables.iter().any(|t| t.mutation_functions_enabled())
    }

    /// Number of tables on the stack.
    pub fn depth(&self) -> usize {
        self.tables.len()
    }
}
