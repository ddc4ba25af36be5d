//! Builtin function identities and their arities.
//!
//! The checker resolves a call's name to a [`BuiltinFunction`] once, at bind
//! time. Everything after that (signature checks, runtime dispatch) keys off
//! the enum, never off the name.

use std::fmt;

/// Every function the engine knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinFunction {
    Patch,
    Collect,
    Remove,
    Clear,
    Index,
    First,
    Last,
    CountRows,
    Blank,
}

impl BuiltinFunction {
    pub const ALL: [BuiltinFunction; 9] = [
        BuiltinFunction::Patch,
        BuiltinFunction::Collect,
        BuiltinFunction::Remove,
        BuiltinFunction::Clear,
        BuiltinFunction::Index,
        BuiltinFunction::First,
        BuiltinFunction::Last,
        BuiltinFunction::CountRows,
        BuiltinFunction::Blank,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinFunction::Patch => "Patch",
            BuiltinFunction::Collect => "Collect",
            BuiltinFunction::Remove => "Remove",
            BuiltinFunction::Clear => "Clear",
            BuiltinFunction::Index => "Index",
            BuiltinFunction::First => "First",
            BuiltinFunction::Last => "Last",
            BuiltinFunction::CountRows => "CountRows",
            BuiltinFunction::Blank => "Blank",
        }
    }

    /// Resolve a function name. Function names are case-sensitive.
    pub fn from_name(name: &str) -> Option<BuiltinFunction> {
        BuiltinFunction::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Whether the function alters data held outside the engine.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            BuiltinFunction::Patch
                | BuiltinFunction::Collect
                | BuiltinFunction::Remove
                | BuiltinFunction::Clear
        )
    }

    /// `(min, max)` argument counts; `None` means variadic.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            // Patch(record, change) is the shortest form.
            BuiltinFunction::Patch => (2, None),
            BuiltinFunction::Collect | BuiltinFunction::Remove => (2, None),
            BuiltinFunction::Clear
            | BuiltinFunction::First
            | BuiltinFunction::Last
            | BuiltinFunction::CountRows => (1, Some(1)),
            BuiltinFunction::Index => (2, Some(2)),
            BuiltinFunction::Blank => (0, Some(0)),
        }
    }
}

impl fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for func in BuiltinFunction::ALL {
            assert_eq!(BuiltinFunction::from_name(func.name()), Some(func));
        }
        assert_eq!(BuiltinFunction::from_name("patch"), None);
        assert_eq!(BuiltinFunction::from_name("Sum"), None);
    }

    #[test]
    fn mutation_family() {
        let mutating: Vec<_> = BuiltinFunction::ALL
            .into_iter()
            .filter(|f| f.is_mutation())
            .map(|f| f.name())
            .collect();
        assert_eq!(mutating, vec!["Patch", "Collect", "Remove", "Clear"]);
    }
}
