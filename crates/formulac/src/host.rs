//! Host configuration: the record types, variables and table data a formula
//! runs against, read from a TOML file.
//!
//! ```toml
//! [types.CustomPadType]
//! fields = { Prop1 = "Text", Prop2 = "Text" }
//! sealed = false
//!
//! [variables.NewVar]
//! type = "Table(CustomPadType)"
//! mutable = true
//! rows = [ { Prop1 = "a", Prop2 = "b" } ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use formula_rt::store::InMemoryStore;
use formula_rt::{Bindings, EngineConfig, FormulaValue, RecordValue};
use formula_typeck::record::LazyRecordType;
use formula_typeck::symbols::SymbolTable;
use formula_typeck::ty::{FormulaType, RecordType};
use serde::Deserialize;
use tracing::debug;

/// A parsed host configuration file.
#[derive(Debug, Deserialize)]
pub struct HostConfig {
    /// Whether `Patch`, `Collect`, `Remove` and `Clear` are allowed.
    #[serde(default = "default_true")]
    pub mutation_functions: bool,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDecl>,
}

/// A named record type.
#[derive(Debug, Deserialize)]
pub struct TypeDecl {
    /// Field name to type expression.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Sealed types reject fields the checker has not seen registered.
    #[serde(default)]
    pub sealed: bool,
}

/// A variable visible to formulas.
#[derive(Debug, Deserialize)]
pub struct VariableDecl {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub mutable: bool,
    /// Rows of a table variable. Table variables are store-backed.
    #[serde(default)]
    pub rows: Vec<toml::Table>,
    /// Makes the store reject writes to this table.
    #[serde(default)]
    pub read_only: bool,
    /// Value of a non-table variable.
    #[serde(default)]
    pub value: Option<toml::Value>,
}

fn default_true() -> bool {
    true
}

/// Everything an engine needs to run formulas against a host config.
#[derive(Debug)]
pub struct Host {
    pub types: BTreeMap<String, Arc<LazyRecordType>>,
    pub config: EngineConfig,
    pub symbols: SymbolTable,
    pub bindings: Bindings,
    pub store: Arc<InMemoryStore>,
}

impl HostConfig {
    /// Read and parse a host config from a file path.
    pub fn from_file(path: &Path) -> Result<HostConfig, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_str(&content)
    }

    /// Parse a host config from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<HostConfig, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse host config: {}", e))
    }

    /// Create the record types, populate the store and declare variables.
    pub fn build(&self) -> Result<Host, String> {
        let mut types = BTreeMap::new();
        for (name, decl) in &self.types {
            let lazy = if decl.sealed {
                LazyRecordType::sealed(name.clone())
            } else {
                LazyRecordType::new(name.clone())
            };
            types.insert(name.clone(), Arc::new(lazy));
        }
        // Fields are registered once every type exists so they may refer to
        // each other.
        for (name, decl) in &self.types {
            let mut fields = Vec::with_capacity(decl.fields.len());
            for (field, expr) in &decl.fields {
                let ty = parse_type(expr, &types)
                    .map_err(|e| format!("type `{}`, field `{}`: {}", name, field, e))?;
                fields.push((field.clone(), ty));
            }
            if let Some(lazy) = types.get(name) {
                lazy.set_type_properties(fields);
            }
        }

        let mut config = EngineConfig::default();
        if self.mutation_functions {
            config = config.with_mutation_functions();
        }
        let store = Arc::new(InMemoryStore::new());
        let mut symbols = SymbolTable::new();
        let mut bindings = Bindings::new();

        for (name, decl) in &self.variables {
            let ty = parse_type(&decl.ty, &types)
                .map_err(|e| format!("variable `{}`: {}", name, e))?;
            match &ty {
                FormulaType::Table(table) => {
                    let rows = decl
                        .rows
                        .iter()
                        .map(|row| record_value(row).map(|r| r.conform_to(table.element())))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| format!("variable `{}`: {}", name, e))?;
                    debug!(variable = %name, rows = rows.len(), "loading table");
                    if decl.read_only {
                        store.insert_read_only_table(name.clone(), table.clone(), rows);
                    } else {
                        store.insert_table(name.clone(), table.clone(), rows);
                    }
                    bindings.bind_data_source(name.clone(), name.clone());
                }
                _ => {
                    let value = match &decl.value {
                        Some(value) => formula_value(value)
                            .map_err(|e| format!("variable `{}`: {}", name, e))?,
                        None => FormulaValue::Blank,
                    };
                    bindings.bind_value(name.clone(), value);
                }
            }
            symbols
                .add_variable(name.clone(), ty, decl.mutable)
                .map_err(|e| e.to_string())?;
        }

        Ok(Host {
            types,
            config,
            symbols,
            bindings,
            store,
        })
    }
}

/// Parse a type expression: `Text`, `Number`, `Boolean`, a declared type
/// name, or `Table(<name>)`.
pub fn parse_type(
    expr: &str,
    types: &BTreeMap<String, Arc<LazyRecordType>>,
) -> Result<FormulaType, String> {
    let expr = expr.trim();
    match expr {
        "Text" => return Ok(FormulaType::Text),
        "Number" => return Ok(FormulaType::Number),
        "Boolean" => return Ok(FormulaType::Boolean),
        _ => {}
    }
    if let Some(inner) = expr
        .strip_prefix("Table(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let element = record_type(inner.trim(), types)?;
        return Ok(FormulaType::Table(element.to_table()));
    }
    record_type(expr, types).map(FormulaType::Record)
}

fn record_type(
    name: &str,
    types: &BTreeMap<String, Arc<LazyRecordType>>,
) -> Result<RecordType, String> {
    types
        .get(name)
        .map(|lazy| RecordType::from(lazy.clone()))
        .ok_or_else(|| format!("unknown type `{}`", name))
}

fn record_value(table: &toml::Table) -> Result<RecordValue, String> {
    let mut fields = Vec::with_capacity(table.len());
    for (name, value) in table {
        fields.push((name.clone(), formula_value(value)?));
    }
    Ok(RecordValue::anonymous(fields))
}

fn formula_value(value: &toml::Value) -> Result<FormulaValue, String> {
    match value {
        toml::Value::String(s) => Ok(FormulaValue::Text(s.clone())),
        toml::Value::Integer(i) => Ok(FormulaValue::Number(*i as f64)),
        toml::Value::Float(f) => Ok(FormulaValue::Number(*f)),
        toml::Value::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        toml::Value::Datetime(d) => Ok(FormulaValue::Text(d.to_string())),
        toml::Value::Table(t) => record_value(t).map(FormulaValue::Record),
        toml::Value::Array(_) => Err("arrays are only supported as table rows".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_typeck::record::RecordDescriptor;
    use std::io::Write;

    const PAD: &str = r#"
[types.CustomPadType]
fields = { Prop1 = "Text", Prop2 = "Text" }

[variables.NewVar]
type = "Table(CustomPadType)"
mutable = true
rows = [ { Prop1 = "a", Prop2 = "b" }, { Prop1 = "c" } ]

[variables.Limit]
type = "Number"
value = 3
"#;

    #[test]
    fn parse_and_build_host() {
        let config = HostConfig::from_str(PAD).unwrap();
        assert!(config.mutation_functions);
        let host = config.build().unwrap();

        let pad = &host.types["CustomPadType"];
        assert!(pad.is_extensible());
        assert_eq!(pad.field_type("Prop2"), Some(FormulaType::Text));

        let new_var = host.symbols.lookup("NewVar").unwrap();
        assert!(new_var.mutable);
        assert_eq!(new_var.ty.to_string(), "Table(CustomPadType)");
        assert!(!host.symbols.lookup("Limit").unwrap().mutable);
        assert!(host.config.symbol_table().mutation_functions_enabled());
    }

    #[test]
    fn type_expressions() {
        let config = HostConfig::from_str(PAD).unwrap();
        let host = config.build().unwrap();
        assert_eq!(parse_type("Number", &host.types), Ok(FormulaType::Number));
        assert_eq!(
            parse_type("CustomPadType", &host.types).unwrap().to_string(),
            "CustomPadType"
        );
        assert_eq!(
            parse_type("Table(Nope)", &host.types),
            Err("unknown type `Nope`".to_string())
        );
    }

    #[test]
    fn sealed_types_and_disabled_mutation() {
        let config = HostConfig::from_str(
            r#"
mutation_functions = false

[types.Fixed]
fields = { A = "Number" }
sealed = true
"#,
        )
        .unwrap();
        let host = config.build().unwrap();
        assert!(!host.types["Fixed"].is_extensible());
        assert!(!host.config.symbol_table().mutation_functions_enabled());
    }

    #[test]
    fn reject_unknown_variable_type() {
        let config = HostConfig::from_str(
            r#"
[variables.X]
type = "Table(Missing)"
"#,
        )
        .unwrap();
        let err = config.build().unwrap_err();
        assert_eq!(err, "variable `X`: unknown type `Missing`");
    }

    #[test]
    fn reject_malformed_toml() {
        let err = HostConfig::from_str("[types.X\n").unwrap_err();
        assert!(err.contains("Failed to parse host config"), "Error: {}", err);
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PAD.as_bytes()).unwrap();
        let config = HostConfig::from_file(file.path()).unwrap();
        assert_eq!(config.variables.len(), 2);

        let missing = file.path().with_extension("missing");
        let err = HostConfig::from_file(&missing).unwrap_err();
        assert!(err.starts_with("Failed to read"), "Error: {}", err);
    }
}
