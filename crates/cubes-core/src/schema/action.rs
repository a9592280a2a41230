use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CubesError, Result};

/// One schema-change intent, persisted as `{"method": ..., "params": {...}}`.
///
/// The method tag is decoded once, when a record is parsed, so nothing
/// downstream dispatches on strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Action {
    AddTable(TableParams),
    DeleteTable(TableParams),
    AddColumn(AddColumnParams),
    DeleteColumn(ColumnParams),
    AddPrimaryKey(ColumnParams),
    DeletePrimaryKey(ColumnParams),
}

/// Parameters of `addTable` and `deleteTable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableParams {
    pub name: String,
}

/// Parameters of `addColumn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddColumnParams {
    pub table: String,
    pub column: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub is_nullable: bool,
    /// Empty means "no default".
    #[serde(default)]
    pub default_value: String,
}

/// Parameters of the column-addressed actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnParams {
    pub table: String,
    pub column: String,
}

impl Action {
    pub fn add_table(name: impl Into<String>) -> Self {
        Action::AddTable(TableParams { name: name.into() })
    }

    pub fn delete_table(name: impl Into<String>) -> Self {
        Action::DeleteTable(TableParams { name: name.into() })
    }

    pub fn add_column(
        table: impl Into<String>,
        column: impl Into<String>,
        column_type: impl Into<String>,
        is_nullable: bool,
        default_value: impl Into<String>,
    ) -> Self {
        Action::AddColumn(AddColumnParams {
            table: table.into(),
            column: column.into(),
            column_type: column_type.into(),
            is_nullable,
            default_value: default_value.into(),
        })
    }

    pub fn delete_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Action::DeleteColumn(ColumnParams {
            table: table.into(),
            column: column.into(),
        })
    }

    pub fn add_primary_key(table: impl Into<String>, column: impl Into<String>) -> Self {
        Action::AddPrimaryKey(ColumnParams {
            table: table.into(),
            column: column.into(),
        })
    }

    pub fn delete_primary_key(table: impl Into<String>, column: impl Into<String>) -> Self {
        Action::DeletePrimaryKey(ColumnParams {
            table: table.into(),
            column: column.into(),
        })
    }

    /// Decode a `(method, params)` pair as handed over by callers.
    pub fn from_parts(method: &str, params: serde_json::Value) -> Result<Self> {
        serde_json::from_value(serde_json::json!({ "method": method, "params": params }))
            .map_err(|e| CubesError::Format(format!("invalid {} action: {}", method, e)))
    }

    /// Persisted method name.
    pub fn method(&self) -> &'static str {
        match self {
            Action::AddTable(_) => "addTable",
            Action::DeleteTable(_) => "deleteTable",
            Action::AddColumn(_) => "addColumn",
            Action::DeleteColumn(_) => "deleteColumn",
            Action::AddPrimaryKey(_) => "addPrimaryKey",
            Action::DeletePrimaryKey(_) => "deletePrimaryKey",
        }
    }

    /// Table the action operates on.
    pub fn table(&self) -> &str {
        match self {
            Action::AddTable(p) | Action::DeleteTable(p) => &p.name,
            Action::AddColumn(p) => &p.table,
            Action::DeleteColumn(p) | Action::AddPrimaryKey(p) | Action::DeletePrimaryKey(p) => {
                &p.table
            }
        }
    }

    /// Reject blank names before the action reaches the log.
    pub fn validate(&self) -> Result<()> {
        match self {
            Action::AddTable(p) | Action::DeleteTable(p) => required("table name", &p.name),
            Action::AddColumn(p) => {
                required("table name", &p.table)?;
                required("column name", &p.column)?;
                required("column type", &p.column_type)
            }
            Action::DeleteColumn(p) | Action::AddPrimaryKey(p) | Action::DeletePrimaryKey(p) => {
                required("table name", &p.table)?;
                required("column name", &p.column)
            }
        }
    }
}

fn required(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CubesError::InvalidArgument(format!("{} is required", what)));
    }
    Ok(())
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AddTable(p) | Action::DeleteTable(p) => {
                write!(f, "{} {}", self.method(), p.name)
            }
            Action::AddColumn(p) => {
                write!(f, "{} {}.{} {}", self.method(), p.table, p.column, p.column_type)?;
                if !p.is_nullable {
                    write!(f, " not null")?;
                }
                if !p.default_value.is_empty() {
                    write!(f, " default '{}'", p.default_value)?;
                }
                Ok(())
            }
            Action::DeleteColumn(p) | Action::AddPrimaryKey(p) | Action::DeletePrimaryKey(p) => {
                write!(f, "{} {}.{}", self.method(), p.table, p.column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let action = Action::add_column("users", "email", "text", true, "");
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "addColumn",
                "params": {
                    "table": "users",
                    "column": "email",
                    "type": "text",
                    "isNullable": true,
                    "defaultValue": ""
                }
            })
        );
    }

    #[test]
    fn test_decode_every_method() {
        let raw = json!([
            {"method": "addTable", "params": {"name": "users"}},
            {"method": "deleteTable", "params": {"name": "users"}},
            {"method": "addColumn", "params": {"table": "users", "column": "id", "type": "uuid"}},
            {"method": "deleteColumn", "params": {"table": "users", "column": "id"}},
            {"method": "addPrimaryKey", "params": {"table": "users", "column": "id"}},
            {"method": "deletePrimaryKey", "params": {"table": "users", "column": "id"}}
        ]);

        let actions: Vec<Action> = serde_json::from_value(raw).unwrap();
        let methods: Vec<_> = actions.iter().map(Action::method).collect();
        assert_eq!(
            methods,
            [
                "addTable",
                "deleteTable",
                "addColumn",
                "deleteColumn",
                "addPrimaryKey",
                "deletePrimaryKey"
            ]
        );

        // Missing optional params fall back to nullable=false, no default.
        match &actions[2] {
            Action::AddColumn(p) => {
                assert!(!p.is_nullable);
                assert!(p.default_value.is_empty());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_from_parts() {
        let action = Action::from_parts("addPrimaryKey", json!({"table": "users", "column": "id"}))
            .unwrap();
        assert_eq!(action, Action::add_primary_key("users", "id"));

        let err = Action::from_parts("addTable", json!({"table": "users"})).unwrap_err();
        assert!(matches!(err, CubesError::Format(_)));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let raw = json!({"method": "renameColumn", "params": {"oldName": "a", "newName": "b"}});
        assert!(serde_json::from_value::<Action>(raw).is_err());
    }

    #[test]
    fn test_validate_blank_names() {
        assert!(Action::add_table("users").validate().is_ok());

        let err = Action::add_table("  ").validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: table name is required");

        let err = Action::add_column("users", "email", "", true, "").validate().unwrap_err();
        assert!(err.to_string().contains("column type is required"));

        let err = Action::add_primary_key("users", "").validate().unwrap_err();
        assert!(err.to_string().contains("column name is required"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Action::add_table("users").to_string(), "addTable users");
        assert_eq!(
            Action::add_column("users", "age", "int", false, "0").to_string(),
            "addColumn users.age int not null default '0'"
        );
        assert_eq!(
            Action::delete_primary_key("users", "id").to_string(),
            "deletePrimaryKey users.id"
        );
    }
}
