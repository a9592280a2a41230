//! PostgreSQL DDL for each action kind.

use cubes_core::config::SyncConfig;
use cubes_core::error::{CubesError, Result};
use cubes_core::schema::{AddColumnParams, Table};

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Turns actions into statements. Primary-key statements need the table as
/// it was just before the action.
#[derive(Debug, Clone)]
pub struct DdlCompiler {
    config: SyncConfig,
}

impl DdlCompiler {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    fn constraint(&self, table: &str) -> String {
        quote_ident(&self.config.constraint_name_for(table))
    }

    pub fn create_table(&self, table: &str) -> String {
        format!("CREATE TABLE {} ()", quote_ident(table))
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", quote_ident(table))
    }

    pub fn add_column(&self, params: &AddColumnParams) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(&params.table),
            quote_ident(&params.column),
            params.column_type
        );

        if !params.is_nullable {
            sql.push_str(" NOT NULL");
        }

        if !params.default_value.is_empty() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&quote_literal(&params.default_value));
        }

        sql
    }

    /// Drop a column. PostgreSQL drops any constraint that covers the column,
    /// so a composite key is recreated over the columns that remain.
    pub fn drop_column(&self, before: &Table, column: &str) -> Result<Vec<String>> {
        if before.column(column).is_none() {
            return Err(CubesError::NotFound(format!(
                "column '{}' doesn't exist in table '{}'",
                column, before.name
            )));
        }

        let mut statements = vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(&before.name),
            quote_ident(column)
        )];

        if before.is_primary_key(column) {
            let remaining: Vec<&str> = before
                .primary_keys()
                .iter()
                .map(String::as_str)
                .filter(|k| *k != column)
                .collect();
            if !remaining.is_empty() {
                statements.push(self.add_constraint(&before.name, &remaining));
            }
        }

        Ok(statements)
    }

    /// Replace the table's key with one that also covers `column`.
    pub fn add_primary_key(&self, before: &Table, column: &str) -> Result<Vec<String>> {
        if before.column(column).is_none() {
            return Err(CubesError::NotFound(format!(
                "column '{}' doesn't exist in table '{}'",
                column, before.name
            )));
        }
        if before.is_primary_key(column) {
            return Err(CubesError::Conflict(format!(
                "column '{}' is already a primary key of table '{}'",
                column, before.name
            )));
        }

        let mut statements = Vec::with_capacity(2);
        if !before.primary_keys().is_empty() {
            statements.push(self.drop_constraint(&before.name));
        }

        let mut keys: Vec<&str> = before.primary_keys().iter().map(String::as_str).collect();
        keys.push(column);
        statements.push(self.add_constraint(&before.name, &keys));

        Ok(statements)
    }

    /// Replace the table's key with one that no longer covers `column`.
    ///
    /// When no key column remains the table is left without a primary key.
    pub fn delete_primary_key(&self, before: &Table, column: &str) -> Result<Vec<String>> {
        if !before.is_primary_key(column) {
            return Err(CubesError::NotFound(format!(
                "column '{}' is not a primary key of table '{}'",
                column, before.name
            )));
        }

        let mut statements = vec![self.drop_constraint(&before.name)];

        let remaining: Vec<&str> = before
            .primary_keys()
            .iter()
            .map(String::as_str)
            .filter(|k| *k != column)
            .collect();
        if !remaining.is_empty() {
            statements.push(self.add_constraint(&before.name, &remaining));
        }

        Ok(statements)
    }

    fn drop_constraint(&self, table: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote_ident(table),
            self.constraint(table)
        )
    }

    fn add_constraint(&self, table: &str, keys: &[&str]) -> String {
        let columns: Vec<String> = keys.iter().map(|k| quote_ident(k)).collect();
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            quote_ident(table),
            self.constraint(table),
            columns.join(", ")
        )
    }
}
