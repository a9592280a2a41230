use serde::{Deserialize, Serialize};

use super::DatabaseConfig;

/// Placeholder substituted with the table name in constraint names.
pub const TABLE_PLACEHOLDER: &str = "{table}";

/// Action log and bookkeeping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding one JSON record per migration.
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Engine-owned table recording applied migrations.
    #[serde(default = "default_bookkeeping_table")]
    pub bookkeeping_table: String,

    /// Name of the primary-key constraint. `{table}` expands to the table name.
    #[serde(default = "default_primary_key_constraint")]
    pub primary_key_constraint: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            bookkeeping_table: default_bookkeeping_table(),
            primary_key_constraint: default_primary_key_constraint(),
        }
    }
}

fn default_directory() -> String {
    "migrations".to_string()
}

fn default_bookkeeping_table() -> String {
    "_migrations".to_string()
}

fn default_primary_key_constraint() -> String {
    "{table}_pkey".to_string()
}

/// Everything a sync engine needs to know about its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Connection string of the target store.
    pub connection_string: String,
    /// Primary-key constraint name (may contain `{table}`).
    pub primary_key_constraint: String,
    /// Bookkeeping table name.
    pub bookkeeping_table: String,
}

impl SyncConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        let defaults = MigrationsConfig::default();
        Self {
            connection_string: connection_string.into(),
            primary_key_constraint: defaults.primary_key_constraint,
            bookkeeping_table: defaults.bookkeeping_table,
        }
    }

    pub fn from_parts(database: &DatabaseConfig, migrations: &MigrationsConfig) -> Self {
        Self {
            connection_string: database.url.clone(),
            primary_key_constraint: migrations.primary_key_constraint.clone(),
            bookkeeping_table: migrations.bookkeeping_table.clone(),
        }
    }

    pub fn with_primary_key_constraint(mut self, name: impl Into<String>) -> Self {
        self.primary_key_constraint = name.into();
        self
    }

    /// Constraint name used for the given table.
    pub fn constraint_name_for(&self, table: &str) -> String {
        self.primary_key_constraint.replace(TABLE_PLACEHOLDER, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_name_placeholder() {
        let config = SyncConfig::new("postgres://localhost/test");
        assert_eq!(config.constraint_name_for("users"), "users_pkey");

        let fixed = config.with_primary_key_constraint("pkey");
        assert_eq!(fixed.constraint_name_for("users"), "pkey");
    }

    #[test]
    fn test_from_parts() {
        let database = DatabaseConfig {
            url: "postgres://localhost/app".into(),
            ..Default::default()
        };
        let migrations = MigrationsConfig {
            bookkeeping_table: "schema_log".into(),
            ..Default::default()
        };

        let config = SyncConfig::from_parts(&database, &migrations);
        assert_eq!(config.connection_string, "postgres://localhost/app");
        assert_eq!(config.bookkeeping_table, "schema_log");
        assert_eq!(config.primary_key_constraint, "{table}_pkey");
    }
}
