use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::Action;
use crate::error::{CubesError, Result};

/// Record format version written into every migration file.
pub const SCHEMA_VERSION: &str = "1";

/// Timestamp layout of migration ids: second resolution, UTC.
const ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Identifier of a migration. Lexicographic order is creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(String);

impl MigrationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate an id for the given instant.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant.format(ID_FORMAT).to_string())
    }

    /// Allocate an id from the current time.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for MigrationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MigrationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// An ordered, named batch of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub schema_version: String,
    pub id: MigrationId,
    pub description: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Migration {
    /// A fresh migration with no actions.
    pub fn new(id: MigrationId, description: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            id,
            description: description.into(),
            actions: Vec::new(),
        }
    }

    /// Parse a persisted record.
    pub fn from_json(text: &str) -> Result<Self> {
        let migration: Migration = serde_json::from_str(text)
            .map_err(|e| CubesError::Format(format!("can't parse migration: {}", e)))?;

        if migration.schema_version != SCHEMA_VERSION {
            return Err(CubesError::Format(format!(
                "migration {} has unsupported schema version '{}'",
                migration.id, migration.schema_version
            )));
        }

        Ok(migration)
    }

    /// Pretty form used for the files in the log directory.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compact form stored in the bookkeeping table.
    pub fn to_compact_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
