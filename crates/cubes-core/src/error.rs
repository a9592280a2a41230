use thiserror::Error;

/// Core error type for cubes operations.
#[derive(Error, Debug)]
pub enum CubesError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Schema inconsistency: {0}")]
    SchemaInconsistency(Box<CubesError>),

    #[error("Migration {migration_id}, action #{index} ({method}): {source}")]
    Action {
        migration_id: String,
        index: usize,
        method: String,
        #[source]
        source: Box<CubesError>,
    },
}

/// Error taxonomy, independent of the message carried by each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Format,
    Io,
    InvalidArgument,
    NotFound,
    Conflict,
    Precondition,
    SchemaInconsistency,
}

impl CubesError {
    /// Attach migration/action context to an error.
    pub fn in_action(
        self,
        migration_id: impl Into<String>,
        index: usize,
        method: impl Into<String>,
    ) -> Self {
        CubesError::Action {
            migration_id: migration_id.into(),
            index,
            method: method.into(),
            source: Box::new(self),
        }
    }

    /// Kind of this error. Context wrappers report the kind of what they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CubesError::Config(_) => ErrorKind::Config,
            CubesError::Format(_) => ErrorKind::Format,
            CubesError::Io(_) | CubesError::Database(_) | CubesError::Sql(_) => ErrorKind::Io,
            CubesError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CubesError::NotFound(_) => ErrorKind::NotFound,
            CubesError::Conflict(_) => ErrorKind::Conflict,
            CubesError::Precondition(_) => ErrorKind::Precondition,
            CubesError::SchemaInconsistency(_) => ErrorKind::SchemaInconsistency,
            CubesError::Action { source, .. } => source.kind(),
        }
    }

    /// Kind of the innermost cause, looking through inconsistency wrappers.
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            CubesError::SchemaInconsistency(inner) => inner.root_kind(),
            CubesError::Action { source, .. } => source.root_kind(),
            other => other.kind(),
        }
    }

    /// Migration id carried by the error, if any.
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            CubesError::Action { migration_id, .. } => Some(migration_id),
            CubesError::SchemaInconsistency(inner) => inner.migration_id(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CubesError {
    fn from(e: serde_json::Error) -> Self {
        CubesError::Format(e.to_string())
    }
}

/// Result type alias using CubesError.
pub type Result<T> = std::result::Result<T, CubesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_context_display() {
        let err = CubesError::NotFound("table 'users'".into()).in_action("20240101000000", 2, "addColumn");
        assert_eq!(
            err.to_string(),
            "Migration 20240101000000, action #2 (addColumn): Not found: table 'users'"
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.migration_id(), Some("20240101000000"));
    }

    #[test]
    fn test_root_kind_through_inconsistency() {
        let inner = CubesError::Conflict("table 'users'".into()).in_action("m1", 0, "addTable");
        let err = CubesError::SchemaInconsistency(Box::new(inner));
        assert_eq!(err.kind(), ErrorKind::SchemaInconsistency);
        assert_eq!(err.root_kind(), ErrorKind::Conflict);
        assert_eq!(err.migration_id(), Some("m1"));
    }

    #[test]
    fn test_json_error_is_format() {
        let err: CubesError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
