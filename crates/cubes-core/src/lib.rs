pub mod config;
pub mod error;
pub mod schema;

pub use config::{CubesConfig, SyncConfig};
pub use error::{CubesError, ErrorKind, Result};
pub use schema::{Action, Migration, MigrationId, Snapshot};
