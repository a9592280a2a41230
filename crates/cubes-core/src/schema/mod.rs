mod action;
mod migration;
mod snapshot;

pub use action::{Action, AddColumnParams, ColumnParams, TableParams};
pub use migration::{Migration, MigrationId, SCHEMA_VERSION};
pub use snapshot::{
    preview_with_hypothetical, replay, snapshot_as_of, Column, Snapshot, Table, PENDING_MIGRATION,
};
