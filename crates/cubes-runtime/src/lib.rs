//! Runtime for cubes: the on-disk action log, the DDL compiler and the
//! transactional sync engine.

pub mod db;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use db::Database;
pub use migrations::{ActionLogStore, PgTarget, SyncEngine, SyncReport, SyncStatus};
