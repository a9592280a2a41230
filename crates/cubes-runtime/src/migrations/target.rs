//! The transactional store a sync run writes to.

use futures::future::BoxFuture;

use cubes_core::error::Result;
use cubes_core::schema::{Migration, MigrationId};

/// A store that can open the single transaction a sync run uses.
pub trait SyncTarget: Send + Sync {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn SyncTransaction>>>;
}

/// One open transaction on the target store.
///
/// Nothing executed through it is visible to others until [`commit`].
///
/// [`commit`]: SyncTransaction::commit
pub trait SyncTransaction: Send {
    /// Create the bookkeeping table unless it already exists.
    fn ensure_bookkeeping(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Greatest migration id recorded in the bookkeeping table.
    fn read_marker(&mut self) -> BoxFuture<'_, Result<Option<MigrationId>>>;

    /// Execute one DDL statement.
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Insert the bookkeeping row for a migration whose actions all succeeded.
    fn record_migration<'a>(&'a mut self, migration: &'a Migration) -> BoxFuture<'a, Result<()>>;

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<()>>;

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}
