//! Action log storage and synchronization against a target store.

mod ddl;
mod postgres;
mod store;
mod sync;
mod target;

pub use ddl::{quote_ident, quote_literal, DdlCompiler};
pub use postgres::PgTarget;
pub use store::ActionLogStore;
pub use sync::{partition, SyncEngine, SyncReport, SyncStatus};
pub use target::{SyncTarget, SyncTransaction};
