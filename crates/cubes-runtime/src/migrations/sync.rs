//! Sync engine: brings the target store up to the head of the action log.
//!
//! A run reads the whole log, opens one transaction, applies every pending
//! migration inside it and commits once at the end. Any failure rolls back
//! everything the run did, including migrations that already succeeded
//! earlier in the same run.

use tracing::{debug, info, warn};

use cubes_core::config::SyncConfig;
use cubes_core::error::{CubesError, Result};
use cubes_core::schema::{self, Action, Migration, MigrationId, Snapshot};

use super::ddl::DdlCompiler;
use super::store::ActionLogStore;
use super::target::{SyncTarget, SyncTransaction};

/// What a committed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Marker read at the start of the run.
    pub marker_before: Option<MigrationId>,
    /// Migrations applied, in order.
    pub applied: Vec<MigrationId>,
    /// Number of DDL statements executed.
    pub statements: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applied vs pending migrations, as a sync run would see them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub marker: Option<MigrationId>,
    pub applied: Vec<MigrationId>,
    pub pending: Vec<MigrationId>,
}

/// Split the ordered log into (already synced, pending).
///
/// Everything up to and including the marker counts as synced. A marker that
/// matches no logged migration is treated as no marker at all.
pub fn partition<'a>(
    log: &'a [Migration],
    marker: Option<&MigrationId>,
) -> (&'a [Migration], &'a [Migration]) {
    let Some(marker) = marker else {
        return (&[], log);
    };

    if !log.iter().any(|m| &m.id == marker) {
        warn!(
            marker = %marker,
            "Sync marker matches no migration in the log; every migration will be applied"
        );
        return (&[], log);
    }

    log.split_at(log.partition_point(|m| &m.id <= marker))
}

/// Synchronizes a target store with the action log.
pub struct SyncEngine<T: SyncTarget> {
    store: ActionLogStore,
    target: T,
    ddl: DdlCompiler,
}

impl<T: SyncTarget> SyncEngine<T> {
    pub fn new(config: SyncConfig, store: ActionLogStore, target: T) -> Self {
        Self {
            store,
            target,
            ddl: DdlCompiler::new(config),
        }
    }

    /// Run one sync. `Ok` means committed; `Err` means rolled back.
    pub async fn sync(&self) -> Result<SyncReport> {
        // An unreadable log aborts before the target is touched.
        let log = self.store.list_migrations()?;

        let mut tx = self.target.begin().await?;
        match self.apply_pending(tx.as_mut(), &log).await {
            Ok(report) => {
                tx.commit().await?;
                info!(
                    applied = report.applied.len(),
                    statements = report.statements,
                    "Sync committed"
                );
                Ok(report)
            }
            Err(e) => {
                warn!("Sync failed, rolling back: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Failed to roll back sync transaction: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Report applied and pending migrations without changing anything.
    pub async fn status(&self) -> Result<SyncStatus> {
        let log = self.store.list_migrations()?;

        let mut tx = self.target.begin().await?;
        let marker = read_marker(tx.as_mut()).await;
        if let Err(e) = tx.rollback().await {
            warn!("Failed to close status transaction: {}", e);
        }
        let marker = marker?;

        let (applied, pending) = partition(&log, marker.as_ref());
        Ok(SyncStatus {
            applied: applied.iter().map(|m| m.id.clone()).collect(),
            pending: pending.iter().map(|m| m.id.clone()).collect(),
            marker,
        })
    }

    async fn apply_pending(
        &self,
        tx: &mut dyn SyncTransaction,
        log: &[Migration],
    ) -> Result<SyncReport> {
        let marker = read_marker(tx).await?;
        debug!("Current sync marker: {:?}", marker);

        // The whole log must fold cleanly before any DDL runs.
        schema::replay(log).map_err(|e| CubesError::SchemaInconsistency(Box::new(e)))?;

        let (_, pending) = partition(log, marker.as_ref());
        let mut report = SyncReport {
            marker_before: marker,
            applied: Vec::with_capacity(pending.len()),
            statements: 0,
        };

        for migration in pending {
            info!(migration = %migration.id, "Applying migration: {}", migration.description);

            for (index, action) in migration.actions.iter().enumerate() {
                let in_action =
                    |e: CubesError| e.in_action(migration.id.as_str(), index, action.method());

                let statements = self.compile(log, migration, index, action).map_err(in_action)?;
                for statement in &statements {
                    debug!(migration = %migration.id, index, "{}", statement);
                    tx.execute(statement).await.map_err(in_action)?;
                    report.statements += 1;
                }
            }

            tx.record_migration(migration).await?;
            report.applied.push(migration.id.clone());
            info!(migration = %migration.id, "Migration applied");
        }

        Ok(report)
    }

    /// Statements for one action of a pending migration.
    fn compile(
        &self,
        log: &[Migration],
        migration: &Migration,
        index: usize,
        action: &Action,
    ) -> Result<Vec<String>> {
        match action {
            Action::AddTable(p) => Ok(vec![self.ddl.create_table(&p.name)]),
            Action::DeleteTable(p) => Ok(vec![self.ddl.drop_table(&p.name)]),
            Action::AddColumn(p) => Ok(vec![self.ddl.add_column(p)]),
            Action::DeleteColumn(p) => {
                let before = self.snapshot_before(log, migration, index)?;
                self.ddl.drop_column(table_in(&before, &p.table)?, &p.column)
            }
            Action::AddPrimaryKey(p) => {
                let before = self.snapshot_before(log, migration, index)?;
                self.ddl.add_primary_key(table_in(&before, &p.table)?, &p.column)
            }
            Action::DeletePrimaryKey(p) => {
                let before = self.snapshot_before(log, migration, index)?;
                self.ddl.delete_primary_key(table_in(&before, &p.table)?, &p.column)
            }
        }
    }

    fn snapshot_before(
        &self,
        log: &[Migration],
        migration: &Migration,
        index: usize,
    ) -> Result<Snapshot> {
        schema::snapshot_as_of(log, migration.id.as_str(), index)
    }
}

async fn read_marker(tx: &mut dyn SyncTransaction) -> Result<Option<MigrationId>> {
    tx.ensure_bookkeeping().await?;
    tx.read_marker().await
}

fn table_in<'a>(snapshot: &'a Snapshot, name: &str) -> Result<&'a schema::Table> {
    snapshot
        .table(name)
        .ok_or_else(|| CubesError::NotFound(format!("table '{}' doesn't exist", name)))
}
