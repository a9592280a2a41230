//! Action log store.
//!
//! The log is a directory with one JSON record per migration, named
//! `<id>.json`. It is the only source of truth; nothing is cached between
//! calls.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use cubes_core::error::{CubesError, Result};
use cubes_core::schema::{self, Action, Migration, MigrationId, Snapshot};

const RECORD_EXTENSION: &str = "json";

/// Filesystem-backed, append-only log of migrations.
#[derive(Debug, Clone)]
pub struct ActionLogStore {
    dir: PathBuf,
}

impl ActionLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Create an empty migration with an id taken from the current time.
    pub fn create_migration(&self, description: &str) -> Result<MigrationId> {
        self.create_migration_with_id(MigrationId::now(), description)
    }

    /// Create an empty migration under an explicit id.
    ///
    /// An existing record with the same id is never overwritten, and the new
    /// id must sort after every logged one so it becomes the appendable head.
    pub fn create_migration_with_id(
        &self,
        id: MigrationId,
        description: &str,
    ) -> Result<MigrationId> {
        let path = self.record_path(id.as_str())?;
        if path.exists() {
            return Err(CubesError::Conflict(format!(
                "migration {} already exists",
                id
            )));
        }

        if let Some(latest) = self.list_migrations()?.last() {
            if latest.id > id {
                return Err(CubesError::Precondition(format!(
                    "migration {} would sort before the latest migration {}",
                    id, latest.id
                )));
            }
        }

        let migration = Migration::new(id.clone(), description);
        self.write(&migration)?;

        info!(migration = %id, "Migration created");
        Ok(id)
    }

    /// All migrations, ascending by id. A missing directory is an empty log.
    pub fn list_migrations(&self) -> Result<Vec<Migration>> {
        if !self.dir.exists() {
            debug!("Migrations directory does not exist: {:?}", self.dir);
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        let mut migrations = Vec::with_capacity(paths.len());
        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| CubesError::Format(format!("invalid migration file name {:?}", path)))?;
            migrations.push(read_record(&path, stem)?);
        }
        // File names carry an extension, so order by the parsed id.
        migrations.sort_by(|a, b| a.id.cmp(&b.id));

        debug!("Loaded {} migrations", migrations.len());
        Ok(migrations)
    }

    pub fn get_migration(&self, id: &str) -> Result<Migration> {
        let path = self.existing_record_path(id)?;
        read_record(&path, id)
    }

    /// Raw persisted record of a migration.
    pub fn migration_text(&self, id: &str) -> Result<String> {
        let path = self.existing_record_path(id)?;
        Ok(fs::read_to_string(path)?)
    }

    /// Append an action to the latest migration.
    pub fn append_action(&self, action: Action) -> Result<MigrationId> {
        let log = self.list_migrations()?;
        let latest = log.last().ok_or_else(no_migrations)?;
        let id = latest.id.clone();
        self.append_to_latest(log, id.as_str(), action)
    }

    /// Append an action given as a `(method, params)` pair.
    pub fn append(&self, method: &str, params: serde_json::Value) -> Result<MigrationId> {
        self.append_action(Action::from_parts(method, params)?)
    }

    /// Append an action to a named migration, which must be the latest one.
    pub fn append_action_to(&self, id: &str, action: Action) -> Result<MigrationId> {
        let log = self.list_migrations()?;
        self.append_to_latest(log, id, action)
    }

    fn append_to_latest(
        &self,
        mut log: Vec<Migration>,
        id: &str,
        action: Action,
    ) -> Result<MigrationId> {
        action.validate()?;

        let latest = log.last().ok_or_else(no_migrations)?;
        if latest.id != id {
            if log.iter().any(|m| m.id == id) {
                return Err(CubesError::Precondition(format!(
                    "migration {} is superseded by {}; only the latest migration accepts new actions",
                    id, latest.id
                )));
            }
            return Err(CubesError::NotFound(format!("migration {} doesn't exist", id)));
        }

        // Dry run: nothing is written unless the whole log still folds.
        schema::preview_with_hypothetical(&log, &action)?;

        let Some(target) = log.last_mut() else {
            return Err(no_migrations());
        };
        debug!(migration = %target.id, action = %action, "Appending action");
        target.actions.push(action);
        self.write(target)?;

        Ok(target.id.clone())
    }

    /// Schema state after the whole log.
    pub fn current_snapshot(&self) -> Result<Snapshot> {
        schema::replay(&self.list_migrations()?)
    }

    /// Schema state just before the given action of the given migration.
    pub fn snapshot_as_of(&self, migration_id: &str, action_index: usize) -> Result<Snapshot> {
        schema::snapshot_as_of(&self.list_migrations()?, migration_id, action_index)
    }

    /// Schema state after the whole log plus a candidate action.
    pub fn preview_with_hypothetical(&self, action: &Action) -> Result<Snapshot> {
        schema::preview_with_hypothetical(&self.list_migrations()?, action)
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(CubesError::InvalidArgument(format!(
                "invalid migration id '{}'",
                id
            )));
        }
        Ok(self.dir.join(format!("{}.{}", id, RECORD_EXTENSION)))
    }

    fn existing_record_path(&self, id: &str) -> Result<PathBuf> {
        let path = self.record_path(id)?;
        if !path.is_file() {
            return Err(CubesError::NotFound(format!("migration {} doesn't exist", id)));
        }
        Ok(path)
    }

    fn write(&self, migration: &Migration) -> Result<()> {
        let path = self.record_path(migration.id.as_str())?;
        atomic_write(&path, migration.to_pretty_json()?.as_bytes())
    }
}

fn no_migrations() -> CubesError {
    CubesError::Precondition("migration doesn't exist, please add migration".to_string())
}

fn read_record(path: &Path, expected_id: &str) -> Result<Migration> {
    let text = fs::read_to_string(path)?;
    let migration = Migration::from_json(&text)
        .map_err(|e| CubesError::Format(format!("{}: {}", path.display(), e)))?;

    if migration.id != expected_id {
        return Err(CubesError::Format(format!(
            "{}: record id {} doesn't match its file name",
            path.display(),
            migration.id
        )));
    }

    Ok(migration)
}

/// Write through a temp file and rename, so readers never see a partial record.
fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp = target.with_extension("tmp");
    fs::write(&temp, content)?;
    fs::rename(&temp, target)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubes_core::error::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, ActionLogStore) {
        let dir = TempDir::new().unwrap();
        let store = ActionLogStore::new(dir.path().join("migrations"));
        (dir, store)
    }

    fn create(store: &ActionLogStore, id: &str) -> MigrationId {
        store
            .create_migration_with_id(MigrationId::new(id), &format!("migration {}", id))
            .unwrap()
    }

    #[test]
    fn test_missing_directory_is_empty_log() {
        let (_dir, store) = store();
        assert!(store.list_migrations().unwrap().is_empty());
    }

    #[test]
    fn test_create_migration_creates_directory() {
        let (_dir, store) = store();
        let id = store.create_migration("initial").unwrap();

        assert!(store.directory().is_dir());
        let migration = store.get_migration(id.as_str()).unwrap();
        assert_eq!(migration.description, "initial");
        assert!(migration.actions.is_empty());
        assert_eq!(migration.schema_version, "1");
    }

    #[test]
    fn test_same_id_is_not_overwritten() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        store.append_action(Action::add_table("users")).unwrap();

        let err = store
            .create_migration_with_id(MigrationId::new("20240101000000"), "again")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.get_migration("20240101000000").unwrap().actions.len(), 1);
    }

    /// Write a record without going through creation checks.
    fn write_raw(store: &ActionLogStore, id: &str) {
        fs::create_dir_all(store.directory()).unwrap();
        let migration = Migration::new(MigrationId::new(id), id);
        fs::write(
            store.directory().join(format!("{}.json", id)),
            migration.to_pretty_json().unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let (_dir, store) = store();
        write_raw(&store, "20240103000000");
        write_raw(&store, "20240101000000");
        write_raw(&store, "20240102000000");
        fs::write(store.directory().join("readme.txt"), "not a migration").unwrap();

        let ids: Vec<_> = store
            .list_migrations()
            .unwrap()
            .into_iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(ids, ["20240101000000", "20240102000000", "20240103000000"]);
    }

    #[test]
    fn test_list_orders_by_id_not_file_name() {
        let (_dir, store) = store();
        // '-' sorts before '.', so "2024-1.json" < "2024.json" as paths.
        create(&store, "2024");
        create(&store, "2024-1");

        let ids: Vec<_> = store
            .list_migrations()
            .unwrap()
            .into_iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(ids, ["2024", "2024-1"]);
        assert_eq!(
            store.append_action(Action::add_table("users")).unwrap(),
            MigrationId::new("2024-1")
        );
    }

    #[test]
    fn test_create_rejects_id_before_latest() {
        let (_dir, store) = store();
        create(&store, "20240102000000");

        let err = store
            .create_migration_with_id(MigrationId::new("20240101000000"), "late")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(!store.directory().join("20240101000000.json").exists());
        assert_eq!(store.list_migrations().unwrap().len(), 1);
    }

    #[test]
    fn test_list_rejects_malformed_record() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        fs::write(store.directory().join("20240102000000.json"), "{ not json").unwrap();

        let err = store.list_migrations().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_list_rejects_mismatched_id() {
        let (_dir, store) = store();
        let record = Migration::new(MigrationId::new("20240101000000"), "misplaced");
        fs::create_dir_all(store.directory()).unwrap();
        fs::write(
            store.directory().join("20240505000000.json"),
            record.to_pretty_json().unwrap(),
        )
        .unwrap();

        let err = store.list_migrations().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_get_missing_migration() {
        let (_dir, store) = store();
        let err = store.get_migration("20240101000000").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.migration_text("20240101000000").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.get_migration("../etc/passwd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_append_requires_migration() {
        let (_dir, store) = store();
        let err = store.append_action(Action::add_table("users")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_append_targets_latest() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        create(&store, "20240102000000");

        let id = store.append_action(Action::add_table("users")).unwrap();
        assert_eq!(id, "20240102000000");
        assert!(store.get_migration("20240101000000").unwrap().actions.is_empty());
        assert_eq!(
            store.get_migration("20240102000000").unwrap().actions,
            vec![Action::add_table("users")]
        );
    }

    #[test]
    fn test_superseded_migration_is_immutable() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        create(&store, "20240102000000");

        let err = store
            .append_action_to("20240101000000", Action::add_table("users"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let err = store
            .append_action_to("20230101000000", Action::add_table("users"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        store
            .append_action_to("20240102000000", Action::add_table("users"))
            .unwrap();
    }

    #[test]
    fn test_append_validation_writes_nothing() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        store.append_action(Action::add_table("users")).unwrap();
        let before = store.migration_text("20240101000000").unwrap();

        let err = store.append_action(Action::add_table("users")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = store
            .append_action(Action::add_column("orders", "id", "int", false, ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.append_action(Action::add_table(" ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(store.migration_text("20240101000000").unwrap(), before);
    }

    #[test]
    fn test_append_validates_across_migrations() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        store.append_action(Action::add_table("users")).unwrap();
        create(&store, "20240102000000");

        store
            .append("addColumn", json!({"table": "users", "column": "email", "type": "text", "isNullable": true}))
            .unwrap();
        let err = store
            .append("addPrimaryKey", json!({"table": "users", "column": "missing"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let snapshot = store.current_snapshot().unwrap();
        assert!(snapshot.table("users").unwrap().column("email").is_some());
    }

    #[test]
    fn test_record_text_is_pretty_json() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        store.append_action(Action::add_table("users")).unwrap();

        let text = store.migration_text("20240101000000").unwrap();
        assert!(text.contains("\n  \"schemaVersion\": \"1\""));
        assert!(text.contains("\"method\": \"addTable\""));
        assert!(!store.directory().join("20240101000000.tmp").exists());
    }

    #[test]
    fn test_snapshot_operations() {
        let (_dir, store) = store();
        create(&store, "20240101000000");
        store.append_action(Action::add_table("users")).unwrap();
        store
            .append_action(Action::add_column("users", "id", "int", false, ""))
            .unwrap();

        let before = store.snapshot_as_of("20240101000000", 1).unwrap();
        assert!(before.table("users").unwrap().columns().is_empty());

        let preview = store
            .preview_with_hypothetical(&Action::add_primary_key("users", "id"))
            .unwrap();
        assert_eq!(preview.table("users").unwrap().primary_keys(), ["id"]);

        // Previews never touch the log.
        assert!(store.current_snapshot().unwrap().table("users").unwrap().primary_keys().is_empty());
    }
}
