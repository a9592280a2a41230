//! Derived schema state.
//!
//! A [`Snapshot`] is never persisted. It is rebuilt on demand by folding a
//! prefix of the action log, starting from an empty schema.

use std::collections::BTreeMap;

use serde::Serialize;

use super::action::Action;
use super::migration::Migration;
use crate::error::{CubesError, Result};

/// Migration id reported for a candidate action when the log is empty.
pub const PENDING_MIGRATION: &str = "<pending>";

/// A column as seen by the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// A table: columns in declaration order and the ordered primary-key list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
    columns: Vec<Column>,
    primary_keys: Vec<String>,
}

impl Table {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary-key columns in the order they were added.
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|k| k == column)
    }
}

/// Schema state after some prefix of the action log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    tables: BTreeMap<String, Table>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sequence of actions into a fresh snapshot.
    ///
    /// Errors carry no migration context; see [`replay`] for that.
    pub fn fold<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Result<Self> {
        let mut snapshot = Self::new();
        for action in actions {
            snapshot.apply(action)?;
        }
        Ok(snapshot)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Apply one action, checking its precondition first.
    ///
    /// On error the snapshot is left untouched.
    pub fn apply(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::AddTable(p) => {
                if self.tables.contains_key(&p.name) {
                    return Err(CubesError::Conflict(format!(
                        "table '{}' already exists",
                        p.name
                    )));
                }
                self.tables.insert(p.name.clone(), Table::new(&p.name));
            }
            Action::DeleteTable(p) => {
                if self.tables.remove(&p.name).is_none() {
                    return Err(table_not_found(&p.name));
                }
            }
            Action::AddColumn(p) => {
                let table = self.table_mut(&p.table)?;
                if table.column(&p.column).is_some() {
                    return Err(CubesError::Conflict(format!(
                        "column '{}' already exists in table '{}'",
                        p.column, p.table
                    )));
                }
                table.columns.push(Column {
                    name: p.column.clone(),
                    sql_type: p.column_type.clone(),
                    nullable: p.is_nullable,
                    default: (!p.default_value.is_empty()).then(|| p.default_value.clone()),
                });
            }
            Action::DeleteColumn(p) => {
                let table = self.table_mut(&p.table)?;
                let position = table
                    .columns
                    .iter()
                    .position(|c| c.name == p.column)
                    .ok_or_else(|| column_not_found(&p.table, &p.column))?;
                table.columns.remove(position);
                table.primary_keys.retain(|k| k != &p.column);
            }
            Action::AddPrimaryKey(p) => {
                let table = self.table_mut(&p.table)?;
                if table.column(&p.column).is_none() {
                    return Err(column_not_found(&p.table, &p.column));
                }
                if table.is_primary_key(&p.column) {
                    return Err(CubesError::Conflict(format!(
                        "column '{}' is already a primary key of table '{}'",
                        p.column, p.table
                    )));
                }
                table.primary_keys.push(p.column.clone());
            }
            Action::DeletePrimaryKey(p) => {
                let table = self.table_mut(&p.table)?;
                let position = table
                    .primary_keys
                    .iter()
                    .position(|k| k == &p.column)
                    .ok_or_else(|| {
                        CubesError::NotFound(format!(
                            "column '{}' is not a primary key of table '{}'",
                            p.column, p.table
                        ))
                    })?;
                table.primary_keys.remove(position);
            }
        }

        Ok(())
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables.get_mut(name).ok_or_else(|| table_not_found(name))
    }
}

fn table_not_found(name: &str) -> CubesError {
    CubesError::NotFound(format!("table '{}' doesn't exist", name))
}

fn column_not_found(table: &str, column: &str) -> CubesError {
    CubesError::NotFound(format!(
        "column '{}' doesn't exist in table '{}'",
        column, table
    ))
}

fn apply_in_context(
    snapshot: &mut Snapshot,
    migration_id: &str,
    index: usize,
    action: &Action,
) -> Result<()> {
    snapshot
        .apply(action)
        .map_err(|e| e.in_action(migration_id, index, action.method()))
}

/// Fold the whole log, in order.
pub fn replay(log: &[Migration]) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for migration in log {
        for (index, action) in migration.actions.iter().enumerate() {
            apply_in_context(&mut snapshot, migration.id.as_str(), index, action)?;
        }
    }
    Ok(snapshot)
}

/// Schema state just before action `action_index` of migration `migration_id`.
///
/// Replays every earlier migration in full and the target migration up to,
/// but excluding, the given action.
pub fn snapshot_as_of(log: &[Migration], migration_id: &str, action_index: usize) -> Result<Snapshot> {
    let position = log
        .iter()
        .position(|m| m.id == migration_id)
        .ok_or_else(|| CubesError::NotFound(format!("migration {} doesn't exist", migration_id)))?;

    let target = &log[position];
    if action_index >= target.actions.len() {
        return Err(CubesError::NotFound(format!(
            "migration {} has no action #{}",
            migration_id, action_index
        )));
    }

    let mut snapshot = replay(&log[..position])?;
    for (index, action) in target.actions[..action_index].iter().enumerate() {
        apply_in_context(&mut snapshot, target.id.as_str(), index, action)?;
    }

    Ok(snapshot)
}

/// Schema state after the whole log plus one trailing candidate action.
///
/// The candidate is reported as the next action of the latest migration.
pub fn preview_with_hypothetical(log: &[Migration], candidate: &Action) -> Result<Snapshot> {
    let mut snapshot = replay(log)?;

    let (migration_id, index) = match log.last() {
        Some(latest) => (latest.id.as_str(), latest.actions.len()),
        None => (PENDING_MIGRATION, 0),
    };
    apply_in_context(&mut snapshot, migration_id, index, candidate)?;

    Ok(snapshot)
}
