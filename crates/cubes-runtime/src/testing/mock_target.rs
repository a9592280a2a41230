//! In-memory sync target.
//!
//! Interprets the DDL emitted by the sync engine against a small catalog so
//! tests can check the resulting schema without a database. Work done inside
//! a transaction only becomes visible on commit.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use cubes_core::error::{CubesError, Result};
use cubes_core::schema::{Migration, MigrationId};

use crate::migrations::{SyncTarget, SyncTransaction};

/// A column as the mock catalog sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockColumn {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// A table in the mock catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MockTable {
    pub name: String,
    pub columns: Vec<MockColumn>,
    /// Constraint name and key columns in declaration order.
    pub constraint: Option<(String, Vec<String>)>,
}

impl MockTable {
    pub fn column(&self, name: &str) -> Option<&MockColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<(&str, &[String])> {
        self.constraint
            .as_ref()
            .map(|(name, keys)| (name.as_str(), keys.as_slice()))
    }
}

#[derive(Debug, Clone, Default)]
struct Catalog {
    tables: BTreeMap<String, MockTable>,
    bookkeeping: bool,
    rows: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    committed: Catalog,
    statements: Vec<String>,
    fail_on: Option<String>,
    transactions: usize,
    commits: usize,
    rollbacks: usize,
}

/// Sync target backed by an in-memory catalog.
///
/// Clones share state, so a test can hand one clone to the engine and
/// inspect another.
#[derive(Debug, Clone, Default)]
pub struct MockTarget {
    state: Arc<Mutex<State>>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `fragment`.
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state.lock().unwrap().fail_on = Some(fragment.into());
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap().fail_on = None;
    }

    /// Create an empty committed table.
    pub fn seed_table(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.committed.tables.insert(
            name.to_string(),
            MockTable {
                name: name.to_string(),
                ..Default::default()
            },
        );
    }

    /// Insert a committed bookkeeping row.
    pub fn seed_record(&self, id: &str, data: &str) {
        let mut state = self.state.lock().unwrap();
        state.committed.bookkeeping = true;
        state.committed.rows.insert(id.to_string(), data.to_string());
    }

    /// Every statement executed, committed or not.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    /// Committed table by name.
    pub fn table(&self, name: &str) -> Option<MockTable> {
        self.state.lock().unwrap().committed.tables.get(name).cloned()
    }

    /// Committed bookkeeping ids, ascending.
    pub fn recorded_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().committed.rows.keys().cloned().collect()
    }

    pub fn recorded_data(&self, id: &str) -> Option<String> {
        self.state.lock().unwrap().committed.rows.get(id).cloned()
    }

    pub fn transactions(&self) -> usize {
        self.state.lock().unwrap().transactions
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }
}

impl SyncTarget for MockTarget {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn SyncTransaction>>> {
        Box::pin(async move {
            let working = {
                let mut state = self.state.lock().unwrap();
                state.transactions += 1;
                state.committed.clone()
            };
            let tx: Box<dyn SyncTransaction> = Box::new(MockTransaction {
                state: self.state.clone(),
                working,
            });
            Ok(tx)
        })
    }
}

struct MockTransaction {
    state: Arc<Mutex<State>>,
    working: Catalog,
}

impl MockTransaction {
    fn run(&mut self, statement: &str) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.statements.push(statement.to_string());
            if let Some(fragment) = &state.fail_on {
                if statement.contains(fragment.as_str()) {
                    return Err(CubesError::Database(format!(
                        "statement failed: {}",
                        statement
                    )));
                }
            }
        }

        interpret(&mut self.working, statement)
            .map_err(|e| CubesError::Database(format!("{}: {}", e, statement)))
    }
}

impl SyncTransaction for MockTransaction {
    fn ensure_bookkeeping(&mut self) -> BoxFuture<'_, Result<()>> {
        self.working.bookkeeping = true;
        Box::pin(async { Ok(()) })
    }

    fn read_marker(&mut self) -> BoxFuture<'_, Result<Option<MigrationId>>> {
        let marker = self.working.rows.keys().next_back().map(MigrationId::new);
        Box::pin(async move { Ok(marker) })
    }

    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.run(statement) })
    }

    fn record_migration<'a>(&'a mut self, migration: &'a Migration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.working.bookkeeping {
                return Err(CubesError::Database("bookkeeping table missing".into()));
            }
            let data = migration.to_compact_json()?;
            if self
                .working
                .rows
                .insert(migration.id.to_string(), data)
                .is_some()
            {
                return Err(CubesError::Database(format!(
                    "duplicate key value: {}",
                    migration.id
                )));
            }
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        let MockTransaction { state, working } = *self;
        Box::pin(async move {
            let mut state = state.lock().unwrap();
            state.committed = working;
            state.commits += 1;
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        let MockTransaction { state, .. } = *self;
        Box::pin(async move {
            state.lock().unwrap().rollbacks += 1;
            Ok(())
        })
    }
}

/// Apply one statement of the forms the DDL compiler produces.
fn interpret(catalog: &mut Catalog, statement: &str) -> std::result::Result<(), String> {
    let mut tokens = Tokens::new(statement);

    match tokens.word()?.as_str() {
        "CREATE" => {
            tokens.expect("TABLE")?;
            let name = tokens.ident()?;
            if catalog.tables.contains_key(&name) {
                return Err(format!("relation \"{}\" already exists", name));
            }
            catalog.tables.insert(
                name.clone(),
                MockTable {
                    name,
                    ..Default::default()
                },
            );
            Ok(())
        }
        "DROP" => {
            tokens.expect("TABLE")?;
            let name = tokens.ident()?;
            catalog
                .tables
                .remove(&name)
                .map(|_| ())
                .ok_or_else(|| format!("table \"{}\" does not exist", name))
        }
        "ALTER" => {
            tokens.expect("TABLE")?;
            let name = tokens.ident()?;
            let table = catalog
                .tables
                .get_mut(&name)
                .ok_or_else(|| format!("relation \"{}\" does not exist", name))?;
            alter(table, &mut tokens)
        }
        other => Err(format!("unsupported statement {}", other)),
    }
}

fn alter(table: &mut MockTable, tokens: &mut Tokens<'_>) -> std::result::Result<(), String> {
    match (tokens.word()?.as_str(), tokens.word()?.as_str()) {
        ("ADD", "COLUMN") => {
            let name = tokens.ident()?;
            if table.column(&name).is_some() {
                return Err(format!("column \"{}\" already exists", name));
            }
            // Types may span several words, e.g. `timestamp with time zone`.
            let mut words = vec![tokens.word()?];
            while let Some(next) = tokens.peek_word() {
                if next == "NOT" || next == "DEFAULT" {
                    break;
                }
                words.push(tokens.word()?);
            }
            let sql_type = words.join(" ");
            let mut column = MockColumn {
                name,
                sql_type,
                nullable: true,
                default: None,
            };
            while !tokens.is_empty() {
                match tokens.word()?.as_str() {
                    "NOT" => {
                        tokens.expect("NULL")?;
                        column.nullable = false;
                    }
                    "DEFAULT" => column.default = Some(tokens.literal()?),
                    other => return Err(format!("unexpected {}", other)),
                }
            }
            table.columns.push(column);
            Ok(())
        }
        ("DROP", "COLUMN") => {
            let name = tokens.ident()?;
            let position = table
                .columns
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| format!("column \"{}\" does not exist", name))?;
            table.columns.remove(position);
            // PostgreSQL drops constraints that cover a dropped column.
            if table
                .constraint
                .as_ref()
                .is_some_and(|(_, keys)| keys.contains(&name))
            {
                table.constraint = None;
            }
            Ok(())
        }
        ("DROP", "CONSTRAINT") => {
            let name = tokens.ident()?;
            match &table.constraint {
                Some((existing, _)) if *existing == name => {
                    table.constraint = None;
                    Ok(())
                }
                _ => Err(format!("constraint \"{}\" does not exist", name)),
            }
        }
        ("ADD", "CONSTRAINT") => {
            let name = tokens.ident()?;
            tokens.expect("PRIMARY")?;
            tokens.expect("KEY")?;
            if table.constraint.is_some() {
                return Err(format!("multiple primary keys for table \"{}\"", table.name));
            }
            let keys = tokens.ident_list()?;
            for key in &keys {
                if table.column(key).is_none() {
                    return Err(format!("column \"{}\" does not exist", key));
                }
            }
            table.constraint = Some((name, keys));
            Ok(())
        }
        (a, b) => Err(format!("unsupported ALTER TABLE {} {}", a, b)),
    }
}

/// Just enough of a tokenizer for quoted identifiers and literals.
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(statement: &'a str) -> Self {
        Self { rest: statement }
    }

    fn is_empty(&mut self) -> bool {
        self.rest = self.rest.trim_start();
        self.rest.is_empty()
    }

    fn word(&mut self) -> std::result::Result<String, String> {
        self.rest = self.rest.trim_start();
        let end = self
            .rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err("unexpected end of statement".into());
        }
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(word.to_string())
    }

    fn peek_word(&self) -> Option<&'a str> {
        let rest = self.rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    }

    fn expect(&mut self, keyword: &str) -> std::result::Result<(), String> {
        let word = self.word()?;
        if word != keyword {
            return Err(format!("expected {}, got {}", keyword, word));
        }
        Ok(())
    }

    fn quoted(&mut self, quote: char) -> std::result::Result<String, String> {
        let text = self.rest.trim_start();
        let mut chars = text.char_indices();
        if chars.next().map(|(_, c)| c) != Some(quote) {
            return Err(format!("expected {} at: {}", quote, text));
        }

        let mut value = String::new();
        let mut pending_quote = false;
        for (i, c) in chars {
            if pending_quote {
                if c == quote {
                    value.push(quote);
                    pending_quote = false;
                    continue;
                }
                self.rest = &text[i..];
                return Ok(value);
            }
            if c == quote {
                pending_quote = true;
            } else {
                value.push(c);
            }
        }

        if pending_quote {
            self.rest = "";
            return Ok(value);
        }
        Err("unterminated quoted value".into())
    }

    fn ident(&mut self) -> std::result::Result<String, String> {
        self.quoted('"')
    }

    fn literal(&mut self) -> std::result::Result<String, String> {
        self.quoted('\'')
    }

    /// `("a", "b")`
    fn ident_list(&mut self) -> std::result::Result<Vec<String>, String> {
        self.rest = self.rest.trim_start();
        self.rest = self
            .rest
            .strip_prefix('(')
            .ok_or_else(|| "expected (".to_string())?;

        let mut idents = Vec::new();
        loop {
            idents.push(self.ident()?);
            self.rest = self.rest.trim_start();
            if let Some(rest) = self.rest.strip_prefix(',') {
                self.rest = rest;
            } else if let Some(rest) = self.rest.strip_prefix(')') {
                self.rest = rest;
                return Ok(idents);
            } else {
                return Err("expected , or )".into());
            }
        }
    }
}
