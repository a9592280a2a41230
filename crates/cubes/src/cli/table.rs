use anyhow::Result;
use clap::{Args, Subcommand};

use cubes_core::schema::Action;

use super::Context;

/// Table actions.
#[derive(Subcommand)]
pub enum TableCommand {
    /// Append an addTable action.
    Add { name: String },

    /// Append a deleteTable action.
    Delete { name: String },
}

/// Column actions.
#[derive(Subcommand)]
pub enum ColumnCommand {
    /// Append an addColumn action.
    Add(AddColumn),

    /// Append a deleteColumn action.
    Delete(ColumnRef),
}

/// Primary key actions.
#[derive(Subcommand)]
pub enum PrimaryKeyCommand {
    /// Append an addPrimaryKey action.
    Add(ColumnRef),

    /// Append a deletePrimaryKey action.
    Delete(ColumnRef),
}

#[derive(Args)]
pub struct AddColumn {
    pub table: String,
    pub column: String,

    /// SQL type, passed through verbatim.
    #[arg(value_name = "TYPE")]
    pub column_type: String,

    /// Allow NULL values.
    #[arg(long)]
    pub nullable: bool,

    /// Default value, stored as a string literal.
    #[arg(long)]
    pub default: Option<String>,
}

#[derive(Args)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl TableCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        ctx.append(match self {
            TableCommand::Add { name } => Action::add_table(name),
            TableCommand::Delete { name } => Action::delete_table(name),
        })
    }
}

impl ColumnCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        ctx.append(match self {
            ColumnCommand::Add(c) => Action::add_column(
                c.table,
                c.column,
                c.column_type,
                c.nullable,
                c.default.unwrap_or_default(),
            ),
            ColumnCommand::Delete(c) => Action::delete_column(c.table, c.column),
        })
    }
}

impl PrimaryKeyCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        ctx.append(match self {
            PrimaryKeyCommand::Add(c) => Action::add_primary_key(c.table, c.column),
            PrimaryKeyCommand::Delete(c) => Action::delete_primary_key(c.table, c.column),
        })
    }
}
