use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use super::Context;

/// Create and inspect migrations.
#[derive(Subcommand)]
pub enum MigrationCommand {
    /// Start a new migration; later actions are appended to it.
    New(NewMigration),

    /// List migrations in order.
    List,

    /// Print a migration record.
    Show {
        /// Migration id.
        id: String,
    },
}

#[derive(Args)]
pub struct NewMigration {
    /// What the migration is for.
    #[arg(required = true, num_args = 1..)]
    pub description: Vec<String>,
}

impl MigrationCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            MigrationCommand::New(cmd) => {
                let description = cmd.description.join(" ");
                let id = ctx.store.create_migration(&description)?;
                println!(
                    "  {} Created migration {} {}",
                    style("✓").green(),
                    style(&id).cyan(),
                    style(format!("({})", description)).dim()
                );
            }

            MigrationCommand::List => {
                let migrations = ctx.store.list_migrations()?;
                if migrations.is_empty() {
                    println!(
                        "  {} No migrations found in {}",
                        style("ℹ").blue(),
                        ctx.store.directory().display()
                    );
                    return Ok(());
                }

                for m in &migrations {
                    println!(
                        "  {} {} {} {}",
                        style("→").dim(),
                        style(&m.id).cyan(),
                        m.description,
                        style(format!("[{} action(s)]", m.actions.len())).dim()
                    );
                }
            }

            MigrationCommand::Show { id } => {
                println!("{}", ctx.store.migration_text(&id)?);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::context;
    use tempfile::TempDir;

    #[test]
    fn test_new_joins_description() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        MigrationCommand::New(NewMigration {
            description: vec!["create".into(), "users".into()],
        })
        .execute(&ctx)
        .unwrap();

        let migrations = ctx.store.list_migrations().unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].description, "create users");
    }

    #[test]
    fn test_show_unknown_migration() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        let result = MigrationCommand::Show {
            id: "20240101000000".into(),
        }
        .execute(&ctx);
        assert!(result.is_err());
    }
}
