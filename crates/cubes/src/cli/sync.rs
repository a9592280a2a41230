use anyhow::{Context as _, Result};
use clap::Args;
use console::style;

use cubes_runtime::migrations::{PgTarget, SyncEngine};
use cubes_runtime::Database;

use super::Context;

/// Apply pending migrations to the database.
#[derive(Args)]
pub struct SyncCommand {}

/// Show applied and pending migrations.
#[derive(Args)]
pub struct StatusCommand {}

/// Pool settings come from `[database]`; the rest of the sync config from
/// `[migrations]`.
async fn connect(ctx: &Context) -> Result<(Database, SyncEngine<PgTarget>)> {
    let config = ctx.config.sync_config().with_context(|| {
        format!(
            "set database.url in {} or DATABASE_URL",
            ctx.config_path.display()
        )
    })?;

    let db = Database::from_config(&ctx.config.database).await?;
    db.health_check().await?;

    let target = PgTarget::new(db.pool().clone(), &config);
    Ok((db, SyncEngine::new(config, ctx.store.clone(), target)))
}

impl SyncCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        println!();
        println!("  {}  {} Sync", style("◆").bold(), style("cubes").bold().cyan());
        println!();

        let (db, engine) = connect(ctx).await?;
        let result = engine.sync().await;
        db.close().await;
        let report = result?;

        if report.is_noop() {
            println!("  {} Database is up to date", style("ℹ").blue());
        } else {
            for id in &report.applied {
                println!("  {} Applied: {}", style("✓").green(), style(id).cyan());
            }
            println!();
            println!(
                "  {} Applied {} migration(s), {} statement(s)",
                style("✓").green(),
                report.applied.len(),
                report.statements
            );
        }
        println!();

        Ok(())
    }
}

impl StatusCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        println!();
        println!(
            "  {}  {} Migration Status",
            style("◆").bold(),
            style("cubes").bold().cyan()
        );
        println!();

        let (db, engine) = connect(ctx).await?;
        let result = engine.status().await;
        db.close().await;
        let status = result?;

        if status.applied.is_empty() && status.pending.is_empty() {
            println!("  {} No migrations found", style("ℹ").blue());
            return Ok(());
        }

        if !status.applied.is_empty() {
            println!("  {} Applied:", style("✓").green());
            for id in &status.applied {
                println!("    {} {}", style("-").dim(), style(id).cyan());
            }
        }

        if !status.pending.is_empty() {
            if !status.applied.is_empty() {
                println!();
            }
            println!("  {} Pending:", style("○").yellow());
            for id in &status.pending {
                println!("    {} {}", style("→").dim(), style(id).yellow());
            }
        }

        println!();
        println!(
            "  {} {} applied, {} pending",
            style("ℹ").blue(),
            status.applied.len(),
            status.pending.len()
        );
        println!();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::context;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sync_requires_database_url() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        let err = SyncCommand {}.execute(&ctx).await.unwrap_err();
        assert!(format!("{:#}", err).contains("database.url"));
    }
}
