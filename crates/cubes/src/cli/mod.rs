mod migration;
mod schema;
mod sync;
mod table;

pub use migration::MigrationCommand;
pub use schema::SchemaCommand;
pub use sync::{StatusCommand, SyncCommand};
pub use table::{ColumnCommand, PrimaryKeyCommand, TableCommand};

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cubes_core::config::{CubesConfig, LoggingConfig};
use cubes_core::schema::Action;
use cubes_runtime::migrations::ActionLogStore;

/// cubes - action-log schema migrations for PostgreSQL
#[derive(Parser)]
#[command(name = "cubes")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path.
    #[arg(short, long, default_value = "cubes.toml", global = true)]
    pub config: String,

    /// Migrations directory (overrides config).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<String>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create and inspect migrations.
    #[command(subcommand)]
    Migration(MigrationCommand),

    /// Add or delete tables.
    #[command(subcommand)]
    Table(TableCommand),

    /// Add or delete columns.
    #[command(subcommand)]
    Column(ColumnCommand),

    /// Add or delete primary key columns.
    #[command(subcommand)]
    PrimaryKey(PrimaryKeyCommand),

    /// Print the schema derived from the action log.
    Schema(SchemaCommand),

    /// Apply pending migrations to the database.
    Sync(SyncCommand),

    /// Show applied and pending migrations.
    Status(StatusCommand),
}

/// Everything a command needs, resolved once from flags and config.
pub struct Context {
    pub config: CubesConfig,
    pub config_path: PathBuf,
    pub store: ActionLogStore,
}

impl Context {
    pub fn new(
        config: CubesConfig,
        config_path: impl Into<PathBuf>,
        migrations_dir: Option<&str>,
    ) -> Self {
        let dir = migrations_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&config.migrations.directory));

        Self {
            store: ActionLogStore::new(dir),
            config_path: config_path.into(),
            config,
        }
    }

    /// Append to the latest migration and report where it went.
    pub fn append(&self, action: Action) -> Result<()> {
        let id = self.store.append_action(action.clone())?;
        println!(
            "  {} {} {} {}",
            style("✓").green(),
            style(action).cyan(),
            style("→").dim(),
            id
        );
        Ok(())
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let config = load_config(Path::new(&self.config))?;
        init_logging(&config.logging);

        let ctx = Context::new(config, &self.config, self.migrations_dir.as_deref());
        debug!("Using action log at {}", ctx.store.directory().display());
        self.command.execute(&ctx).await
    }
}

impl Commands {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Commands::Migration(cmd) => cmd.execute(ctx),
            Commands::Table(cmd) => cmd.execute(ctx),
            Commands::Column(cmd) => cmd.execute(ctx),
            Commands::PrimaryKey(cmd) => cmd.execute(ctx),
            Commands::Schema(cmd) => cmd.execute(ctx),
            Commands::Sync(cmd) => cmd.execute(ctx).await,
            Commands::Status(cmd) => cmd.execute(ctx).await,
        }
    }
}

/// A missing config file means defaults; commands that need a database say so.
fn load_config(path: &Path) -> Result<CubesConfig> {
    if !path.exists() {
        return Ok(CubesConfig::default());
    }

    CubesConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}
