use anyhow::Result;
use clap::Args;

use super::Context;

/// Print the schema derived from the action log as JSON.
#[derive(Args)]
pub struct SchemaCommand {
    /// Show the schema as it was just before an action of this migration.
    #[arg(long, requires = "index")]
    pub migration: Option<String>,

    /// Action index within `--migration`.
    #[arg(long, requires = "migration")]
    pub index: Option<usize>,
}

impl SchemaCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let snapshot = match (self.migration, self.index) {
            (Some(id), Some(index)) => ctx.store.snapshot_as_of(&id, index)?,
            _ => ctx.store.current_snapshot()?,
        };

        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }
}
