//! Stop managing an item.

use super::common::{CliContext, find};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Item name
    name: String,

    /// Leave the installed files on disk
    #[arg(long)]
    keep_files: bool,
}

impl RemoveCommand {
    pub async fn execute(self, ctx: CliContext) -> Result<()> {
        let mut registry = ctx.registry().await?;
        let record = find(&registry, &self.name)?;

        ctx.manager()?.remove(&record, self.keep_files).await?;
        registry.remove(&record.name)?;
        ctx.save_registry(&registry).await?;

        if self.keep_files {
            println!("{} Stopped managing {} (files kept)", "✓".green(), record.name.bold());
        } else {
            println!(
                "{} Removed {} and deleted {}",
                "✓".green(),
                record.name.bold(),
                record.local_path.display()
            );
        }
        Ok(())
    }
}
