//! Put an archived version back in place.
//!
//! The current contents are archived as `before-restore` first, so a restore
//! can itself be undone.

use super::common::{CliContext, find};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct RestoreCommand {
    /// Item name
    name: String,

    /// Slot name as shown by `scriptkeeper versions`
    slot: String,
}

impl RestoreCommand {
    pub async fn execute(self, ctx: CliContext) -> Result<()> {
        let mut registry = ctx.registry().await?;
        let mut record = find(&registry, &self.name)?;

        let result = ctx.manager()?.restore(&mut record, &self.slot).await;
        registry.upsert(record);
        ctx.save_registry(&registry).await?;
        let restored = result?;

        let commit = restored.commit.as_ref().map_or("unknown commit", |c| c.short());
        println!("{} Restored {} from {} ({commit})", "✓".green(), self.name.bold(), restored.name);
        Ok(())
    }
}
