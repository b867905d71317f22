//! Bring managed scripts to the latest remote commit.
//!
//! Items whose installed commit already matches the remote are left alone.
//! Otherwise the current installation is archived under `Older Versions` and
//! the new snapshot is applied with the configured update method:
//!
//! - `overwrite` replaces the installation with the snapshot
//! - `differential` writes only new or changed files and keeps local extras
//!
//! ```bash
//! scriptkeeper update                       # everything
//! scriptkeeper update tools --method differential
//! ```

use super::common::{CliContext, batch_result, print_batch, select};
use crate::installer::UpdateStrategy;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Items to update; all when omitted
    names: Vec<String>,

    /// Update method; defaults to the `update_method` setting
    #[arg(short, long)]
    method: Option<UpdateStrategy>,
}

impl UpdateCommand {
    pub async fn execute(self, ctx: CliContext) -> Result<()> {
        let mut registry = ctx.registry().await?;
        let mut records = select(&registry, &self.names)?;
        if records.is_empty() {
            println!("Nothing to update.");
            return Ok(());
        }

        let strategy = self.method.unwrap_or(ctx.settings.update_method);
        let manager = ctx.manager()?;
        let spinner = ctx.spinner(format!("Updating {} item(s) ({strategy})", records.len()));
        let report = manager.update_all(&mut records, strategy).await;
        spinner.finish_and_clear();

        for record in records {
            registry.upsert(record);
        }
        ctx.save_registry(&registry).await?;

        for name in &report.succeeded {
            println!("✓ Updated {name}");
        }
        print_batch(&report);
        batch_result(&report)
    }
}
