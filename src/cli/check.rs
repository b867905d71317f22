//! Compare installed commits with the remotes without changing anything.

use super::common::{CliContext, batch_result, select};
use crate::config::UpdateStatus;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Items to check; all when omitted
    names: Vec<String>,
}

impl CheckCommand {
    pub async fn execute(self, ctx: CliContext) -> Result<()> {
        let mut registry = ctx.registry().await?;
        let mut records = select(&registry, &self.names)?;
        if records.is_empty() {
            println!("Nothing to check.");
            return Ok(());
        }

        let manager = ctx.manager()?;
        let spinner = ctx.spinner(format!("Checking {} item(s)", records.len()));
        let report = manager.check_all(&mut records).await;
        spinner.finish_and_clear();

        for record in &records {
            if record.update_status == UpdateStatus::Available {
                println!("{} {} has an update", "↑".yellow(), record.name.bold());
            }
        }
        for record in records {
            registry.upsert(record);
        }
        ctx.save_registry(&registry).await?;

        for failure in &report.failures {
            eprintln!("{} {failure}", "✗".red());
        }
        println!(
            "\n{}",
            format!(
                "Updates available: {}, Up-to-date: {}, Errors: {}",
                report.succeeded.len(),
                report.up_to_date.len(),
                report.failures.len()
            )
            .bold()
        );
        batch_result(&report)
    }
}
