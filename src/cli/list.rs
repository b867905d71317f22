//! Show managed scripts.

use super::common::CliContext;
use crate::config::{ManagedScriptRecord, UpdateStatus};
use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

fn status_cell(status: UpdateStatus) -> String {
    let text = status.to_string();
    match status {
        UpdateStatus::UpToDate => text.green().to_string(),
        UpdateStatus::Available => text.yellow().to_string(),
        UpdateStatus::CheckFailed => text.red().to_string(),
        UpdateStatus::Unknown => text.dimmed().to_string(),
    }
}

fn row(record: &ManagedScriptRecord) -> String {
    let commit = record.current_version_sha.as_ref().map_or("-", |c| c.short());
    let checked = record
        .last_checked
        .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
    format!(
        "{:<28} {:<10} {:<18} {:<17} {}",
        record.name,
        commit,
        status_cell(record.update_status),
        checked,
        record.local_path.display()
    )
}

impl ListCommand {
    pub async fn execute(self, ctx: CliContext) -> Result<()> {
        let registry = ctx.registry().await?;

        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&registry)?);
            return Ok(());
        }

        if registry.is_empty() {
            println!("No managed scripts. Add one with 'scriptkeeper add <url>'.");
            return Ok(());
        }

        println!(
            "{}",
            format!(
                "{:<28} {:<10} {:<18} {:<17} {}",
                "NAME", "COMMIT", "STATUS", "LAST CHECKED", "PATH"
            )
            .bold()
        );
        for record in registry.iter() {
            println!("{}", row(record));
        }
        Ok(())
    }
}
