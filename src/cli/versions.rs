//! Show the archived versions of one item.

use super::common::{CliContext, find};
use super::list::OutputFormat;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct VersionsCommand {
    /// Item name
    name: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl VersionsCommand {
    pub async fn execute(self, ctx: CliContext) -> Result<()> {
        let registry = ctx.registry().await?;
        let record = find(&registry, &self.name)?;
        let versions = ctx.manager()?.list_versions(&record).await?;

        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&versions)?);
            return Ok(());
        }

        if versions.is_empty() {
            println!("No archived versions of {}.", record.name.bold());
            return Ok(());
        }

        println!("{}", format!("{:<48} {:<10} {:<16} {}", "SLOT", "COMMIT", "CONTEXT", "CREATED").bold());
        for version in &versions {
            let created = version
                .created
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            println!(
                "{:<48} {:<10} {:<16} {}",
                version.name,
                version.short_commit.as_deref().unwrap_or("-"),
                version.context.as_deref().unwrap_or("-"),
                created
            );
        }
        Ok(())
    }
}
