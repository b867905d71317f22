//! Start managing a repository subfolder.
//!
//! ```bash
//! scriptkeeper add https://github.com/acme/tools --folder scripts/utils --dest ~/games/scripts
//! scriptkeeper add https://github.com/acme/tools/tree/v2/scripts --name tools
//! scriptkeeper add https://github.com/acme/launcher --category executable
//! ```

use super::common::{CliContext, expand_path};
use crate::fetcher::Category;
use crate::manager::AddRequest;
use crate::source::RemoteRef;
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct AddCommand {
    /// Repository URL, optionally with `/tree/<ref>/<path>`
    url: String,

    /// Subfolder inside the repository
    #[arg(short, long, default_value = "")]
    folder: String,

    /// Branch or tag to follow instead of the default branch
    #[arg(short, long = "ref")]
    reference: Option<String>,

    /// Directory the installation folder is created in
    ///
    /// Defaults to the last destination used, then the current directory.
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Name for the item; derived from the repository and folder by default
    #[arg(short, long)]
    name: Option<String>,

    /// Kind of content
    #[arg(long, default_value_t = Category::Script)]
    category: Category,
}

impl AddCommand {
    pub async fn execute(self, mut ctx: CliContext) -> Result<()> {
        let remote = RemoteRef::parse(&self.url, &self.folder, self.reference.clone())?;
        let name = self.name.clone().unwrap_or_else(|| remote.default_name());

        let mut registry = ctx.registry().await?;
        if registry.get(&name).is_some() {
            bail!(crate::core::KeeperError::ScriptAlreadyManaged {
                name,
            });
        }

        let destination = match self.dest.or_else(|| ctx.settings.last_destination.clone()) {
            Some(dest) => expand_path(&dest),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };

        let manager = ctx.manager()?;
        let spinner = ctx.spinner(format!("Fetching {remote}"));
        let result = manager
            .add(AddRequest {
                repo_url: self.url,
                folder: self.folder,
                ref_name: self.reference,
                destination: destination.clone(),
                name: Some(name),
                category: self.category,
            })
            .await;
        spinner.finish_and_clear();
        let (record, outcome) = result?;

        for warning in &outcome.warnings {
            eprintln!("{} {warning}", "⚠".yellow());
        }
        println!(
            "{} Added {} at {} ({} files, commit {})",
            "✓".green(),
            record.name.bold(),
            record.local_path.display(),
            outcome.files,
            outcome.commit.short().cyan()
        );

        registry.add(record)?;
        ctx.save_registry(&registry).await?;

        ctx.settings.last_destination = Some(destination);
        ctx.save_settings().await?;
        Ok(())
    }
}
