//! Read and change settings in `config.toml`.
//!
//! ```bash
//! scriptkeeper config show
//! scriptkeeper config get update-method
//! scriptkeeper config set update-method differential
//! scriptkeeper config path
//! ```

use super::common::CliContext;
use crate::config::SETTING_KEYS;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand, Debug)]
enum ConfigSubcommands {
    /// Show every setting
    Show,

    /// Print one setting
    Get {
        /// Setting name
        key: String,
    },

    /// Change one setting
    Set {
        /// Setting name
        key: String,

        /// New value; an empty string clears optional settings
        value: String,
    },

    /// Print the configuration directory
    Path,
}

impl ConfigCommand {
    pub async fn execute(self, mut ctx: CliContext) -> Result<()> {
        match self.command {
            Some(ConfigSubcommands::Show) | None => {
                println!("{}", "Settings".bold());
                println!("Location: {}\n", ctx.paths.settings().display());
                for key in SETTING_KEYS {
                    println!("{:<22} {}", key, ctx.settings.get(key)?);
                }
            }
            Some(ConfigSubcommands::Get {
                key,
            }) => println!("{}", ctx.settings.get(&key)?),
            Some(ConfigSubcommands::Set {
                key,
                value,
            }) => {
                ctx.settings.set(&key, &value)?;
                ctx.save_settings().await?;
                println!("{} {key} = {}", "✓".green(), ctx.settings.get(&key)?);
            }
            Some(ConfigSubcommands::Path) => println!("{}", ctx.paths.dir().display()),
        }
        Ok(())
    }
}
