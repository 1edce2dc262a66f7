//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod serve;

use std::path::PathBuf;

use clap::Args;
use folio_config::{CliSettings, Config};

use crate::error::CliError;

pub(crate) use build::BuildArgs;
pub(crate) use serve::ServeArgs;

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct CommonArgs {
    /// Path to configuration file (default: auto-discover folio.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory holding the database, sources and sites (overrides config).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl CommonArgs {
    /// Load configuration with `settings` applied on top.
    fn load(&self, mut settings: CliSettings) -> Result<Config, CliError> {
        settings.data_dir.clone_from(&self.data_dir);
        Ok(Config::load(self.config.as_deref(), Some(&settings))?)
    }
}
