//! `folio serve` command implementation.

use clap::Args;
use folio_config::CliSettings;
use folio_server::{run_server, server_config_from_folio_config};

use super::CommonArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    #[command(flatten)]
    pub(crate) common: CommonArgs,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Quiet period before a build starts, in milliseconds (overrides config).
    #[arg(long)]
    debounce_ms: Option<u64>,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.common.load(CliSettings {
            host: self.host,
            port: self.port,
            debounce_ms: self.debounce_ms,
            ..CliSettings::default()
        })?;

        output.field(
            "listen",
            format_args!("{}:{}", config.server.host, config.server.port),
        );
        output.field("data", config.storage_resolved.data_dir.display());
        output.field(
            "generator",
            format_args!("{} {}", config.build.command, config.build.args.join(" ")),
        );
        if config.auth.editors.is_empty() {
            output.warning("No [[auth.editors]] configured: editing is disabled");
        }

        run_server(server_config_from_folio_config(&config))
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }
}
