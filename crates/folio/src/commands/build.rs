//! `folio build` command implementation.
//!
//! Runs one forced build of a documentation's project through the same
//! scheduler and builder the server uses, then exits.

use clap::Args;
use folio_build::BuildOutcome;
use folio_config::CliSettings;
use folio_server::{Services, server_config_from_folio_config};
use folio_tree::{BuildTrigger, DocumentationId};

use super::CommonArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    #[command(flatten)]
    pub(crate) common: CommonArgs,

    /// Documentation to build. Versions build their whole project.
    documentation_id: DocumentationId,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if the documentation does not exist or the build
    /// fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.common.load(CliSettings::default())?;
        let services = Services::start(&server_config_from_folio_config(&config)).await?;

        let project = services.store.build_key(self.documentation_id).await?;

        output.building(project);
        services.scheduler.trigger(&BuildTrigger::forced(project));
        let status = services.scheduler.wait_idle(project).await;

        match status.last_outcome {
            Some(BuildOutcome::Succeeded) => {
                output.published(project, &services.layout.site_dir(project));
                Ok(())
            }
            _ => Err(CliError::Build(
                status
                    .last_error
                    .unwrap_or_else(|| "no build result".to_owned()),
            )),
        }
    }
}
