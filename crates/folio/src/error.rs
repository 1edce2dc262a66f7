//! CLI error types.

use folio_config::ConfigError;
use folio_server::StartError;
use folio_tree::TreeError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Start(#[from] StartError),

    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("{0}")]
    Server(String),

    #[error("Build failed: {0}")]
    Build(String),
}
