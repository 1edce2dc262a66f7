//! Build error types.

use std::time::Duration;

use folio_tree::TreeError;

/// Error from a single build attempt.
///
/// Every variant is a failed build; the scheduler records its message as
/// the project's last error.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Generator exited unsuccessfully or produced no output.
    #[error("generator failed: {0}")]
    Generator(String),

    /// Generator ran longer than its time limit and was killed.
    #[error("build timed out after {0:?}")]
    Timeout(Duration),

    /// Filesystem error while preparing or publishing the build.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The build task panicked.
    #[error("build panicked: {0}")]
    Panicked(String),

    /// Reading the project from the tree failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
}
