//! Per-project build status as reported by the scheduler.

use chrono::{DateTime, Utc};
use folio_tree::DocumentationId;
use serde::Serialize;

/// Scheduler phase of a project.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    /// No build queued or running.
    #[default]
    Idle,
    /// Waiting for the debounce window to pass.
    Pending,
    /// Build queued for a worker or running.
    Building,
}

/// Result of the most recent finished build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
    Succeeded,
    Failed,
}

/// What a successful build did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Built {
    /// A new site was generated and published.
    Published,
    /// Nothing changed since the published site.
    Unchanged,
    /// The project no longer exists and its artifacts were removed.
    Removed,
}

/// Snapshot of a project's build state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    pub documentation_id: DocumentationId,
    pub phase: BuildPhase,
    /// `None` until the first build finishes.
    pub last_outcome: Option<BuildOutcome>,
    /// Error of the last build, cleared by the next success.
    pub last_error: Option<String>,
    pub last_trigger_at: Option<DateTime<Utc>>,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    /// Finished builds since the scheduler started.
    pub builds: u64,
}

impl BuildStatus {
    /// Status of a project the scheduler has never seen.
    #[must_use]
    pub fn unknown(documentation_id: DocumentationId) -> Self {
        Self {
            documentation_id,
            phase: BuildPhase::Idle,
            last_outcome: None,
            last_error: None,
            last_trigger_at: None,
            last_started_at: None,
            last_finished_at: None,
            builds: 0,
        }
    }
}
