//! Build triggers emitted by tree mutations.
//!
//! The tree never builds anything itself. After a mutation commits it hands a
//! [`BuildTrigger`] to a [`TriggerSink`]; the build scheduler is the
//! production sink.

use chrono::{DateTime, Utc};

use crate::model::DocumentationId;

/// Request to regenerate the site of a documentation project.
///
/// `documentation_id` names the documentation whose content changed and
/// `project_id` the project that owns it. Builds are scheduled per project,
/// so a trigger for a version rebuilds its root together with all versions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildTrigger {
    /// Documentation the trigger is for.
    pub documentation_id: DocumentationId,
    /// Scheduling key: the root documentation of `documentation_id`.
    pub project_id: DocumentationId,
    /// When the trigger was created.
    pub requested_at: DateTime<Utc>,
    /// Skip the debounce window and rebuild even if nothing changed.
    pub force: bool,
}

impl BuildTrigger {
    /// Create a debounced trigger for a root documentation.
    #[must_use]
    pub fn debounced(documentation_id: DocumentationId) -> Self {
        Self {
            documentation_id,
            project_id: documentation_id,
            requested_at: Utc::now(),
            force: false,
        }
    }

    /// Create a forced trigger for a root documentation.
    #[must_use]
    pub fn forced(documentation_id: DocumentationId) -> Self {
        Self {
            documentation_id,
            project_id: documentation_id,
            requested_at: Utc::now(),
            force: true,
        }
    }

    /// Schedule the trigger under `project_id` instead of its own id.
    #[must_use]
    pub fn in_project(mut self, project_id: DocumentationId) -> Self {
        self.project_id = project_id;
        self
    }
}

/// Receiver of build triggers.
///
/// `enqueue` is fire-and-forget: it must not block on the build and has no
/// way to report failure back to the mutation that emitted the trigger.
pub trait TriggerSink: Send + Sync {
    /// Hand a trigger to the sink.
    fn enqueue(&self, trigger: BuildTrigger);
}

/// Sink that drops every trigger.
pub struct NullSink;

impl TriggerSink for NullSink {
    fn enqueue(&self, trigger: BuildTrigger) {
        tracing::debug!(
            documentation_id = trigger.documentation_id,
            project_id = trigger.project_id,
            "Build trigger dropped (no scheduler)"
        );
    }
}

/// Sink that records triggers for assertions in tests.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    triggers: std::sync::Mutex<Vec<BuildTrigger>>,
}

#[cfg(any(test, feature = "mock"))]
impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return all recorded triggers.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn take(&self) -> Vec<BuildTrigger> {
        std::mem::take(&mut *self.triggers.lock().unwrap())
    }

    /// Recorded `(project_id, force)` pairs, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn keys(&self) -> Vec<(DocumentationId, bool)> {
        self.triggers
            .lock()
            .unwrap()
            .iter()
            .map(|t| (t.project_id, t.force))
            .collect()
    }
}

#[cfg(any(test, feature = "mock"))]
impl TriggerSink for RecordingSink {
    fn enqueue(&self, trigger: BuildTrigger) {
        self.triggers.lock().unwrap().push(trigger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_force_flag() {
        assert!(!BuildTrigger::debounced(3).force);
        assert!(BuildTrigger::forced(3).force);
    }

    #[test]
    fn test_in_project_keeps_documentation() {
        let trigger = BuildTrigger::forced(8).in_project(3);

        assert_eq!(trigger.documentation_id, 8);
        assert_eq!(trigger.project_id, 3);
        assert!(trigger.force);
    }

    #[test]
    fn test_recording_sink_take_drains() {
        let sink = RecordingSink::new();
        sink.enqueue(BuildTrigger::debounced(1));
        sink.enqueue(BuildTrigger::forced(2));

        assert_eq!(sink.keys(), vec![(1, false), (2, true)]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.keys().is_empty());
    }
}
