//! Debounced, single-flight build scheduler.
//!
//! # State machine
//!
//! Each project key moves through `Idle -> Pending -> Building -> Idle`:
//!
//! - A debounced trigger in `Idle` or `Pending` (re)starts the debounce timer.
//!   Only the timer of the newest generation may start a build.
//! - A forced trigger in `Idle` or `Pending` cancels the timer and starts the
//!   build immediately.
//! - Any trigger in `Building` marks a rerun. When the build finishes, a
//!   forced rerun starts right away; a plain rerun goes back to `Pending`
//!   with a fresh timer. Either way exactly one more build runs.
//!
//! A key is only ever driven by one task at a time, which makes builds for
//! the same key strictly sequential. Builds of different keys share a
//! bounded worker pool. A build that panics counts as failed and frees its
//! key. The time limit of a build belongs to the executor.
//!
//! Keys exist only for projects that were triggered. A key is dropped once
//! the executor reports its project removed and no rerun is queued.
//!
//! # Locking
//!
//! The key map sits behind a coarse lock that is held only to look up,
//! insert or remove an entry. Each entry has its own lock for its state.
//! When both are needed the map lock is taken first. Neither lock is held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use folio_tree::{BuildTrigger, DocumentationId, TriggerSink};
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;

use crate::error::BuildError;
use crate::status::{BuildOutcome, BuildPhase, BuildStatus, Built};

/// Runs one build of a project.
#[async_trait]
pub trait BuildExecutor: Send + Sync + 'static {
    /// Build `project`. `force` asks for a full rebuild even if nothing
    /// changed.
    async fn build(&self, project: DocumentationId, force: bool) -> Result<Built, BuildError>;
}

/// Scheduler tuning.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Quiet period after the last debounced trigger.
    pub debounce: Duration,
    /// Maximum number of builds running at once across all keys.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            workers: 2,
        }
    }
}

/// Build scheduler. Cheap to clone.
#[derive(Clone)]
pub struct BuildScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: SchedulerConfig,
    executor: Arc<dyn BuildExecutor>,
    entries: Mutex<HashMap<DocumentationId, Arc<Entry>>>,
    workers: Arc<Semaphore>,
    runtime: Handle,
}

#[derive(Default)]
struct Entry {
    state: Mutex<EntryState>,
    idle: Notify,
}

#[derive(Default)]
struct EntryState {
    phase: BuildPhase,
    /// Bumped by every debounced trigger; stale timers compare against it.
    generation: u64,
    rerun: bool,
    rerun_force: bool,
    timer: Option<JoinHandle<()>>,
    status: Option<BuildStatus>,
}

impl EntryState {
    fn status_mut(&mut self, id: DocumentationId) -> &mut BuildStatus {
        self.status.get_or_insert_with(|| BuildStatus::unknown(id))
    }
}

impl BuildScheduler {
    /// Create a scheduler that spawns its tasks on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(executor: Arc<dyn BuildExecutor>, config: SchedulerConfig) -> Self {
        let workers = Arc::new(Semaphore::new(config.workers.max(1)));
        Self {
            inner: Arc::new(Inner {
                config,
                executor,
                entries: Mutex::new(HashMap::new()),
                workers,
                runtime: Handle::current(),
            }),
        }
    }

    /// Accept a trigger. Never blocks on a build.
    pub fn trigger(&self, trigger: &BuildTrigger) {
        let id = trigger.project_id;
        let mut entries = self.inner.entries.lock().unwrap();
        let entry = Arc::clone(entries.entry(id).or_default());
        let mut state = entry.state.lock().unwrap();
        drop(entries);
        state.status_mut(id).last_trigger_at = Some(trigger.requested_at);

        let phase = state.phase;
        match phase {
            BuildPhase::Building => {
                state.rerun = true;
                state.rerun_force |= trigger.force;
                tracing::debug!(
                    documentation_id = id,
                    requested_for = trigger.documentation_id,
                    force = trigger.force,
                    "Build running, rerun queued"
                );
            }
            BuildPhase::Idle | BuildPhase::Pending if trigger.force => {
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                state.generation += 1;
                state.phase = BuildPhase::Building;
                state.status_mut(id).phase = BuildPhase::Building;
                drop(state);

                tracing::debug!(documentation_id = id, "Forced build, skipping debounce");
                let inner = Arc::clone(&self.inner);
                self.inner
                    .runtime
                    .spawn(async move { inner.drive(id, entry, true).await });
            }
            BuildPhase::Idle | BuildPhase::Pending => {
                self.inner.schedule(id, &entry, &mut state);
                tracing::debug!(documentation_id = id, "Build pending");
            }
        }
    }

    /// Current status of a project, `None` if it has no key.
    #[must_use]
    pub fn status(&self, id: DocumentationId) -> Option<BuildStatus> {
        let entry = self.inner.lookup(id)?;
        let state = entry.state.lock().unwrap();
        state.status.clone()
    }

    /// Status of every project with a key, ordered by id.
    #[must_use]
    pub fn statuses(&self) -> Vec<BuildStatus> {
        let entries: Vec<Arc<Entry>> = self.inner.entries.lock().unwrap().values().cloned().collect();
        let mut statuses: Vec<BuildStatus> = entries
            .iter()
            .filter_map(|entry| entry.state.lock().unwrap().status.clone())
            .collect();
        statuses.sort_by_key(|s| s.documentation_id);
        statuses
    }

    /// Wait until a project has no pending or running build.
    pub async fn wait_idle(&self, id: DocumentationId) -> BuildStatus {
        let Some(entry) = self.inner.lookup(id) else {
            return BuildStatus::unknown(id);
        };
        loop {
            let notified = entry.idle.notified();
            {
                let state = entry.state.lock().unwrap();
                if state.phase == BuildPhase::Idle {
                    return state
                        .status
                        .clone()
                        .unwrap_or_else(|| BuildStatus::unknown(id));
                }
            }
            notified.await;
        }
    }
}

impl TriggerSink for BuildScheduler {
    fn enqueue(&self, trigger: BuildTrigger) {
        self.trigger(&trigger);
    }
}

impl Inner {
    fn lookup(&self, id: DocumentationId) -> Option<Arc<Entry>> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    /// Move to `Pending` and (re)start the debounce timer.
    fn schedule(self: &Arc<Self>, id: DocumentationId, entry: &Arc<Entry>, state: &mut EntryState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.phase = BuildPhase::Pending;
        state.status_mut(id).phase = BuildPhase::Pending;

        let generation = state.generation;
        let inner = Arc::clone(self);
        let entry = Arc::clone(entry);
        state.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            {
                let mut state = entry.state.lock().unwrap();
                if state.phase != BuildPhase::Pending || state.generation != generation {
                    return;
                }
                state.phase = BuildPhase::Building;
                state.status_mut(id).phase = BuildPhase::Building;
                state.timer = None;
            }
            inner.drive(id, entry, false).await;
        }));
    }

    /// Run builds for a key until no rerun is queued.
    ///
    /// Must only be entered after the caller moved the entry to `Building`.
    async fn drive(self: Arc<Self>, id: DocumentationId, entry: Arc<Entry>, mut force: bool) {
        loop {
            let result = self.run_one(id, &entry, force).await;
            let removed = matches!(result, Ok(Built::Removed));

            // Map before entry, so a concurrent trigger either lands before
            // the removal check or finds no key and starts a fresh one.
            let mut entries = self.entries.lock().unwrap();
            let mut state = entry.state.lock().unwrap();
            let status = state.status_mut(id);
            status.last_finished_at = Some(Utc::now());
            status.builds += 1;
            match result {
                Ok(_) => {
                    status.last_outcome = Some(BuildOutcome::Succeeded);
                    status.last_error = None;
                }
                Err(err) => {
                    status.last_outcome = Some(BuildOutcome::Failed);
                    status.last_error = Some(err.to_string());
                }
            }

            if !state.rerun {
                state.phase = BuildPhase::Idle;
                state.status_mut(id).phase = BuildPhase::Idle;
                drop(state);
                if removed {
                    entries.remove(&id);
                    tracing::debug!(documentation_id = id, "Project removed, key dropped");
                }
                drop(entries);
                entry.idle.notify_waiters();
                return;
            }
            drop(entries);

            state.rerun = false;
            if std::mem::take(&mut state.rerun_force) {
                tracing::debug!(documentation_id = id, "Running forced rerun");
                force = true;
                continue;
            }

            self.schedule(id, &entry, &mut state);
            tracing::debug!(documentation_id = id, "Rerun pending");
            return;
        }
    }

    async fn run_one(
        &self,
        id: DocumentationId,
        entry: &Entry,
        force: bool,
    ) -> Result<Built, BuildError> {
        let Ok(_permit) = Arc::clone(&self.workers).acquire_owned().await else {
            return Err(BuildError::Io(std::io::Error::other("worker pool closed")));
        };

        entry.state.lock().unwrap().status_mut(id).last_started_at = Some(Utc::now());
        tracing::info!(documentation_id = id, force, "Build started");
        let start = Instant::now();

        // Own task, so a panicking build surfaces as a join error instead of
        // unwinding through the driver and leaving the key in `Building`.
        let executor = Arc::clone(&self.executor);
        let result = match self.runtime.spawn(async move { executor.build(id, force).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(BuildError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(BuildError::Panicked(e.to_string())),
        };

        let elapsed_ms = start.elapsed().as_millis();
        match &result {
            Ok(built) => tracing::info!(documentation_id = id, elapsed_ms, ?built, "Build finished"),
            Err(err) => tracing::warn!(
                documentation_id = id,
                elapsed_ms,
                error = %err,
                "Build failed"
            ),
        }
        result
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_owned(), |s| (*s).to_owned()),
    }
}
