//! Site builds for Folio.
//!
//! Tree mutations emit [`folio_tree::BuildTrigger`]s. The [`BuildScheduler`]
//! debounces them per project and runs at most one build per project at a
//! time on a bounded worker pool. The [`ProjectBuilder`] executes a build:
//! it writes the project's tree as Markdown, runs the external generator
//! into a staging directory and swaps the result in as the published site.

mod error;
mod generator;
mod materialize;
mod project;
mod scheduler;
mod status;

pub use error::BuildError;
pub use generator::GeneratorCommand;
pub use materialize::{MANIFEST_FILE, ProjectSnapshot, materialize};
pub use project::ProjectBuilder;
pub use scheduler::{BuildExecutor, BuildScheduler, SchedulerConfig};
pub use status::{BuildOutcome, BuildPhase, BuildStatus, Built};
