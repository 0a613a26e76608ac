//! Shared test support for engine, freeze and command-line tests.

mod doubles;
mod reporter;
mod workspace;

pub use doubles::{CorruptingStage, FailingStage, FixedResources, MockService, ScriptedService};
pub use reporter::{RecordingReporter, ReportedEvent};
pub use workspace::{SERVER_CONFIG, SERVER_CONFIG_BOUNDARY, Workspace};
