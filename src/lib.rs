//! Bentobox Library
//!
//! Core of the idempotent desktop bundle installer: unit discovery, preflight
//! probing, selection, queueing, execution with crash-safe state, and the
//! post-run desktop hook.

pub mod action;
pub mod cli;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod paths;
pub mod post_run;
pub mod preflight;
pub mod process_guard;
pub mod queue;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod state;
pub mod types;
pub mod unit;

// Re-export main types for convenience
pub use action::{ActionOutcome, ActionRequest, ActionRunner, SystemRunner};
pub use config_file::{ConfigSource, DesktopConfig, InstallConfig};
pub use engine::{Engine, ExecutionSummary};
pub use error::{BentoError, Result};
pub use manifest::{ManifestError, PostRunStep, SourceSpec, UnitManifest};
pub use orchestrator::{Orchestrator, Plan, RunOutcome};
pub use paths::InstallPaths;
pub use post_run::{PostRunHook, PostRunResult, SessionSignal, StepOutcome, StepResult};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use queue::{build_queue, Queue};
pub use registry::{discover, Registry};
pub use report::RunReport;
pub use resolver::apply_preferences;
pub use state::{RunState, Snapshot, StateStore, UnitRecord};
pub use types::{Category, ConfigMode, QueueOrder, UnitStatus};
pub use unit::{Unit, UnitTransitionError};
