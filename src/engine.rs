//! Execution Engine
//!
//! Runs the queued units strictly one at a time:
//!
//! ```text
//! NotInstalled → Installing → Installed
//!                          ↘ Failed
//! ```
//!
//! The state file is rewritten after every transition, so a crash leaves the
//! unit in flight visibly `installing`. A failing unit is recorded and the
//! loop moves on; only a failed state write stops the run.

use crate::action::{ActionOutcome, ActionRequest, ActionRunner};
use crate::error::{BentoError, Result};
use crate::queue::Queue;
use crate::registry::Registry;
use crate::state::StateStore;
use crate::types::UnitStatus;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Tally of one `execute` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub installed: usize,
    pub failed: usize,
}

pub struct Engine<'a, R: ActionRunner + ?Sized> {
    runner: &'a R,
    store: &'a StateStore,
    install_root: PathBuf,
    action_timeout: Duration,
}

impl<'a, R: ActionRunner + ?Sized> Engine<'a, R> {
    pub fn new(
        runner: &'a R,
        store: &'a StateStore,
        install_root: impl Into<PathBuf>,
        action_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            store,
            install_root: install_root.into(),
            action_timeout,
        }
    }

    /// Install every unit in `queue`, in order.
    ///
    /// Every queued unit ends `Installed` or `Failed`. Returns an error only
    /// when the state file cannot be written.
    pub fn execute(&self, registry: &mut Registry, queue: &Queue) -> Result<ExecutionSummary> {
        let mut summary = ExecutionSummary::default();

        for name in queue.iter() {
            let Some(unit) = registry.get_mut(name) else {
                warn!(unit = name, "Queued unit missing from registry, skipping");
                continue;
            };
            if unit.status() != UnitStatus::NotInstalled {
                warn!(unit = name, status = %unit.status(), "Queued unit is not pending, skipping");
                continue;
            }

            println!("\n📦 Installing {}...", name);
            unit.transition_to(UnitStatus::Installing)?;
            let request = ActionRequest::script(&unit.action, &self.install_root, self.action_timeout);
            self.persist(registry)?;

            let start = Instant::now();
            let outcome = self.runner.run(&request);
            let elapsed = start.elapsed();

            let unit = registry
                .get_mut(name)
                .ok_or_else(|| BentoError::general(format!("Unit {} vanished mid-run", name)))?;
            match &outcome {
                ActionOutcome::Success => {
                    unit.transition_to(UnitStatus::Installed)?;
                    summary.installed += 1;
                    info!(unit = name, elapsed_ms = elapsed.as_millis() as u64, "Unit installed");
                    println!("✅ {} installed successfully", name);
                }
                failure => {
                    let message = failure
                        .failure_message()
                        .unwrap_or_else(|| "Unknown failure".to_string());
                    unit.fail(message.clone())?;
                    summary.failed += 1;
                    error!(unit = name, error = %message, "Unit failed");
                    println!("⚠️  {} failed: {} (continuing anyway)", name, message);
                }
            }
            self.persist(registry)?;
        }

        Ok(summary)
    }

    fn persist(&self, registry: &Registry) -> Result<()> {
        self.store.save_registry(registry).inspect_err(|e| {
            error!(error = %e, "Could not persist run state, aborting run");
        })
    }
}
