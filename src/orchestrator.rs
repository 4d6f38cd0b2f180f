//! Orchestrator
//!
//! Owns everything a run needs and drives the pipeline:
//!
//! ```text
//! discover → preflight → resolve → queue → persist plan → execute → post-run → report
//! ```
//!
//! `plan` stops after the queue is built and writes nothing.

use crate::action::ActionRunner;
use crate::config_file::InstallConfig;
use crate::engine::{Engine, ExecutionSummary};
use crate::error::Result;
use crate::manifest::UnitManifest;
use crate::paths::InstallPaths;
use crate::post_run::{PostRunHook, PostRunResult, SessionSignal};
use crate::preflight::run_preflight;
use crate::queue::{build_queue, Queue};
use crate::registry::{discover, Registry};
use crate::report::RunReport;
use crate::resolver::apply_preferences;
use crate::state::StateStore;
use tracing::{info, warn};

/// Resolved registry plus the queue derived from it
#[derive(Debug, Clone)]
pub struct Plan {
    pub registry: Registry,
    pub queue: Queue,
}

impl Plan {
    /// Human-readable listing of the queue
    pub fn describe(&self) -> String {
        if self.queue.is_empty() {
            return "✅ All components already installed!".to_string();
        }
        let mut text = format!("📋 Installation plan: {} components", self.queue.len());
        for name in self.queue.iter() {
            if let Some(unit) = self.registry.get(name) {
                text.push_str(&format!("\n   • {} ({})", unit.name, unit.category));
            }
        }
        text
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub post_run: PostRunResult,
    pub queue: Queue,
    pub summary: ExecutionSummary,
}

pub struct Orchestrator<R: ActionRunner> {
    paths: InstallPaths,
    manifest: UnitManifest,
    runner: R,
    store: StateStore,
    session: SessionSignal,
}

impl<R: ActionRunner> Orchestrator<R> {
    pub fn new(paths: InstallPaths, manifest: UnitManifest, runner: R, session: SessionSignal) -> Self {
        let store = StateStore::new(&paths.state_file);
        Self {
            paths,
            manifest,
            runner,
            store,
            session,
        }
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Discover, probe, resolve and queue. Runs probes but persists nothing.
    pub fn plan(&self, config: &InstallConfig) -> Result<Plan> {
        let mut registry = discover(&self.paths.install_root, &self.manifest)?;
        let found = run_preflight(&self.runner, &mut registry, self.manifest.probe_timeout());
        let selected = apply_preferences(&mut registry, config);
        let queue = build_queue(&mut registry, self.manifest.ordering);

        info!(
            units = registry.len(),
            already_installed = found,
            optional_selected = selected,
            queued = queue.len(),
            order = %self.manifest.ordering,
            "Plan ready"
        );
        Ok(Plan { registry, queue })
    }

    /// Full run. Fails only when the state file cannot be written or the
    /// install tree cannot be scanned.
    pub fn run(&self, config: &InstallConfig) -> Result<RunOutcome> {
        self.log_previous_state();

        let plan = self.plan(config)?;
        // Skipped and already-installed units are visible before anything runs
        self.store.save_registry(&plan.registry)?;
        println!("\n{}", plan.describe());

        let Plan {
            mut registry,
            queue,
        } = plan;

        let summary = if queue.is_empty() {
            ExecutionSummary::default()
        } else {
            println!("\n{}", "=".repeat(50));
            println!("Starting installation...");
            println!("{}", "=".repeat(50));
            Engine::new(
                &self.runner,
                &self.store,
                &self.paths.install_root,
                self.manifest.action_timeout(),
            )
            .execute(&mut registry, &queue)?
        };

        let post_run = PostRunHook::new(
            &self.manifest.post_run,
            &self.paths.install_root,
            &self.paths.finish_script,
        )
        .run(&self.runner, &self.session);
        info!(result = %post_run, "Post-run hook finished");

        let report = RunReport::from_registry(&registry);
        info!(
            installed = report.installed,
            failed = report.failed,
            skipped = report.skipped,
            already_installed = report.already_installed,
            "Run finished"
        );

        Ok(RunOutcome {
            report,
            post_run,
            queue,
            summary,
        })
    }

    /// Previous state is informational; each run re-probes from scratch
    fn log_previous_state(&self) {
        match self.store.load() {
            Ok(None) => info!("No previous run state, starting fresh"),
            Ok(Some(previous)) => {
                let interrupted: Vec<&str> = previous.interrupted().collect();
                if !interrupted.is_empty() {
                    warn!(units = ?interrupted, "Previous run was interrupted mid-install");
                }
                info!(units = previous.components.len(), "Loaded previous run state");
            }
            Err(e) => warn!(error = %e, "Ignoring unreadable previous run state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionOutcome, ActionRequest};
    use crate::types::UnitStatus;
    use std::fs;
    use tempfile::TempDir;

    /// Probes and scripts both succeed unless their target mentions "fail"
    struct Fake;

    impl ActionRunner for Fake {
        fn run(&self, request: &ActionRequest) -> ActionOutcome {
            if request.target().contains("fail") {
                ActionOutcome::Failed { code: Some(1) }
            } else {
                ActionOutcome::Success
            }
        }
    }

    fn manifest() -> UnitManifest {
        UnitManifest {
            probes: Default::default(),
            ..UnitManifest::default()
        }
    }

    fn setup() -> (TempDir, InstallPaths) {
        let home = TempDir::new().unwrap();
        let root = home.path().join("omakub");
        for rel in [
            "install/terminal/app-fail-tool.sh",
            "install/terminal/mise.sh",
            "install/desktop/optional/app-zoom.sh",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "#!/bin/bash\n").unwrap();
        }
        let paths = InstallPaths::with_root(home.path(), root);
        (home, paths)
    }

    #[test]
    fn test_plan_writes_nothing() {
        let (_home, paths) = setup();
        let orchestrator =
            Orchestrator::new(paths.clone(), manifest(), Fake, SessionSignal::none());

        let plan = orchestrator.plan(&InstallConfig::default()).unwrap();

        assert_eq!(plan.queue.names(), ["fail_tool", "mise"]);
        assert_eq!(plan.registry.get("zoom").unwrap().status(), UnitStatus::Skipped);
        assert!(!paths.state_file.exists());
        assert!(plan.describe().contains("• mise (terminal)"));
    }

    #[test]
    fn test_run_records_every_outcome() {
        let (_home, paths) = setup();
        let orchestrator =
            Orchestrator::new(paths, manifest(), Fake, SessionSignal::none());

        let outcome = orchestrator.run(&InstallConfig::default()).unwrap();

        assert_eq!(outcome.summary, ExecutionSummary { installed: 1, failed: 1 });
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(outcome.post_run, PostRunResult::SkippedNoSession);

        let state = orchestrator.store().load().unwrap().unwrap();
        assert_eq!(state.status_of("mise"), Some(UnitStatus::Installed));
        assert_eq!(state.status_of("fail_tool"), Some(UnitStatus::Failed));
        assert_eq!(state.status_of("zoom"), Some(UnitStatus::Skipped));
    }
}
