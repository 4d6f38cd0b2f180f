//! Post-run hook
//!
//! Fonts, theme and desktop settings need a live graphical session. The hook
//! runs after the queue drains, whether or not anything was installed.
//!
//! # Failure Policy
//!
//! Every step is **non-fatal**. A missing or failing step is reported and
//! the next one still runs; nothing here changes the run's outcome.

use crate::action::{ActionRequest, ActionRunner};
use crate::manifest::PostRunStep;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Whether a graphical session is reachable, captured once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSignal {
    pub display: Option<String>,
    pub wayland: Option<String>,
}

impl SessionSignal {
    /// Read `DISPLAY` and `WAYLAND_DISPLAY`. Empty values count as unset.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            display: read("DISPLAY"),
            wayland: read("WAYLAND_DISPLAY"),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_display(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
            wayland: None,
        }
    }

    pub fn present(&self) -> bool {
        self.display.is_some() || self.wayland.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// Script not present in the install tree
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub label: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRunResult {
    /// No graphical session; nothing ran
    SkippedNoSession,
    Completed(Vec<StepResult>),
}

impl PostRunResult {
    /// `(label, message)` for every failed step
    pub fn failures(&self) -> Vec<(&str, &str)> {
        match self {
            Self::SkippedNoSession => Vec::new(),
            Self::Completed(steps) => steps
                .iter()
                .filter_map(|s| match &s.outcome {
                    StepOutcome::Failed(msg) => Some((s.label.as_str(), msg.as_str())),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl fmt::Display for PostRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedNoSession => write!(f, "Post-run setup skipped (no desktop session)"),
            Self::Completed(steps) => {
                let failed = self.failures().len();
                if failed == 0 {
                    write!(f, "Post-run setup completed ({} step(s))", steps.len())
                } else {
                    write!(
                        f,
                        "Post-run setup completed with {} warning(s) ({} step(s))",
                        failed,
                        steps.len()
                    )
                }
            }
        }
    }
}

pub struct PostRunHook<'a> {
    steps: &'a [PostRunStep],
    install_root: &'a Path,
    finish_script: &'a Path,
}

impl<'a> PostRunHook<'a> {
    pub fn new(steps: &'a [PostRunStep], install_root: &'a Path, finish_script: &'a Path) -> Self {
        Self {
            steps,
            install_root,
            finish_script,
        }
    }

    pub fn run<R: ActionRunner + ?Sized>(&self, runner: &R, session: &SessionSignal) -> PostRunResult {
        if !session.present() {
            println!("\n⚠️  Not in desktop session - skipping themes and fonts");
            println!(
                "   Run {} from desktop to complete setup",
                self.finish_script.display()
            );
            info!("No graphical session, post-run steps skipped");
            return PostRunResult::SkippedNoSession;
        }

        println!("\n{}", "=".repeat(50));
        println!("🎨 Post-Installation Setup");
        println!("{}", "=".repeat(50));

        let mut results = Vec::with_capacity(self.steps.len());
        for step in self.steps {
            println!("\n⚙️  {}...", step.label);
            let script = self.install_root.join(&step.script);

            let outcome = if !script.is_file() {
                info!(step = %step.label, script = %script.display(), "Post-run script not present");
                StepOutcome::Missing
            } else {
                let request = ActionRequest::script(&script, self.install_root, step.timeout());
                match runner.run(&request).failure_message() {
                    None => {
                        println!("  ✅ Done");
                        StepOutcome::Succeeded
                    }
                    Some(message) => {
                        warn!(step = %step.label, error = %message, "Post-run step failed");
                        println!("  ⚠️  {} failed: {}", step.label, message);
                        StepOutcome::Failed(message)
                    }
                }
            };

            results.push(StepResult {
                label: step.label.clone(),
                outcome,
            });
        }

        println!("\n✨ Post-installation setup complete!");
        PostRunResult::Completed(results)
    }
}
