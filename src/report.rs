//! Run Report and status view
//!
//! `RunReport` summarizes unit outcomes either from the live registry at the
//! end of a run or from a persisted `RunState`, which is how the `status`
//! command and external viewers see a run in progress.

use crate::registry::Registry;
use crate::state::{RunState, Snapshot};
use crate::types::UnitStatus;
use std::fmt::{self, Write};

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub installed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub already_installed: usize,
    /// Non-zero only when read mid-run or after a crash
    pub installing: usize,
    /// `(name, error)` for each failed unit
    pub failures: Vec<(String, String)>,
}

impl RunReport {
    /// Tally a registry; failures come out in discovery order
    pub fn from_registry(registry: &Registry) -> Self {
        let mut report = Self::default();
        for unit in registry.iter() {
            report.record(&unit.name, unit.status(), unit.error_message());
        }
        report
    }

    /// Tally a persisted state; failures come out sorted by name
    pub fn from_state(state: &RunState) -> Self {
        let mut report = Self::default();
        for (name, record) in &state.components {
            report.record(name, record.status, record.error.as_deref());
        }
        report
    }

    fn record(&mut self, name: &str, status: UnitStatus, error: Option<&str>) {
        match status {
            UnitStatus::Installed => self.installed += 1,
            UnitStatus::AlreadyInstalled => self.already_installed += 1,
            UnitStatus::Skipped => self.skipped += 1,
            UnitStatus::Installing => self.installing += 1,
            UnitStatus::Failed => {
                self.failed += 1;
                self.failures
                    .push((name.to_string(), error.unwrap_or("unknown error").to_string()));
            }
            UnitStatus::NotInstalled => {}
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(f, "📊 Installation Summary")?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(f, "  ✅ Successful: {}", self.installed)?;
        writeln!(f, "  ⚠️  Failed: {}", self.failed)?;
        writeln!(f, "  ⏭️  Skipped: {}", self.skipped)?;
        write!(f, "  📦 Already installed: {}", self.already_installed)?;
        if self.installing > 0 {
            write!(f, "\n  ⏳ Interrupted: {}", self.installing)?;
        }

        if !self.failures.is_empty() {
            write!(f, "\n\n⚠️  Failed components:")?;
            for (name, error) in &self.failures {
                write!(f, "\n   • {}: {}", name, error)?;
            }
        }
        Ok(())
    }
}

/// Render a state snapshot the way the status viewer shows it
pub fn render_status(snapshot: &Snapshot) -> String {
    let state = match snapshot {
        Snapshot::Absent => {
            return "No installation state found.\n\nRun an installation to see status here.\n"
                .to_string();
        }
        Snapshot::Unavailable(reason) => {
            return format!("Installation state is being updated, try again.\n({})\n", reason);
        }
        Snapshot::Available(state) => state,
    };

    let report = RunReport::from_state(state);
    let mut text = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(text, "📊 Installation Status\n");
    let _ = writeln!(text, "✅ Installed this run: {}", report.installed);
    let _ = writeln!(text, "📦 Already installed: {}", report.already_installed);
    let _ = writeln!(text, "⚠️  Failed: {}", report.failed);
    let _ = writeln!(text, "⏭️  Skipped: {}", report.skipped);
    if report.installing > 0 {
        let _ = writeln!(text, "⏳ Installing: {}", report.installing);
    }
    let _ = writeln!(text, "\n{}\n", "─".repeat(RULE_WIDTH));
    let _ = writeln!(text, "Component Details:\n");

    for (name, record) in &state.components {
        let _ = writeln!(text, "{} {}: {}", record.status.icon(), name, record.status);
        if let Some(error) = &record.error {
            let _ = writeln!(text, "   Error: {}", error);
        }
    }
    text
}
