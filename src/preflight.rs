//! Preflight Prober
//!
//! Marks units that are already present on the system so the queue skips
//! them. A probe that fails for any reason (non-zero exit, timeout, missing
//! binary) is the ordinary "needs install" answer, never an error.

use crate::action::{ActionRequest, ActionRunner};
use crate::registry::Registry;
use crate::types::UnitStatus;
use crate::unit::Unit;
use std::time::Duration;
use tracing::{debug, warn};

/// Status a unit's probe implies. Units without a probe are `NotInstalled`.
pub fn probe<R: ActionRunner + ?Sized>(runner: &R, unit: &Unit, timeout: Duration) -> UnitStatus {
    let Some(command) = unit.probe.as_deref() else {
        return UnitStatus::NotInstalled;
    };

    let outcome = runner.run(&ActionRequest::probe(command, timeout));
    if outcome.is_success() {
        UnitStatus::AlreadyInstalled
    } else {
        debug!(unit = %unit.name, probe = command, %outcome, "Probe did not confirm install");
        UnitStatus::NotInstalled
    }
}

/// Probe every unit sequentially, in discovery order.
///
/// Returns how many units were marked `AlreadyInstalled`.
pub fn run_preflight<R: ActionRunner + ?Sized>(
    runner: &R,
    registry: &mut Registry,
    timeout: Duration,
) -> usize {
    println!("\n🔍 Running preflight check...");

    let mut found = 0;
    for unit in registry.iter_mut() {
        if unit.status() != UnitStatus::NotInstalled {
            continue;
        }
        if probe(runner, unit, timeout) != UnitStatus::AlreadyInstalled {
            continue;
        }
        match unit.transition_to(UnitStatus::AlreadyInstalled) {
            Ok(()) => {
                println!("  ✓ {} already installed", unit.name);
                found += 1;
            }
            Err(e) => warn!(error = %e, "Could not record preflight result"),
        }
    }
    found
}
