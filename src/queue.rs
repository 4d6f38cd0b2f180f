//! Queue Builder
//!
//! Derives the ordered list of units to execute from the resolved registry.
//! Unselected optional units are marked `Skipped` here, so the registry
//! reflects the final plan once the queue exists.

use crate::registry::Registry;
use crate::types::{Category, QueueOrder, UnitStatus};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Unit names to execute, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    names: Vec<String>,
}

impl Queue {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(", "))
    }
}

/// Build the execution queue.
///
/// Per unit, first matching rule wins:
/// 1. already installed → excluded
/// 2. optional and not selected → marked `Skipped`, excluded
/// 3. otherwise → queued
///
/// Units already in any other terminal state are left out as well.
pub fn build_queue(registry: &mut Registry, order: QueueOrder) -> Queue {
    let mut queued = Vec::new();

    for unit in registry.iter_mut() {
        match unit.status() {
            UnitStatus::AlreadyInstalled => continue,
            UnitStatus::Skipped => continue,
            UnitStatus::NotInstalled => {}
            other => {
                debug!(unit = %unit.name, status = %other, "Unit not eligible for queueing");
                continue;
            }
        }

        if unit.category == Category::Optional && !unit.user_selected {
            if let Err(e) = unit.transition_to(UnitStatus::Skipped) {
                warn!(error = %e, "Could not mark unit skipped");
            }
            continue;
        }

        queued.push(unit.name.clone());
    }

    let names = match order {
        QueueOrder::Discovery => queued,
        QueueOrder::Prerequisites => order_by_prerequisites(registry, queued),
    };

    debug!(order = %order, len = names.len(), "Built install queue");
    Queue { names }
}

/// Stable Kahn's sort over the queued units.
///
/// Edges to units outside the queue are ignored. Ties go to discovery order.
/// Anything left in a cycle is appended in discovery order.
fn order_by_prerequisites(registry: &Registry, queued: Vec<String>) -> Vec<String> {
    let members: HashSet<&str> = queued.iter().map(String::as_str).collect();
    let position: HashMap<&str, usize> = queued
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; queued.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); queued.len()];
    for (i, name) in queued.iter().enumerate() {
        let Some(unit) = registry.get(name) else {
            continue;
        };
        let prereqs: BTreeSet<&str> = unit
            .prerequisites
            .iter()
            .map(String::as_str)
            .filter(|p| members.contains(p) && *p != name.as_str())
            .collect();
        for prereq in prereqs {
            dependents[position[prereq]].push(i);
            indegree[i] += 1;
        }
    }

    // Smallest discovery index first keeps the sort stable
    let mut ready: BTreeSet<usize> = (0..queued.len()).filter(|&i| indegree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(queued.len());
    let mut placed = vec![false; queued.len()];

    while let Some(i) = ready.pop_first() {
        ordered.push(i);
        placed[i] = true;
        for &d in &dependents[i] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if ordered.len() < queued.len() {
        let stuck: Vec<&str> = (0..queued.len())
            .filter(|&i| !placed[i])
            .map(|i| queued[i].as_str())
            .collect();
        warn!(units = ?stuck, "Prerequisite cycle, appending in discovery order");
        ordered.extend((0..queued.len()).filter(|&i| !placed[i]));
    }

    ordered.into_iter().map(|i| queued[i].clone()).collect()
}
