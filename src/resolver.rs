//! Preference Resolver
//!
//! Applies the user's optional-app selection to the registry.
//!
//! # Rules
//!
//! | Category             | `user_selected` |
//! |----------------------|-----------------|
//! | `terminal`/`desktop` | always `true`   |
//! | `optional`           | `true` iff an `optional_apps` entry matches |
//!
//! Matching compares names after normalizing `-` to `_` on both sides, so the
//! editor's `github-cli` selects the unit `github_cli`.
//!
//! Pure logic: no I/O, only flips selection flags.

use crate::config_file::InstallConfig;
use crate::registry::Registry;
use tracing::debug;

/// Canonical form used for selection matching. Only separators are folded;
/// whitespace and case are significant.
pub fn normalize_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Whether `unit` appears in `selection` under normalization
pub fn is_selected<S: AsRef<str>>(unit: &str, selection: &[S]) -> bool {
    let wanted = normalize_name(unit);
    selection
        .iter()
        .any(|entry| normalize_name(entry.as_ref()) == wanted)
}

/// Set `user_selected` on every unit from the configuration.
///
/// Returns the number of optional units selected.
pub fn apply_preferences(registry: &mut Registry, config: &InstallConfig) -> usize {
    let selection = config.selected_apps();
    let mut selected = 0;

    for unit in registry.iter_mut() {
        if unit.category.is_mandatory() {
            unit.user_selected = true;
            continue;
        }
        unit.user_selected = is_selected(&unit.name, selection);
        if unit.user_selected {
            selected += 1;
        }
    }

    // Selections naming nothing in the registry are kept silent for the user
    for entry in selection {
        if !registry.iter().any(|u| normalize_name(&u.name) == normalize_name(entry)) {
            debug!(selection = %entry, "Selected app has no matching unit");
        }
    }

    selected
}
