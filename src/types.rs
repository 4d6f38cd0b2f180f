//! Type-safe enums shared across the orchestrator
//!
//! String forms are part of external contracts (run state file, unit manifest,
//! configuration document), so every enum pins its serde and strum spelling.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Category a unit was discovered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// Command-line tooling, always installed
    Terminal,
    /// Baseline desktop applications, always installed
    Desktop,
    /// Opt-in applications, installed only when selected
    Optional,
}

impl Category {
    /// Terminal and desktop units never need explicit selection
    pub const fn is_mandatory(self) -> bool {
        matches!(self, Self::Terminal | Self::Desktop)
    }
}

/// Per-unit installation status
///
/// ```text
/// NotInstalled ──► Installing ──► Installed
///      │                └───────► Failed
///      ├──► AlreadyInstalled   (preflight)
///      └──► Skipped            (not selected)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    NotInstalled,
    AlreadyInstalled,
    Installing,
    Installed,
    Failed,
    Skipped,
}

impl UnitStatus {
    /// Terminal statuses are never left again within a run
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::AlreadyInstalled | Self::Installed | Self::Failed | Self::Skipped
        )
    }

    /// Console icon used by the report and status viewer
    pub const fn icon(self) -> &'static str {
        match self {
            Self::NotInstalled => "❓",
            Self::AlreadyInstalled => "📦",
            Self::Installing => "⏳",
            Self::Installed => "✅",
            Self::Failed => "⚠️",
            Self::Skipped => "⏭️",
        }
    }
}

/// How the queue builder orders the units it keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueOrder {
    /// Discovery order, prerequisites ignored (legacy behavior)
    #[default]
    Discovery,
    /// Stable topological order over declared prerequisites
    Prerequisites,
}

/// `mode` field of the configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfigMode {
    #[default]
    Interactive,
    Unattended,
}
