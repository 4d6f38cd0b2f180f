//! Unit model and status state machine
//!
//! A `Unit` owns its current status and only moves along validated edges.
//! Status is monotonic within one run: once a unit leaves `NotInstalled` it
//! never returns, and terminal statuses are final.
//!
//! # Legal edges
//!
//! ```text
//! NotInstalled → AlreadyInstalled | Skipped | Installing
//! Installing   → Installed | Failed
//! ```
//!
//! Re-applying a terminal status a unit already holds is accepted as a no-op,
//! so re-running the queue builder over the same registry is harmless.

use crate::types::{Category, UnitStatus};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an illegal status change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitTransitionError {
    /// Tried to leave a terminal status
    #[error("Unit '{unit}' is already {from} and cannot become {to}")]
    FromTerminal {
        unit: String,
        from: UnitStatus,
        to: UnitStatus,
    },

    /// Edge not in the state machine
    #[error("Unit '{unit}' cannot move from {from} to {to}")]
    Illegal {
        unit: String,
        from: UnitStatus,
        to: UnitStatus,
    },

    /// `Failed` must carry a reason
    #[error("Unit '{unit}' cannot fail without an error message")]
    MissingReason { unit: String },
}

/// One installable item tracked by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    /// Script invoked as `bash <action>`; never inspected
    pub action: PathBuf,
    pub category: Category,
    /// Shell command whose zero exit means "already installed"
    pub probe: Option<String>,
    /// Declared predecessors; only consulted in prerequisite ordering mode
    pub prerequisites: Vec<String>,
    pub user_selected: bool,
    status: UnitStatus,
    error_message: Option<String>,
}

impl Unit {
    /// Create a unit in `NotInstalled`, selected iff its category is mandatory
    pub fn new(name: impl Into<String>, action: impl Into<PathBuf>, category: Category) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            category,
            probe: None,
            prerequisites: Vec::new(),
            user_selected: category.is_mandatory(),
            status: UnitStatus::NotInstalled,
            error_message: None,
        }
    }

    pub fn with_probe(mut self, probe: impl Into<String>) -> Self {
        self.probe = Some(probe.into());
        self
    }

    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn status(&self) -> UnitStatus {
        self.status
    }

    /// Present only while status is `Failed`
    #[inline]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Move to `to`, which must not be `Failed` (use [`Unit::fail`])
    pub fn transition_to(&mut self, to: UnitStatus) -> Result<(), UnitTransitionError> {
        if to == UnitStatus::Failed {
            return Err(UnitTransitionError::MissingReason {
                unit: self.name.clone(),
            });
        }
        self.check_edge(to)?;
        self.status = to;
        Ok(())
    }

    /// Move `Installing → Failed` with a reason
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), UnitTransitionError> {
        self.check_edge(UnitStatus::Failed)?;
        self.status = UnitStatus::Failed;
        self.error_message = Some(reason.into());
        Ok(())
    }

    fn check_edge(&self, to: UnitStatus) -> Result<(), UnitTransitionError> {
        use UnitStatus::*;

        let from = self.status;
        if from == to && from.is_terminal() && to != Failed {
            return Ok(());
        }
        if from.is_terminal() {
            return Err(UnitTransitionError::FromTerminal {
                unit: self.name.clone(),
                from,
                to,
            });
        }
        let legal = matches!(
            (from, to),
            (NotInstalled, AlreadyInstalled | Skipped | Installing)
                | (Installing, Installed | Failed)
        );
        if legal {
            Ok(())
        } else {
            Err(UnitTransitionError::Illegal {
                unit: self.name.clone(),
                from,
                to,
            })
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.category)
    }
}

impl From<UnitTransitionError> for crate::error::BentoError {
    fn from(err: UnitTransitionError) -> Self {
        crate::error::BentoError::transition(err.to_string())
    }
}
