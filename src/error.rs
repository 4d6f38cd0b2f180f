//! Error handling module for the orchestrator
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Per-unit install failures are NOT errors: they are `ActionOutcome` values
//! recorded in the run state. Only conditions that break the run itself end up here.

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum BentoError {
    /// IO errors (directory scans, script spawning)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (home directory, paths, config document)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run state persistence errors. Fatal: the state file is the
    /// crash-recovery and observability contract.
    #[error("State file error: {0}")]
    State(String),

    /// Unit manifest validation errors
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Unit status transition errors
    #[error("Unit transition error: {0}")]
    Transition(String),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, BentoError>;

impl BentoError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state persistence error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create a manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    /// Create a unit transition error
    pub fn transition(msg: impl Into<String>) -> Self {
        Self::Transition(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }

    /// True when this error breaks the persisted-state contract
    pub fn is_state_failure(&self) -> bool {
        matches!(self, Self::State(_))
    }
}
