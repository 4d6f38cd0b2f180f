//! External action invocation
//!
//! Every probe, unit script and post-run step goes through an `ActionRunner`.
//! The runner never returns an error: spawn failures, non-zero exits and
//! timeouts all come back as an `ActionOutcome` that the caller records.
//!
//! `SystemRunner` is the production implementation. It spawns each action as
//! a process group leader, registers it with the global `ChildRegistry`, and
//! polls for completion until the per-invocation deadline.

use crate::paths::INSTALL_ROOT_ENV;
use crate::process_guard::{self, CommandProcessGroup};
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const KILL_GRACE: Duration = Duration::from_secs(2);

/// A fully described external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    /// Discard stdout/stderr instead of passing them through
    pub quiet: bool,
}

impl ActionRequest {
    /// `bash <script>` with the install root injected, output passed through
    pub fn script(script: &Path, install_root: &Path, timeout: Duration) -> Self {
        Self {
            program: "bash".to_string(),
            args: vec![script.display().to_string()],
            env: vec![(
                INSTALL_ROOT_ENV.to_string(),
                install_root.display().to_string(),
            )],
            timeout,
            quiet: false,
        }
    }

    /// `sh -c <command>` with output discarded
    pub fn probe(command: &str, timeout: Duration) -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), command.to_string()],
            env: Vec::new(),
            timeout,
            quiet: true,
        }
    }

    /// Last argument, i.e. the script path or probe command
    pub fn target(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or(&self.program)
    }
}

/// Result of one external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Exited with status 0 within the deadline
    Success,
    /// Exited non-zero; `None` when killed by a signal
    Failed { code: Option<i32> },
    /// Still running at the deadline and was stopped
    TimedOut { limit: Duration },
    /// Could not be spawned or waited on
    Error(String),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Message recorded against a failed unit; `None` on success
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Success => None,
            Self::Failed { code: Some(code) } => Some(format!("Exit code: {}", code)),
            Self::Failed { code: None } => Some("Terminated by signal".to_string()),
            Self::TimedOut { limit } => {
                Some(format!("Installation timeout ({}s)", limit.as_secs()))
            }
            Self::Error(reason) => Some(reason.clone()),
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure_message() {
            None => write!(f, "success"),
            Some(msg) => write!(f, "{}", msg),
        }
    }
}

/// Executes external actions; the seam tests substitute
pub trait ActionRunner {
    fn run(&self, request: &ActionRequest) -> ActionOutcome;
}

impl<R: ActionRunner + ?Sized> ActionRunner for &R {
    fn run(&self, request: &ActionRequest) -> ActionOutcome {
        (**self).run(request)
    }
}

/// Runs actions as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ActionRunner for SystemRunner {
    fn run(&self, request: &ActionRequest) -> ActionOutcome {
        debug!(
            program = %request.program,
            args = ?request.args,
            timeout_secs = request.timeout.as_secs(),
            "Spawning action"
        );

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .in_new_process_group();
        if request.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(action = %request.target(), error = %e, "Failed to spawn action");
                return ActionOutcome::Error(format!(
                    "Failed to spawn {}: {}",
                    request.program, e
                ));
            }
        };
        let pid = child.id();
        process_guard::with_registry(|r| r.register(pid));

        let start = Instant::now();
        let outcome = loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => break ActionOutcome::Success,
                Ok(Some(status)) => break ActionOutcome::Failed { code: status.code() },
                Ok(None) if start.elapsed() >= request.timeout => {
                    info!(
                        action = %request.target(),
                        limit_secs = request.timeout.as_secs(),
                        "Action exceeded its timeout, stopping it"
                    );
                    process_guard::terminate_group(pid, KILL_GRACE);
                    let _ = child.wait();
                    break ActionOutcome::TimedOut {
                        limit: request.timeout,
                    };
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL.min(request.timeout)),
                Err(e) => {
                    process_guard::terminate_group(pid, KILL_GRACE);
                    let _ = child.wait();
                    break ActionOutcome::Error(format!("Failed waiting for action: {}", e));
                }
            }
        };

        process_guard::with_registry(|r| r.unregister(pid));
        debug!(action = %request.target(), %outcome, "Action finished");
        outcome
    }
}
