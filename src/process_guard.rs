//! Process lifecycle management for unit actions
//!
//! Installer scripts routinely spawn their own children (apt, curl, dpkg).
//! Each action therefore runs as the leader of its own process group, so a
//! timeout or an orchestrator shutdown can stop the whole tree at once.
//!
//! - Children are spawned in a new process group with `PR_SET_PDEATHSIG`
//! - Live child PIDs are tracked in a global registry
//! - On SIGINT/SIGTERM/SIGHUP or `ProcessGuard` drop, every tracked group
//!   gets SIGTERM, then SIGKILL after a grace period

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Registry tracking every running action's process group leader
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set once shutdown cleanup starts so it never runs twice
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!(pid, "Registered child process group");
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!(pid, "Unregistered child process group");
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Stop every tracked group. Runs at most once per registry.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.count() == 0 {
            return;
        }

        info!(count = self.count(), "Terminating running install actions");
        for pid in self.pids.drain() {
            terminate_group(pid, grace_period);
        }
    }
}

/// Run `f` against the global registry, tolerating a poisoned lock
pub(crate) fn with_registry<F: FnOnce(&mut ChildRegistry)>(f: F) {
    let registry = ChildRegistry::global();
    let mut guard = match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard);
}

/// SIGTERM a process group, wait up to `grace_period`, then SIGKILL it.
///
/// Returns true if the leader exited within the grace period.
pub fn terminate_group(pgid: u32, grace_period: Duration) -> bool {
    if let Err(e) = send_signal_to_group(pgid, Signal::SIGTERM) {
        debug!(pgid, error = %e, "SIGTERM to process group failed, signalling leader");
        let _ = send_signal(pgid, Signal::SIGTERM);
    }

    let start = Instant::now();
    while start.elapsed() < grace_period {
        if !is_process_alive(pgid) {
            return true;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    warn!(pgid, "Process group did not stop after SIGTERM, sending SIGKILL");
    if send_signal_to_group(pgid, Signal::SIGKILL).is_err() {
        let _ = send_signal(pgid, Signal::SIGKILL);
    }
    false
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Negative PID addresses the whole group, including grandchildren
fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Alive means present and neither zombie nor dead
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state letter
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    true
}

/// RAII guard that stops all running actions when the orchestrator unwinds
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        debug!("ProcessGuard dropped, stopping remaining actions");
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
///
/// This is not a clean cancel: the unit in flight is left half-done and
/// stays `installing` in the state file. Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };
            warn!("Received {}, stopping running install action", signal_name);

            with_registry(|registry| registry.terminate_all(Duration::from_secs(3)));

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for `std::process::Command` to set up process groups
pub trait CommandProcessGroup {
    /// Run the command as leader of a new process group that dies with us
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure only calls async-signal-safe syscalls
        // (setpgid, prctl) between fork and exec.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }

                Ok(())
            });
        }
        self
    }
}
