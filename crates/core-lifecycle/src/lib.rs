//! Signal handling and process-lifecycle helpers for the reducer driver.
//!
//! The driver orchestrates worker processes and owns scratch directories that
//! must not outlive it, so terminating signals have to reach a controlled
//! teardown path. The handler installed here is minimal: it only sets a
//! process-wide atomic flag. Actual teardown (killing worker process groups,
//! removing scratch directories) happens in the orchestrator at its next
//! check point: loop boundaries and `EINTR` returns from `waitpid`.

use anyhow::{Context, Result};
use nix::libc::c_int;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::debug;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static ROOT_PID: AtomicI32 = AtomicI32::new(0);

extern "C" fn flag_interrupt(_signum: c_int) {
    // Async-signal context: a relaxed store is the only thing allowed here.
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Signals that request teardown of the whole run.
const TERMINATING: [Signal; 4] = [
    Signal::SIGTERM,
    Signal::SIGINT,
    Signal::SIGHUP,
    Signal::SIGPIPE,
];

/// Record the calling process as the root of the run and install the
/// interrupt handler for all terminating signals.
///
/// `SA_RESTART` is deliberately not set: a blocked `waitpid` must return
/// `EINTR` so the orchestrator re-checks [`interrupted`] promptly.
pub fn install() -> Result<()> {
    ROOT_PID.store(nix::unistd::getpid().as_raw(), Ordering::SeqCst);
    let action = SigAction::new(
        SigHandler::Handler(flag_interrupt),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in TERMINATING {
        unsafe { signal::sigaction(sig, &action) }
            .with_context(|| format!("installing handler for {sig}"))?;
    }
    debug!(target: "lifecycle", root_pid = ROOT_PID.load(Ordering::SeqCst), "signal_handler_installed");
    Ok(())
}

/// True once any terminating signal has been received.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Trip the interrupt flag from normal code. Used by tests and by teardown
/// paths that want to stop any still-running loops.
pub fn trip() {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

#[doc(hidden)]
pub fn reset_for_tests() {
    INTERRUPTED.store(false, Ordering::Relaxed);
}

/// True iff the calling process is the one that called [`install`], or no
/// root was ever recorded. Teardown must only ever run in the root process.
pub fn is_root() -> bool {
    let root = ROOT_PID.load(Ordering::SeqCst);
    root == 0 || nix::unistd::getpid().as_raw() == root
}

/// Send `SIGTERM` to a worker's whole process group, so anything the oracle
/// spawned underneath it dies too. Delivery failures are ignored: the group
/// may already be gone.
pub fn terminate_group(leader: Pid) {
    match signal::killpg(leader, Signal::SIGTERM) {
        Ok(()) => debug!(target: "lifecycle", pid = leader.as_raw(), "group_terminated"),
        Err(errno) => {
            debug!(target: "lifecycle", pid = leader.as_raw(), %errno, "group_terminate_failed");
        }
    }
}
