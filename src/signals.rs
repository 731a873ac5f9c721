//! Asynchronous signal handling for the session.
//!
//! Handlers only store to static flags, which the turn loop reads and
//! clears at its top-of-iteration checkpoint. `SA_RESTART` keeps the
//! blocking pipe reads from being interrupted mid-message. A broken pipe
//! needs no handler: the Rust runtime leaves `SIGPIPE` ignored, so a peer
//! closing its read end surfaces as an `EPIPE` write error in the IPC
//! layer, which is already fatal there.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static TERMINATE: AtomicBool = AtomicBool::new(false);
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_terminate(_signo: libc::c_int) {
    TERMINATE.store(true, Ordering::Relaxed);
}

extern "C" fn on_child(_signo: libc::c_int) {
    CHILD_EXITED.store(true, Ordering::Relaxed);
}

/// Install the session's handlers: SIGINT/SIGTERM request termination,
/// SIGCHLD requests a reap.
pub fn install() -> Result<()> {
    let terminate = SigAction::new(
        SigHandler::Handler(on_terminate),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    let child = SigAction::new(
        SigHandler::Handler(on_child),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        sigaction(Signal::SIGINT, &terminate).context("sigaction(SIGINT)")?;
        sigaction(Signal::SIGTERM, &terminate).context("sigaction(SIGTERM)")?;
        sigaction(Signal::SIGCHLD, &child).context("sigaction(SIGCHLD)")?;
    }
    Ok(())
}

/// Whether an interrupt/terminate request is pending. Not cleared: once
/// requested, termination stays requested.
pub fn terminate_requested() -> bool {
    TERMINATE.load(Ordering::Relaxed)
}

/// Take (and clear) the child-exited flag.
pub fn take_child_exited() -> bool {
    CHILD_EXITED.swap(false, Ordering::Relaxed)
}

#[cfg(test)]
pub(crate) fn trigger_terminate_for_test() {
    TERMINATE.store(true, Ordering::Relaxed);
}

#[cfg(test)]
pub(crate) fn clear_for_test() {
    TERMINATE.store(false, Ordering::Relaxed);
    CHILD_EXITED.store(false, Ordering::Relaxed);
}
