//! Child-process supervision: spawn, wire, reap and tear down the display
//! and engine peers.

use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use halma_core::Player;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::ipc::Peer;

/// How the engine child is started and which knobs it receives.
#[derive(Debug, Clone)]
pub struct EngineLaunch {
    /// Override command; `None` re-executes the current binary with the
    /// hidden `engine` subcommand.
    pub command: Option<String>,
    pub depth: u8,
    pub random: bool,
    pub verbose: bool,
    pub avg_time: Option<u64>,
}

/// Owns every live child of the session and guarantees none survives it.
#[derive(Debug)]
pub struct Supervisor {
    pub(crate) display: Option<Peer>,
    pub(crate) engine: Option<Peer>,
    /// Every spawned pid, kept until reaped, for teardown.
    children: Vec<Pid>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(grace: Duration) -> Self {
        Self {
            display: None,
            engine: None,
            children: Vec::new(),
            grace,
        }
    }

    pub fn display_mut(&mut self) -> Option<&mut Peer> {
        self.display.as_mut()
    }

    pub fn engine_mut(&mut self) -> Option<&mut Peer> {
        self.engine.as_mut()
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Start the display program with its stdio wired to fresh pipes and
    /// block until it signals readiness with one line.
    pub fn spawn_display(&mut self, command: &str) -> Result<()> {
        let (program, args) = parse_command(command)?;
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start display program {command:?}"))?;
        let pid = Pid::from_raw(child.id() as i32);
        self.children.push(pid);
        let mut peer = Peer::from_child("display", &mut child)?;
        let ready = peer
            .wait_ready()
            .context("display did not signal readiness")?;
        tracing::debug!(%pid, line = %ready, "display ready");
        self.display = Some(peer);
        Ok(())
    }

    /// Start the engine child with the wake signal already ignored, then
    /// bring its board mirror to the current position by replaying every
    /// applied move as an ordinary notify.
    ///
    /// No readiness line is read; the protocol does not require one.
    pub fn spawn_engine(
        &mut self,
        launch: &EngineLaunch,
        history: &[(Player, String)],
    ) -> Result<()> {
        let mut cmd = match &launch.command {
            Some(command) => {
                let (program, args) = parse_command(command)?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            None => {
                let exe = std::env::current_exe().context("cannot locate own executable")?;
                let mut cmd = Command::new(exe);
                cmd.arg("engine");
                cmd.arg("--depth").arg(launch.depth.to_string());
                if launch.random {
                    cmd.arg("--random");
                }
                if launch.verbose {
                    cmd.arg("--verbose");
                }
                if let Some(secs) = launch.avg_time {
                    cmd.arg("--avg-time").arg(secs.to_string());
                }
                cmd
            }
        };
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
        // Ignore the wake signal in the child before exec; an ignored
        // disposition survives exec, so no wake can land before the engine
        // is ready for it.
        unsafe {
            cmd.pre_exec(ignore_sighup);
        }
        let mut child = cmd.spawn().context("failed to start engine process")?;
        let pid = Pid::from_raw(child.id() as i32);
        self.children.push(pid);
        let mut peer = Peer::from_child("engine", &mut child)?;
        for (side, movetext) in history {
            peer.notify(*side, movetext)
                .context("failed to bring engine mirror up to date")?;
        }
        tracing::debug!(%pid, plies = history.len(), "engine running");
        self.engine = Some(peer);
        Ok(())
    }

    /// Non-blocking wait-for-any-child loop, run when the child-exited
    /// flag was observed. Clears the records of whatever terminated.
    pub fn reap(&mut self) {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    tracing::info!(%pid, code, "child exited");
                    self.forget(pid);
                }
                Ok(WaitStatus::Signaled(pid, signal, _)) => {
                    tracing::info!(%pid, %signal, "child killed by signal");
                    self.forget(pid);
                }
                Ok(WaitStatus::StillAlive) => break,
                Ok(_) => continue,
                Err(Errno::ECHILD) => break,
                Err(err) => {
                    tracing::debug!("waitpid failed: {err}");
                    break;
                }
            }
        }
    }

    fn forget(&mut self, pid: Pid) {
        self.children.retain(|p| *p != pid);
        if let Some(peer) = &mut self.display {
            if peer.pid() == Some(pid) {
                peer.mark_dead();
            }
        }
        if let Some(peer) = &mut self.engine {
            if peer.pid() == Some(pid) {
                peer.mark_dead();
            }
        }
    }

    /// Best-effort graceful stop of everything: terminate, close pipes,
    /// wait out the grace interval, kill stragglers, reap them all.
    /// Idempotent; used by the normal end-of-game path and every fatal
    /// path alike.
    pub fn shutdown(&mut self) {
        if self.children.is_empty() && self.display.is_none() && self.engine.is_none() {
            return;
        }
        tracing::debug!(children = self.children.len(), "shutting down children");
        for pid in &self.children {
            let _ = kill(*pid, Signal::SIGTERM);
        }
        // Dropping the peers closes their pipe ends; a child blocked in a
        // read sees EOF even if the terminate signal went unheard.
        self.display = None;
        self.engine = None;
        if !self.children.is_empty() {
            thread::sleep(self.grace);
            self.reap();
        }
        for pid in std::mem::take(&mut self.children) {
            tracing::warn!(%pid, "child survived SIGTERM, killing");
            let _ = kill(pid, Signal::SIGKILL);
            // SIGKILL cannot be ignored, so this wait terminates.
            let _ = waitpid(pid, None);
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs in the engine child between fork and exec.
fn ignore_sighup() -> std::io::Result<()> {
    unsafe {
        libc::signal(libc::SIGHUP, libc::SIG_IGN);
    }
    Ok(())
}

/// Split a command string on whitespace. Quoting is not interpreted; for
/// anything complex, point the setting at a wrapper script.
fn parse_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let Some(program) = parts.next() else {
        bail!("empty command");
    };
    Ok((program, parts.collect()))
}
