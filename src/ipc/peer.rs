//! One live protocol endpoint: a child's pipe pair plus its pid.

use std::io::{BufRead, BufReader, Write};
use std::process::Child;

use anyhow::{Context, Result};
use halma_core::Player;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::ipc::{Notification, ProtocolError, ACK, REQUEST};

/// A peer process as seen from the controller: a name for diagnostics, the
/// child's pid (until it is reaped) and the two pipe handles.
///
/// The reader and writer are trait objects so tests can script a peer with
/// in-memory buffers; production wraps the child's stdio pipes.
pub struct Peer {
    name: &'static str,
    pid: Option<Pid>,
    reader: Box<dyn BufRead + Send>,
    writer: Box<dyn Write + Send>,
}

impl Peer {
    pub fn new(
        name: &'static str,
        reader: Box<dyn BufRead + Send>,
        writer: Box<dyn Write + Send>,
        pid: Option<Pid>,
    ) -> Self {
        Self {
            name,
            pid,
            reader,
            writer,
        }
    }

    /// Wrap a freshly spawned child, taking ownership of its pipe handles.
    pub fn from_child(name: &'static str, child: &mut Child) -> Result<Self> {
        let stdin = child
            .stdin
            .take()
            .with_context(|| format!("{name}: child stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .with_context(|| format!("{name}: child stdout was not piped"))?;
        let pid = Pid::from_raw(child.id() as i32);
        Ok(Self::new(
            name,
            Box::new(BufReader::new(stdout)),
            Box::new(stdin),
            Some(pid),
        ))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Called by the reaper once the child is gone. The handles stay open
    /// so the next protocol operation surfaces the failure as an EOF.
    pub fn mark_dead(&mut self) {
        self.pid = None;
    }

    /// Notify the peer that `side` just played `movetext` and block for
    /// its acknowledgement.
    pub fn notify(&mut self, side: Player, movetext: &str) -> Result<(), ProtocolError> {
        let line = Notification::new(side, movetext).to_line();
        self.send_line(&line)?;
        match self.read_line()? {
            None => Err(ProtocolError::PeerEof { peer: self.name }),
            Some(ack) if ack == ACK => Ok(()),
            Some(line) => Err(ProtocolError::BadAck {
                peer: self.name,
                line,
            }),
        }
    }

    /// Ask the peer to choose and play a move, blocking for its one-line
    /// reply. The caller validates the movetext against the authoritative
    /// board.
    pub fn request(&mut self) -> Result<String, ProtocolError> {
        self.send_line(REQUEST)?;
        match self.read_line()? {
            None => Err(ProtocolError::PeerEof { peer: self.name }),
            Some(line) if line.is_empty() => Err(ProtocolError::EmptyReply { peer: self.name }),
            Some(line) => Ok(line),
        }
    }

    /// Block for the single readiness line a display program must emit
    /// before any other interaction.
    pub fn wait_ready(&mut self) -> Result<String, ProtocolError> {
        match self.read_line()? {
            None => Err(ProtocolError::PeerEof { peer: self.name }),
            Some(line) => Ok(line),
        }
    }

    /// Write one line, flush it, then deliver the wake signal.
    fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|source| ProtocolError::Write {
                peer: self.name,
                source,
            })?;
        self.wake()
    }

    /// Best-effort nudge so a peer parked in an unrelated wait processes
    /// its input promptly. Never sent once the child has been reaped.
    fn wake(&self) -> Result<(), ProtocolError> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        kill(pid, Signal::SIGHUP).map_err(|source| ProtocolError::Wake {
            peer: self.name,
            source,
        })
    }

    /// One trimmed line from the peer; `None` on EOF.
    fn read_line(&mut self) -> Result<Option<String>, ProtocolError> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|source| ProtocolError::Read {
                peer: self.name,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("name", &self.name)
            .field("pid", &self.pid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::testutil::scripted_peer;

    #[test]
    fn test_notify_writes_line_and_reads_ack() {
        let (mut peer, buf) = scripted_peer("display", "ok\n");
        peer.notify(Player::White, "c3-d4").unwrap();
        assert_eq!(buf.contents(), ">white:c3-d4\n");
    }

    #[test]
    fn test_notify_rejects_bad_ack() {
        let (mut peer, _buf) = scripted_peer("display", "nope\n");
        let err = peer.notify(Player::White, "c3-d4").unwrap_err();
        assert!(matches!(err, ProtocolError::BadAck { .. }), "{err}");
    }

    #[test]
    fn test_notify_eof_is_peer_eof() {
        let (mut peer, _buf) = scripted_peer("engine", "");
        let err = peer.notify(Player::Black, "f6-e5").unwrap_err();
        assert!(matches!(err, ProtocolError::PeerEof { .. }), "{err}");
    }

    #[test]
    fn test_request_returns_movetext() {
        let (mut peer, buf) = scripted_peer("engine", "f6-e5\n");
        assert_eq!(peer.request().unwrap(), "f6-e5");
        assert_eq!(buf.contents(), "<\n");
    }

    #[test]
    fn test_request_empty_reply_is_fatal() {
        let (mut peer, _buf) = scripted_peer("display", "\n");
        let err = peer.request().unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyReply { .. }), "{err}");
    }

    #[test]
    fn test_request_eof_is_peer_eof() {
        let (mut peer, _buf) = scripted_peer("display", "");
        let err = peer.request().unwrap_err();
        assert!(matches!(err, ProtocolError::PeerEof { .. }), "{err}");
    }

    #[test]
    fn test_wait_ready_reads_one_line() {
        let (mut peer, buf) = scripted_peer("display", "display ready\n");
        assert_eq!(peer.wait_ready().unwrap(), "display ready");
        assert_eq!(buf.contents(), "");
    }
}
