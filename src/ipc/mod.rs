//! The move channel spoken between the controller and its peers.
//!
//! Every message is exactly one newline-terminated line:
//!
//! | direction        | line                  | meaning                       |
//! |------------------|-----------------------|-------------------------------|
//! | controller->peer | `>{side}:{movetext}`  | apply this move to the mirror |
//! | controller->peer | `<`                   | choose and play a move now    |
//! | peer->controller | `ok`                  | acknowledgement of a notify   |
//! | peer->controller | movetext              | reply to a move request       |
//!
//! After each write the controller also delivers a `SIGHUP` wake to the
//! peer process. The signal carries no payload and is harmless when
//! redundant; both peer kinds ignore it, and the peer's own blocking read
//! of its input pipe is what actually unblocks it.

mod peer;

#[cfg(test)]
pub(crate) mod testutil;

pub use peer::Peer;

use std::str::FromStr;

use halma_core::Player;
use thiserror::Error;

/// Acknowledgement line sent by a peer after applying a notify.
pub const ACK: &str = "ok";

/// Request line asking a peer to choose and play a move.
pub const REQUEST: &str = "<";

/// A parsed `>{side}:{movetext}` notify line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub side: Player,
    pub movetext: String,
}

impl Notification {
    pub fn new(side: Player, movetext: impl Into<String>) -> Self {
        Self {
            side,
            movetext: movetext.into(),
        }
    }

    /// The wire form, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!(">{}:{}", self.side, self.movetext)
    }

    /// Parse a notify line. `None` for anything that is not a well-formed
    /// notify (the engine loop ignores the move but still acknowledges).
    pub fn parse(line: &str) -> Option<Notification> {
        let rest = line.strip_prefix('>')?;
        let (side, movetext) = rest.split_once(':')?;
        let side = Player::from_str(side).ok()?;
        let movetext = movetext.trim();
        if movetext.is_empty() {
            return None;
        }
        Some(Notification::new(side, movetext))
    }
}

/// Fatal conditions on a peer pipe. Every variant tears the session down.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{peer}: write failed: {source}")]
    Write {
        peer: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{peer}: read failed: {source}")]
    Read {
        peer: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{peer}: closed its pipe while a reply was pending")]
    PeerEof { peer: &'static str },

    #[error("{peer}: bad acknowledgement {line:?}")]
    BadAck { peer: &'static str, line: String },

    #[error("{peer}: empty reply to a move request")]
    EmptyReply { peer: &'static str },

    #[error("{peer}: wake signal failed: {source}")]
    Wake {
        peer: &'static str,
        #[source]
        source: nix::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_notification_to_line() {
        let n = Notification::new(Player::White, "c3-d4");
        assert_eq!(n.to_line(), ">white:c3-d4");
        let n = Notification::new(Player::Black, "f6-e5");
        assert_eq!(n.to_line(), ">black:f6-e5");
    }

    #[test]
    fn test_notification_parse_round_trip() {
        let n = Notification::new(Player::White, "c3-e5-e7");
        assert_eq!(Notification::parse(&n.to_line()), Some(n));
    }

    #[test]
    fn test_notification_parse_trims_movetext() {
        let n = Notification::parse(">black:f6-e5 ").unwrap();
        assert_eq!(n.movetext, "f6-e5");
    }

    #[test]
    fn test_notification_parse_rejects_garbage() {
        assert_eq!(Notification::parse("<"), None);
        assert_eq!(Notification::parse(">white"), None);
        assert_eq!(Notification::parse(">purple:c3-d4"), None);
        assert_eq!(Notification::parse(">white:"), None);
        assert_eq!(Notification::parse("ok"), None);
        assert_eq!(Notification::parse(""), None);
    }
}
