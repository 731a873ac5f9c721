//! Test helpers: peers scripted over in-memory buffers.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use crate::ipc::Peer;

/// Test writer that keeps its bytes inspectable after the peer is done.
#[derive(Clone, Default)]
pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

/// A pid-less peer whose replies are fixed up front; returns the peer and
/// a handle on everything written to it.
pub(crate) fn scripted_peer(name: &'static str, replies: &str) -> (Peer, SharedBuf) {
    let buf = SharedBuf::default();
    let peer = Peer::new(
        name,
        Box::new(Cursor::new(replies.as_bytes().to_vec())),
        Box::new(buf.clone()),
        None,
    );
    (peer, buf)
}
