//! Accumulates bytes from a port and hands out decoded messages.

use crate::error::Result;
use crate::port::Port;
use crate::protocol::message::Message;
use crate::protocol::packet;
use log::trace;

/// Size of a single read from the port.
const READ_CHUNK: usize = 256;

/// Stream receiver: owns the accumulation buffer between the port and the
/// packet decoder.
#[derive(Debug, Default)]
pub struct MessageReceiver {
    pending: Vec<u8>,
}

impl MessageReceiver {
    /// Create an empty receiver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull everything currently available from `port` and try to decode
    /// one message.
    ///
    /// Never waits for data. Returns at most one message; call again to
    /// drain any backlog.
    pub fn poll<P: Port + ?Sized>(&mut self, port: &mut P) -> Result<Option<Message>> {
        self.fill(port)?;

        let msg = packet::try_extract(&mut self.pending);
        if let Some(ref msg) = msg {
            trace!("Received {msg:?}");
        }
        Ok(msg)
    }

    /// Bytes buffered but not yet consumed by the decoder.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Read from the port while it keeps returning full chunks.
    fn fill<P: Port + ?Sized>(&mut self, port: &mut P) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;

        loop {
            let n = port.read_nonblocking(&mut chunk)?;
            self.pending
                .extend_from_slice(&chunk[..n]);
            total += n;
            if n < chunk.len() {
                break;
            }
        }

        Ok(total)
    }
}
