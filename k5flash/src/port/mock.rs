//! In-memory port for protocol tests.
//!
//! Reads and writes are independent: bytes queued with [`MockPort::feed`]
//! come back from `read_nonblocking`, and every `write` call is recorded as
//! one chunk.

use std::collections::VecDeque;

use crate::error::Result;
use crate::port::Port;

/// Mock serial port with separate read/write buffers.
#[derive(Debug, Default)]
pub(crate) struct MockPort {
    read_buf: VecDeque<u8>,
    max_read: Option<usize>,
    written: Vec<Vec<u8>>,
    flushes: usize,
}

impl MockPort {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Deliver at most `max_read` bytes per read call.
    pub(crate) fn with_max_read(max_read: usize) -> Self {
        Self {
            max_read: Some(max_read),
            ..Self::default()
        }
    }

    /// Queue bytes for the host to read.
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        self.read_buf.extend(bytes);
    }

    /// Bytes queued but not yet read.
    pub(crate) fn pending(&self) -> usize {
        self.read_buf.len()
    }

    /// Take every chunk written so far.
    pub(crate) fn take_written(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.written)
    }

    pub(crate) fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Port for MockPort {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let limit = self.max_read.unwrap_or(usize::MAX);
        let n = buf.len().min(self.read_buf.len()).min(limit);
        for (dst, src) in buf.iter_mut().zip(self.read_buf.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.written.push(data.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
