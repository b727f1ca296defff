// SPDX-License-Identifier: MIT

//! Stream buffer (§4.8.1): a bounded byte ring with overflow latching.

use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub written: u64,
    pub read: u64,
    pub last_write_at_ms: u64,
    pub overflow: bool,
}

struct Inner {
    bytes: VecDeque<u8>,
    max_size: usize,
    stats: BufferStats,
}

/// Thread-safe byte buffer with a maximum size. Writes that would exceed
/// capacity drop the oldest bytes and latch `overflow` (§4.8.1).
pub struct StreamBuffer {
    inner: Mutex<Inner>,
}

impl StreamBuffer {
    pub fn new(max_size: usize) -> Self {
        Self { inner: Mutex::new(Inner { bytes: VecDeque::new(), max_size, stats: BufferStats::default() }) }
    }

    pub fn write(&self, data: &[u8], now_ms: u64) {
        let mut inner = self.inner.lock();
        inner.bytes.extend(data.iter().copied());
        if inner.bytes.len() > inner.max_size {
            let overflow_by = inner.bytes.len() - inner.max_size;
            inner.bytes.drain(..overflow_by);
            inner.stats.overflow = true;
        }
        inner.stats.written += data.len() as u64;
        inner.stats.last_write_at_ms = now_ms;
    }

    /// Drain up to `n` bytes from the front of the buffer.
    pub fn read(&self, n: usize) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let take = n.min(inner.bytes.len());
        let out: Vec<u8> = inner.bytes.drain(..take).collect();
        inner.stats.read += out.len() as u64;
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.lock().stats
    }

    /// Resize the maximum capacity, re-truncating (and latching overflow)
    /// if shrinking discards data (§4.8.1 "Resize re-truncates").
    pub fn resize(&self, max_size: usize) {
        let mut inner = self.inner.lock();
        inner.max_size = max_size;
        if inner.bytes.len() > max_size {
            let overflow_by = inner.bytes.len() - max_size;
            inner.bytes.drain(..overflow_by);
            inner.stats.overflow = true;
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
