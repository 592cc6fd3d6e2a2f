//! Bounded ring buffer for background-process output (spec.md §3, invariant I5).
//!
//! Producers never block: once full, the oldest bytes are dropped and a
//! `truncated` flag is set. Consumption returns everything since the last
//! consumed offset.

use std::collections::VecDeque;

pub struct OutputRing {
    capacity: usize,
    buf: VecDeque<u8>,
    truncated: bool,
    /// Total bytes ever produced, including dropped ones — used to report a
    /// stable `consumed_offset` to callers.
    total_produced: u64,
    consumed_offset: u64,
}

impl OutputRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity.min(64 * 1024)),
            truncated: false,
            total_produced: 0,
            consumed_offset: 0,
        }
    }

    /// Append producer bytes, dropping the oldest on overflow.
    pub fn push(&mut self, data: &[u8]) {
        self.total_produced += data.len() as u64;
        for &byte in data {
            if self.buf.len() == self.capacity {
                self.buf.pop_front();
                self.truncated = true;
                self.consumed_offset = self.consumed_offset.saturating_add(1);
            }
            self.buf.push_back(byte);
        }
    }

    /// Drain everything currently buffered, advancing the consumed offset.
    pub fn drain(&mut self) -> (Vec<u8>, bool) {
        let data: Vec<u8> = self.buf.drain(..).collect();
        self.consumed_offset = self.total_produced;
        let was_truncated = self.truncated;
        self.truncated = false;
        (data, was_truncated)
    }

    pub fn consumed_offset(&self) -> u64 {
        self.consumed_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_bytes_on_overflow_and_sets_truncated() {
        let mut ring = OutputRing::new(4);
        ring.push(b"abcdef");
        let (data, truncated) = ring.drain();
        assert_eq!(data, b"cdef");
        assert!(truncated);
    }

    #[test]
    fn under_capacity_is_not_truncated() {
        let mut ring = OutputRing::new(16);
        ring.push(b"hello");
        let (data, truncated) = ring.drain();
        assert_eq!(data, b"hello");
        assert!(!truncated);
    }

    #[test]
    fn drain_is_cumulative_since_last_drain() {
        let mut ring = OutputRing::new(16);
        ring.push(b"abc");
        ring.drain();
        ring.push(b"def");
        let (data, _) = ring.drain();
        assert_eq!(data, b"def");
    }
}
