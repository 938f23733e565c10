//! In-memory window over the most recently appended bytes.
//!
//! Offsets are absolute positions in the logical stream. Eviction happens a
//! whole chunk at a time from the front, and the newest chunk is never
//! evicted, so any offset at or past `start()` stays readable even when a
//! single chunk is larger than the budget.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::VecDeque;

#[derive(Debug)]
pub(crate) struct SlidingWindow {
    budget: usize,
    start: u64,
    end: u64,
    chunks: VecDeque<Bytes>,
}

impl SlidingWindow {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            budget,
            start: 0,
            end: 0,
            chunks: VecDeque::new(),
        }
    }

    /// Absolute offset of the oldest retained byte.
    pub(crate) fn start(&self) -> u64 {
        self.start
    }

    /// Total number of bytes ever appended.
    pub(crate) fn end(&self) -> u64 {
        self.end
    }

    pub(crate) fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Appends a chunk at the tail and evicts from the front while over budget.
    pub(crate) fn append(&mut self, chunk: Bytes) {
        self.end += chunk.len() as u64;
        self.chunks.push_back(chunk);
        while self.len() > self.budget as u64 && self.chunks.len() > 1 {
            if let Some(evicted) = self.chunks.pop_front() {
                self.start += evicted.len() as u64;
            }
        }
    }

    /// Returns the bytes from `offset` to the end of the chunk holding it.
    ///
    /// The result may stop short of `end()`; callers re-query for the rest.
    pub(crate) fn read(&self, offset: u64) -> Result<Bytes> {
        if offset < self.start || offset >= self.end {
            return Err(self.out_of_range(offset));
        }

        let mut chunk_start = self.start;
        for chunk in &self.chunks {
            let chunk_end = chunk_start + chunk.len() as u64;
            if offset < chunk_end {
                return Ok(chunk.slice((offset - chunk_start) as usize..));
            }
            chunk_start = chunk_end;
        }

        Err(self.out_of_range(offset))
    }

    fn out_of_range(&self, offset: u64) -> Error {
        Error::OutOfRange {
            offset,
            start: self.start,
            end: self.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(budget: usize, chunks: &[&'static [u8]]) -> SlidingWindow {
        let mut window = SlidingWindow::new(budget);
        for chunk in chunks {
            window.append(Bytes::from_static(chunk));
        }
        window
    }

    #[test]
    fn test_empty_window() {
        let window = SlidingWindow::new(16);
        assert_eq!(window.start(), 0);
        assert_eq!(window.end(), 0);
        assert_eq!(window.len(), 0);
        assert!(matches!(window.read(0), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_append_within_budget_keeps_everything() {
        let window = window_with(16, &[b"abc", b"def"]);
        assert_eq!(window.start(), 0);
        assert_eq!(window.end(), 6);
        assert_eq!(window.read(0).unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(window.read(3).unwrap(), Bytes::from_static(b"def"));
    }

    #[test]
    fn test_read_returns_rest_of_containing_chunk_only() {
        let window = window_with(16, &[b"abcd", b"efgh"]);
        assert_eq!(window.read(1).unwrap(), Bytes::from_static(b"bcd"));
        assert_eq!(window.read(6).unwrap(), Bytes::from_static(b"gh"));
    }

    #[test]
    fn test_evicts_oldest_chunks_over_budget() {
        let window = window_with(5, &[b"abc", b"def", b"gh"]);
        assert_eq!(window.start(), 3);
        assert_eq!(window.end(), 8);
        assert_eq!(window.len(), 5);
        assert!(matches!(
            window.read(2),
            Err(Error::OutOfRange {
                offset: 2,
                start: 3,
                end: 8
            })
        ));
        assert_eq!(window.read(3).unwrap(), Bytes::from_static(b"def"));
    }

    #[test]
    fn test_oversized_chunk_is_kept_alone() {
        let window = window_with(4, &[b"ab", b"0123456789"]);
        assert_eq!(window.start(), 2);
        assert_eq!(window.end(), 12);
        assert_eq!(window.len(), 10);
        assert_eq!(window.read(11).unwrap(), Bytes::from_static(b"9"));
    }

    #[test]
    fn test_read_at_end_is_out_of_range() {
        let window = window_with(16, &[b"abc"]);
        assert!(matches!(window.read(3), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_empty_chunks_do_not_break_lookup() {
        let window = window_with(16, &[b"ab", b"", b"cd"]);
        assert_eq!(window.end(), 4);
        assert_eq!(window.read(2).unwrap(), Bytes::from_static(b"cd"));
    }
}
