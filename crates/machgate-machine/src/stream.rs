//! Response stream
//!
//! Bounded raw-byte stream fed by the transport's arrival callback and
//! drained by callers polling for available bytes. No message framing is
//! imposed; callers interpret the bytes.
//!
//! Overflow policy: **evict-oldest**. When an incoming chunk does not fit,
//! the oldest buffered bytes are discarded until it does; a chunk larger
//! than the whole capacity keeps only its trailing bytes. Delivery is
//! best-effort under pressure; the most recent arrivals win.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded byte stream with single-producer/single-consumer discipline.
/// Both sides take a short lock, so the producer (the arrival callback)
/// always returns promptly.
pub struct ResponseStream {
    bytes: Mutex<VecDeque<u8>>,
    capacity: usize,
}

impl ResponseStream {
    /// Create a stream holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a chunk, evicting the oldest bytes when space is short.
    /// Never blocks.
    pub fn push(&self, chunk: &[u8]) {
        // A chunk beyond the whole capacity can only ever deliver its tail.
        let chunk = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };

        let mut bytes = self.bytes.lock();
        let free = self.capacity - bytes.len();
        if chunk.len() > free {
            let evict = chunk.len() - free;
            bytes.drain(..evict);
            tracing::trace!(evicted = evict, "response stream full, oldest bytes dropped");
        }
        bytes.extend(chunk);
    }

    /// Remove and return up to `max` bytes from the front. Never blocks;
    /// an empty stream yields an empty vec.
    pub fn drain(&self, max: usize) -> Vec<u8> {
        let mut bytes = self.bytes.lock();
        let take = max.min(bytes.len());
        bytes.drain(..take).collect()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Whether the stream holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }

    /// The fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_then_drain_in_arrival_order() {
        let stream = ResponseStream::new(64);
        stream.push(b"ok\n");
        stream.push(b"X:10.0 Y:0.0\n");

        assert_eq!(stream.drain(64), b"ok\nX:10.0 Y:0.0\n");
        assert!(stream.is_empty());
    }

    #[test]
    fn test_drain_respects_max_and_never_blocks() {
        let stream = ResponseStream::new(64);
        stream.push(b"abcdef");

        assert_eq!(stream.drain(4), b"abcd");
        assert_eq!(stream.drain(4), b"ef");
        assert_eq!(stream.drain(4), b"");
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let stream = ResponseStream::new(8);
        stream.push(b"12345678");
        stream.push(b"AB");

        // "12" evicted to admit "AB".
        assert_eq!(stream.drain(16), b"345678AB");
    }

    #[test]
    fn test_oversized_chunk_keeps_trailing_bytes() {
        let stream = ResponseStream::new(4);
        stream.push(b"0123456789");

        assert_eq!(stream.drain(16), b"6789");
    }

    #[test]
    fn test_len_tracks_contents() {
        let stream = ResponseStream::new(8);
        assert_eq!(stream.capacity(), 8);
        assert_eq!(stream.len(), 0);
        stream.push(b"abc");
        assert_eq!(stream.len(), 3);
        stream.drain(1);
        assert_eq!(stream.len(), 2);
    }
}
