//! Capacity-bounded line buffer.
//!
//! Both the in-flight outgoing command and the accumulating incoming
//! response live in a [`LineBuffer`]: a byte buffer whose capacity is fixed
//! at construction and which fails closed on overflow. A buffer is "full"
//! at capacity − 1 (mirroring the C-string convention of the protocol's
//! reference devices); appends past that point are rejected and latched in
//! an overflow flag so the owning parser can surface a framing error rather
//! than silently truncate.

/// A mutable byte buffer with a hard capacity and checked appends.
#[derive(Debug)]
pub struct LineBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl LineBuffer {
    /// Create an empty buffer that can hold `capacity - 1` bytes.
    pub fn new(capacity: usize) -> Self {
        LineBuffer {
            bytes: Vec::with_capacity(capacity.min(4096)),
            capacity,
            overflowed: false,
        }
    }

    /// The configured capacity (one more than the usable byte count).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True once the usable capacity (capacity − 1) is reached.
    pub fn is_full(&self) -> bool {
        self.bytes.len() >= self.capacity.saturating_sub(1)
    }

    /// True if any append has ever been rejected since the last clear.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Remove all content and reset the overflow latch.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.overflowed = false;
    }

    /// Append one byte. Returns false (and latches the overflow flag)
    /// if the buffer is full; the byte is dropped.
    pub fn push(&mut self, b: u8) -> bool {
        if self.is_full() {
            self.overflowed = true;
            return false;
        }
        self.bytes.push(b);
        true
    }

    /// Append a byte slice, all or nothing. On overflow the buffer is left
    /// untouched and the overflow flag is latched.
    pub fn try_extend(&mut self, data: &[u8]) -> bool {
        if self.bytes.len() + data.len() > self.capacity.saturating_sub(1) {
            self.overflowed = true;
            return false;
        }
        self.bytes.extend_from_slice(data);
        true
    }

    /// Remove and return the most recent byte (backspace editing).
    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop()
    }

    /// The held bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The held bytes as text. Parsers only ever append printable ASCII
    /// plus CR/LF, so this is lossless in practice; any non-UTF-8 content
    /// reads as empty.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }

    /// The `n`-th byte from the end, 1-based: `last(1)` is the most recent.
    pub fn last(&self, n: usize) -> Option<u8> {
        if n == 0 || n > self.bytes.len() {
            return None;
        }
        Some(self.bytes[self.bytes.len() - n])
    }

    /// True if the content starts with `s`.
    pub fn starts_with(&self, s: &str) -> bool {
        self.bytes.starts_with(s.as_bytes())
    }

    /// True if the content ends with `s`.
    pub fn ends_with(&self, s: &str) -> bool {
        self.bytes.ends_with(s.as_bytes())
    }

    /// True if the content contains `s`.
    pub fn contains(&self, s: &str) -> bool {
        self.as_str().contains(s)
    }

    /// Discard everything before the first occurrence of `b`, returning the
    /// number of bytes dropped. If `b` is absent the whole buffer is
    /// discarded. Used to lock onto an unsolicited-line prefix amid noise.
    pub fn discard_to(&mut self, b: u8) -> usize {
        match self.bytes.iter().position(|&x| x == b) {
            Some(0) => 0,
            Some(i) => {
                self.bytes.drain(..i);
                i
            }
            None => {
                let dropped = self.bytes.len();
                self.bytes.clear();
                dropped
            }
        }
    }
}
