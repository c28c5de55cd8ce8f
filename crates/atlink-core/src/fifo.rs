//! Fixed-capacity receive ring buffer.
//!
//! Each socket stages inbound payload bytes in a [`ReceiveFifo`] until the
//! application reads them. Capacity is fixed at construction; on overflow
//! the excess is dropped and the previously buffered bytes are preserved
//! (the caller logs the drop, see `SocketRegistry::push_bytes`).

/// A fixed-capacity byte ring buffer.
#[derive(Debug)]
pub struct ReceiveFifo {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl ReceiveFifo {
    /// Create an empty FIFO with the given capacity.
    pub fn new(capacity: usize) -> Self {
        ReceiveFifo {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remaining free space.
    pub fn free(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Append one byte. Returns `false` if the FIFO is full.
    pub fn put(&mut self, byte: u8) -> bool {
        if self.len == self.buf.len() {
            return false;
        }
        let tail = (self.head + self.len) % self.buf.len();
        self.buf[tail] = byte;
        self.len += 1;
        true
    }

    /// Append as many bytes of `data` as fit.
    ///
    /// Returns the number of bytes accepted; anything beyond that is the
    /// caller's to drop or retry. Previously buffered bytes are never
    /// disturbed.
    pub fn put_slice(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        for &b in &data[..n] {
            self.put(b);
        }
        n
    }

    /// Pop up to `out.len()` bytes into `out`, in arrival order.
    ///
    /// Returns the number of bytes copied.
    pub fn get(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        for slot in out.iter_mut().take(n) {
            *slot = self.buf[self.head];
            self.head = (self.head + 1) % self.buf.len();
            self.len -= 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trip() {
        let mut fifo = ReceiveFifo::new(8);
        assert_eq!(fifo.put_slice(b"hello"), 5);
        assert_eq!(fifo.len(), 5);

        let mut out = [0u8; 8];
        let n = fifo.get(&mut out);
        assert_eq!(n, 5);
        assert_eq!(&out[..n], b"hello");
        assert!(fifo.is_empty());
    }

    #[test]
    fn wraps_around_capacity() {
        let mut fifo = ReceiveFifo::new(4);
        fifo.put_slice(b"abc");
        let mut out = [0u8; 2];
        fifo.get(&mut out);
        assert_eq!(&out, b"ab");

        // Head is now at index 2; these writes wrap past the end.
        assert_eq!(fifo.put_slice(b"def"), 3);
        let mut out = [0u8; 4];
        let n = fifo.get(&mut out);
        assert_eq!(&out[..n], b"cdef");
    }

    #[test]
    fn overflow_drops_excess_preserving_queued() {
        let mut fifo = ReceiveFifo::new(4);
        assert_eq!(fifo.put_slice(b"abcd"), 4);
        // Full: further puts are rejected, queued bytes untouched.
        assert_eq!(fifo.put_slice(b"XY"), 0);
        assert!(!fifo.put(b'Z'));

        let mut out = [0u8; 4];
        let n = fifo.get(&mut out);
        assert_eq!(&out[..n], b"abcd");
    }

    #[test]
    fn partial_overflow_accepts_prefix() {
        let mut fifo = ReceiveFifo::new(4);
        fifo.put_slice(b"ab");
        assert_eq!(fifo.put_slice(b"cdEF"), 2);

        let mut out = [0u8; 4];
        let n = fifo.get(&mut out);
        assert_eq!(&out[..n], b"abcd");
    }

    #[test]
    fn clear_resets_state() {
        let mut fifo = ReceiveFifo::new(4);
        fifo.put_slice(b"ab");
        fifo.clear();
        assert!(fifo.is_empty());
        assert_eq!(fifo.free(), 4);

        fifo.put_slice(b"xyz");
        let mut out = [0u8; 3];
        fifo.get(&mut out);
        assert_eq!(&out, b"xyz");
    }

    #[test]
    fn get_with_small_buffer_drains_incrementally() {
        let mut fifo = ReceiveFifo::new(8);
        fifo.put_slice(b"abcdef");

        let mut out = [0u8; 2];
        assert_eq!(fifo.get(&mut out), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(fifo.get(&mut out), 2);
        assert_eq!(&out, b"cd");
        assert_eq!(fifo.len(), 2);
    }
}
