//! An [`IoBuffer`] is the owned packet buffer passed between the framework, the link layer and
//! the transport. It keeps three cursors into one allocation:
//!
//! ```text
//! +----------+------------------+----------+
//! | headroom |       data       | tailroom |
//! +----------+------------------+----------+
//! 0          data               tail       end
//! ```
//!
//! Headers are prepended with [`IoBuffer::push`] and stripped with [`IoBuffer::pull`], received
//! bytes are claimed with [`IoBuffer::put`].
use std::fmt;

/// An owned, fixed-capacity packet buffer with head/data/tail cursors.
#[derive(Clone, PartialEq, Eq)]
pub struct IoBuffer {
    buf: Box<[u8]>,
    data: usize,
    tail: usize,
}

impl IoBuffer {
    /// Allocate a zeroed buffer of `len` bytes with an empty data area at its start.
    pub fn new(len: usize) -> Self {
        IoBuffer {
            buf: vec![0; len].into_boxed_slice(),
            data: 0,
            tail: 0,
        }
    }

    /// Allocate a buffer holding `payload` behind `headroom` bytes of free space.
    pub fn with_headroom(headroom: usize, payload: &[u8]) -> Self {
        let mut iobuf = IoBuffer::new(headroom + payload.len());
        iobuf.reserve(headroom);
        iobuf.put(payload.len()).copy_from_slice(payload);
        iobuf
    }

    /// Total capacity of the underlying allocation.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Length of the data area.
    pub fn len(&self) -> usize {
        self.tail - self.data
    }

    pub fn is_empty(&self) -> bool {
        self.tail == self.data
    }

    /// Free space in front of the data area.
    pub fn headroom(&self) -> usize {
        self.data
    }

    /// Free space behind the data area.
    pub fn tailroom(&self) -> usize {
        self.buf.len() - self.tail
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[self.data..self.tail]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.data..self.tail]
    }

    /// The free space behind the data area, for a transport writing received bytes in place.
    pub fn tailroom_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.tail..]
    }

    /// Move an empty data area forward, turning `len` bytes of tailroom into headroom.
    ///
    /// # Panics
    ///
    /// Panics if the data area is not empty or if `len` exceeds the tailroom.
    pub fn reserve(&mut self, len: usize) {
        assert!(self.is_empty(), "reserve on a non-empty I/O buffer");
        assert!(len <= self.tailroom(), "reserve of {len} bytes exceeds tailroom {}", self.tailroom());
        self.data += len;
        self.tail += len;
    }

    /// Prepend `len` bytes to the data area and return them.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the headroom.
    pub fn push(&mut self, len: usize) -> &mut [u8] {
        assert!(len <= self.headroom(), "push of {len} bytes exceeds headroom {}", self.headroom());
        self.data -= len;
        &mut self.buf[self.data..self.data + len]
    }

    /// Strip `len` bytes from the front of the data area and return them.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the data length.
    pub fn pull(&mut self, len: usize) -> &[u8] {
        assert!(len <= self.len(), "pull of {len} bytes exceeds length {}", self.len());
        self.data += len;
        &self.buf[self.data - len..self.data]
    }

    /// Append `len` bytes of tailroom to the data area and return them.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the tailroom.
    pub fn put(&mut self, len: usize) -> &mut [u8] {
        assert!(len <= self.tailroom(), "put of {len} bytes exceeds tailroom {}", self.tailroom());
        self.tail += len;
        &mut self.buf[self.tail - len..self.tail]
    }

    /// Drop `len` bytes from the end of the data area.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the data length.
    pub fn unput(&mut self, len: usize) {
        assert!(len <= self.len(), "unput of {len} bytes exceeds length {}", self.len());
        self.tail -= len;
    }
}

impl fmt::Debug for IoBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBuffer")
            .field("capacity", &self.capacity())
            .field("headroom", &self.headroom())
            .field("len", &self.len())
            .finish()
    }
}
