//! Shared memory segments handed over by the host.
//!
//! A [`SharedSegment`] is a cheap, reference-counted handle to a fixed-length
//! byte buffer allocated outside the worker. Slicing a segment never copies:
//! decoded vectors point straight into the host's bytes.

use std::fmt;

use arrow_buffer::Buffer;

use colony_core::FormatError;

use crate::markers::Markers;

/// Borrowed view of one externally allocated shared memory segment.
///
/// Cloning is O(1). A batch holds on to its segment only until the next
/// descriptor rebinds it.
#[derive(Clone)]
pub struct SharedSegment {
    buffer: Buffer,
}

impl SharedSegment {
    /// Wrap an existing arrow buffer (for example one backed by a mapping
    /// owned by the host).
    pub fn from_buffer(buffer: Buffer) -> Self {
        Self { buffer }
    }

    /// Take ownership of a byte vector.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            buffer: Buffer::from_vec(bytes),
        }
    }

    /// Length of the segment in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the segment holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The raw bytes of the segment.
    pub fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Parse and validate the marker header.
    pub fn markers(&self) -> Result<Markers, FormatError> {
        Markers::parse(self.as_slice())
    }

    /// Zero-copy slice of `len` bytes starting at `offset`.
    ///
    /// Callers pass ranges validated by [`Markers::parse`].
    pub fn slice(&self, offset: usize, len: usize) -> Buffer {
        self.buffer.slice_with_length(offset, len)
    }
}

impl fmt::Debug for SharedSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSegment")
            .field("len", &self.len())
            .field("ptr", &self.buffer.as_ptr())
            .finish()
    }
}

impl From<Vec<u8>> for SharedSegment {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}
