//! Marker header parsing.
//!
//! Every shared segment starts with eight little-endian `u64` values that
//! delimit four regions in segment order:
//!
//! ```text
//! [ markers (64B) | schema | header | meta | data ]
//!   schema_offset, schema_size,
//!   header_offset, header_size,
//!   meta_offset,   meta_size,
//!   data_offset,   data_size
//! ```

use std::ops::Range;

use colony_core::{FormatError, Region};

/// Number of marker values at the start of a segment.
pub const MARKER_COUNT: usize = 8;

/// Size in bytes of the marker header.
pub const MARKERS_LEN: usize = MARKER_COUNT * 8;

/// Decoded offsets and sizes of the four segment regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Markers {
    /// Byte offset of the schema region.
    pub schema_offset: usize,
    /// Byte length of the schema region.
    pub schema_size: usize,
    /// Byte offset of the header region.
    pub header_offset: usize,
    /// Byte length of the header region.
    pub header_size: usize,
    /// Byte offset of the metadata region.
    pub meta_offset: usize,
    /// Byte length of the metadata region.
    pub meta_size: usize,
    /// Byte offset of the data region.
    pub data_offset: usize,
    /// Byte length of the data region.
    pub data_size: usize,
}

impl Markers {
    /// Parse and validate the marker header of `segment`.
    ///
    /// Regions are checked in segment order and the first violation is
    /// reported, naming its region. Pure function of the first 64 bytes
    /// and the segment length.
    pub fn parse(segment: &[u8]) -> Result<Self, FormatError> {
        if segment.len() < MARKERS_LEN {
            return Err(FormatError::Truncated {
                len: segment.len(),
                required: MARKERS_LEN,
            });
        }
        let mut raw = [0u64; MARKER_COUNT];
        for (i, chunk) in segment[..MARKERS_LEN].chunks_exact(8).enumerate() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            raw[i] = u64::from_le_bytes(bytes);
        }

        let field = |i: usize, region: Region| -> Result<usize, FormatError> {
            usize::try_from(raw[i]).map_err(|_| FormatError::Overflow { region })
        };
        let m = Self {
            schema_offset: field(0, Region::Schema)?,
            schema_size: field(1, Region::Schema)?,
            header_offset: field(2, Region::Header)?,
            header_size: field(3, Region::Header)?,
            meta_offset: field(4, Region::Meta)?,
            meta_size: field(5, Region::Meta)?,
            data_offset: field(6, Region::Data)?,
            data_size: field(7, Region::Data)?,
        };

        let limits = [m.header_offset, m.meta_offset, m.data_offset, segment.len()];
        for (region, limit) in Region::ALL.into_iter().zip(limits) {
            let end = m.end(region)?;
            if end > limit {
                return Err(FormatError::Overlap {
                    region,
                    end: end as u64,
                    limit: limit as u64,
                });
            }
        }
        Ok(m)
    }

    /// Byte range covered by `region`.
    pub fn range(&self, region: Region) -> Result<Range<usize>, FormatError> {
        let (offset, _) = self.region(region);
        Ok(offset..self.end(region)?)
    }

    /// Byte range of the columnar message: metadata through end of data.
    pub fn message_range(&self) -> Result<Range<usize>, FormatError> {
        Ok(self.meta_offset..self.end(Region::Data)?)
    }

    fn region(&self, region: Region) -> (usize, usize) {
        match region {
            Region::Schema => (self.schema_offset, self.schema_size),
            Region::Header => (self.header_offset, self.header_size),
            Region::Meta => (self.meta_offset, self.meta_size),
            Region::Data => (self.data_offset, self.data_size),
        }
    }

    fn end(&self, region: Region) -> Result<usize, FormatError> {
        let (offset, size) = self.region(region);
        offset
            .checked_add(size)
            .ok_or(FormatError::Overflow { region })
    }

    /// Encode the markers as the 64-byte little-endian header.
    pub fn to_bytes(&self) -> [u8; MARKERS_LEN] {
        let values = [
            self.schema_offset,
            self.schema_size,
            self.header_offset,
            self.header_size,
            self.meta_offset,
            self.meta_size,
            self.data_offset,
            self.data_size,
        ];
        let mut out = [0u8; MARKERS_LEN];
        for (chunk, v) in out.chunks_exact_mut(8).zip(values) {
            chunk.copy_from_slice(&(v as u64).to_le_bytes());
        }
        out
    }
}
