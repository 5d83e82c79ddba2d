//! Error types for the Colony agent-state layer.
//!
//! Organized by subsystem: shared-memory layout ([`FormatError`]),
//! batch synchronization and materialization ([`BatchError`]), flush
//! encoding ([`EncodingError`]) and the behavior-facing row API
//! ([`StateError`]). None of these are retried locally; every failure
//! propagates to the step's caller.

use std::error::Error;
use std::fmt;

use arrow_schema::DataType;
use serde_json::Value;

use crate::id::{BatchId, BatchVersion, MemVersion};

/// One of the four marker-delimited regions of a shared segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    /// Serialized schema.
    Schema,
    /// Host-defined header bytes.
    Header,
    /// Columnar message metadata.
    Meta,
    /// Columnar message body.
    Data,
}

impl Region {
    /// All regions in segment order.
    pub const ALL: [Region; 4] = [Region::Schema, Region::Header, Region::Meta, Region::Data];
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => f.write_str("schema marker"),
            Self::Header => f.write_str("header marker"),
            Self::Meta => f.write_str("meta marker"),
            Self::Data => f.write_str("data marker"),
        }
    }
}

/// Malformed shared segment layout. Fatal for the step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// The segment is too short to hold the marker header.
    Truncated {
        /// Length of the segment in bytes.
        len: usize,
        /// Minimum length required.
        required: usize,
    },
    /// A marker value (or its end offset) does not fit the address space.
    Overflow {
        /// Region whose marker overflowed.
        region: Region,
    },
    /// A region extends past the start of the next region (or, for the
    /// data region, past the end of the segment).
    Overlap {
        /// First region found violating the ordering.
        region: Region,
        /// End offset of the violating region.
        end: u64,
        /// Offset the region must not exceed.
        limit: u64,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { len, required } => {
                write!(f, "segment truncated: {len} bytes, markers need {required}")
            }
            Self::Overflow { region } => write!(f, "{region} overflows the address space"),
            Self::Overlap { region, end, limit } => {
                write!(f, "{region} ends at {end}, past limit {limit}")
            }
        }
    }
}

impl Error for FormatError {}

/// A cell that cannot be represented in its field's declared array type.
///
/// Carries enough context to point a behavior author at the offending
/// agent and value.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodingError {
    /// Name of the field being flushed.
    pub field: String,
    /// Position of the offending agent within the group.
    pub agent_index: usize,
    /// The value that failed to encode (innermost offending value for
    /// nested types).
    pub value: Value,
    /// The array type the value was expected to fit.
    pub data_type: DataType,
    /// Human-readable description of the mismatch.
    pub reason: String,
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flushing field '{}' failed at agent {}: value {} does not fit {}: {}",
            self.field, self.agent_index, self.value, self.data_type, self.reason
        )
    }
}

impl Error for EncodingError {}

/// Errors from batch synchronization, decoding and column materialization.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchError {
    /// The shared segment's marker header is malformed.
    Format(FormatError),
    /// The columnar wire message could not be decoded.
    Decode {
        /// Description of the decode failure.
        reason: String,
    },
    /// The host presented fresher memory without a fresher batch version.
    ///
    /// Indicates a host protocol bug; never recovered locally.
    InvariantViolation {
        /// Batch that received the descriptor.
        batch: BatchId,
        /// Memory version carried by the descriptor.
        mem_version: MemVersion,
        /// Batch version carried by the descriptor.
        batch_version: BatchVersion,
    },
    /// A reload was requested before any segment was bound.
    NoSegment {
        /// Batch that has no segment.
        batch: BatchId,
    },
    /// No vector exists for the requested field.
    MissingField {
        /// The requested field name.
        field: String,
    },
    /// An agent index beyond the column length.
    IndexOutOfRange {
        /// Field being accessed.
        field: String,
        /// Requested index.
        index: usize,
        /// Column length.
        len: usize,
    },
    /// A materialized cell could not be encoded during flush.
    Encoding(EncodingError),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "format error: {e}"),
            Self::Decode { reason } => write!(f, "decode error: {reason}"),
            Self::InvariantViolation {
                batch,
                mem_version,
                batch_version,
            } => write!(
                f,
                "batch '{batch}': new memory (version {mem_version}) without new batch version \
                 (version {batch_version})"
            ),
            Self::NoSegment { batch } => write!(f, "batch '{batch}' has no bound segment"),
            Self::MissingField { field } => write!(f, "missing vector for field '{field}'"),
            Self::IndexOutOfRange { field, index, len } => {
                write!(f, "index {index} out of range for field '{field}' of length {len}")
            }
            Self::Encoding(e) => write!(f, "{e}"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(e) => Some(e),
            Self::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FormatError> for BatchError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<EncodingError> for BatchError {
    fn from(e: EncodingError) -> Self {
        Self::Encoding(e)
    }
}

/// Errors surfaced to behavior code through the row API.
#[derive(Clone, Debug, PartialEq)]
pub enum StateError {
    /// The field is not materialized for this behavior and dynamic access
    /// is disabled, or the field does not exist at all.
    MissingField {
        /// The requested field name.
        field: String,
    },
    /// Attempted write to a read-only field.
    ReadOnlyField {
        /// The field that was written.
        field: String,
    },
    /// A custom getter was registered for `agent_id`.
    AgentIdGetter,
    /// A message could not be built or read back.
    InvalidMessage {
        /// Description of the problem.
        reason: String,
    },
    /// A batch-level failure while serving the access.
    Batch(BatchError),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => {
                write!(f, "missing field (behavior keys?): {field}")
            }
            Self::ReadOnlyField { field } => write!(f, "`{field}` is read-only"),
            Self::AgentIdGetter => f.write_str("`agent_id` isn't allowed to have a custom getter"),
            Self::InvalidMessage { reason } => write!(f, "invalid message: {reason}"),
            Self::Batch(e) => write!(f, "{e}"),
        }
    }
}

impl Error for StateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Batch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BatchError> for StateError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::MissingField { field } => Self::MissingField { field },
            other => Self::Batch(other),
        }
    }
}
