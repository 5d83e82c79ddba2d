//! Core types for the Colony agent-state synchronization layer.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers and version counters exchanged with the host process
//! and the error taxonomy shared by the batch and state crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;

pub use error::{BatchError, EncodingError, FormatError, Region, StateError};
pub use id::{BatchId, BatchVersion, MemVersion};

/// Name of the identity column present in every agent batch.
pub const AGENT_ID_FIELD: &str = "agent_id";

/// Name of the per-agent outbox column in every message batch.
pub const MESSAGES_FIELD: &str = "messages";
