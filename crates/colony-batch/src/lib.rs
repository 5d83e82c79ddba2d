//! Versioned columnar batches over shared memory.
//!
//! This crate is the storage half of a worker's agent-state layer. It
//! validates shared segments handed over by the host, decodes them into
//! typed vectors, materializes mutable columns on demand and encodes
//! touched columns back into the cross-boundary array format.
//!
//! # Data flow
//!
//! ```text
//! SharedSegment ─► Markers::parse ─► vector::load ─► Batch (cached vectors)
//!                                                      │
//!                      Batch::load_col (lazy, per field)┘
//!                                                      │
//!           Batch::flush_changes ─► encode_column ─► FfiArrayData ─► host
//! ```
//!
//! # Coherency
//!
//! A [`Batch`] is re-decoded only when the host presents a fresher batch
//! version, and rebinds its segment only together with such a reload.
//! Materialized columns live until the next reload.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod cell;
pub mod column;
pub mod config;
pub mod encode;
pub mod ffi;
pub mod markers;
pub mod segment;
pub mod vector;
pub mod writer;

pub use batch::{Batch, BatchDescriptor, Batches};
pub use column::{load_full, load_shallow, Column, ColumnKind, ColumnLoader, Loaders};
pub use config::BatchConfig;
pub use encode::encode_column;
pub use ffi::{ChangeRecord, FfiArrayData};
pub use markers::Markers;
pub use segment::SharedSegment;
pub use vector::{Vector, Vectors};
pub use writer::SegmentWriter;
