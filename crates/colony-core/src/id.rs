//! Strongly-typed identifiers and version counters.

use std::fmt;

/// Identifies a batch within a worker's registry.
///
/// Batch ids are assigned by the host and are opaque to the worker; they
/// usually name the shared memory segment backing the batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub String);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for BatchId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Version of the shared memory segment backing a batch.
///
/// Bumped by the host whenever the segment is reallocated (for example
/// when a group grows past its capacity).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemVersion(pub u64);

impl fmt::Display for MemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MemVersion {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Version of the logical content of a batch.
///
/// Bumped by the host whenever the bytes inside the segment change. A
/// fresher [`MemVersion`] always implies a fresher `BatchVersion`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchVersion(pub u64);

impl fmt::Display for BatchVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BatchVersion {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_order_numerically() {
        assert!(MemVersion(1) < MemVersion(2));
        assert!(BatchVersion(9) < BatchVersion(10));
    }

    #[test]
    fn unseen_version_is_older_than_any_version() {
        let unseen: Option<BatchVersion> = None;
        assert!(unseen < Some(BatchVersion(0)));
    }

    #[test]
    fn batch_id_displays_raw_name() {
        assert_eq!(BatchId::from("group-3").to_string(), "group-3");
    }
}
