//! Versioned batches over shared memory and the per-worker batch registry.
//!
//! A [`Batch`] binds one shared segment and schema to a set of decoded
//! vectors plus a cache of materialized columns. Two counters drive
//! coherency with the host:
//!
//! - `mem_version` identifies the backing segment. A fresher value means
//!   the host reallocated the segment and the batch must rebind.
//! - `batch_version` identifies the logical content. A fresher value means
//!   the bytes changed and every vector must be re-decoded.
//!
//! Fresher memory without fresher content is a host protocol bug and is
//! reported as [`BatchError::InvariantViolation`].

use std::borrow::Cow;
use std::sync::Arc;

use arrow_schema::{Schema, SchemaRef};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use colony_core::{BatchError, BatchId, BatchVersion, MemVersion};

use crate::column::{load_full, load_shallow, Column, ColumnLoader, Loaders};
use crate::config::BatchConfig;
use crate::encode::encode_column;
use crate::ffi::{ChangeRecord, FfiArrayData};
use crate::segment::SharedSegment;
use crate::vector::{load_from_segment, Vector, Vectors};

/// The host's latest description of a batch, supplied once per step.
#[derive(Clone, Debug)]
pub struct BatchDescriptor {
    /// Registry key.
    pub id: BatchId,
    /// Version of the backing segment.
    pub mem_version: MemVersion,
    /// Version of the batch content.
    pub batch_version: BatchVersion,
    /// The backing segment, valid for this step.
    pub segment: SharedSegment,
}

/// One versioned columnar snapshot bound to a shared segment.
#[derive(Debug)]
pub struct Batch {
    id: BatchId,
    config: Arc<BatchConfig>,
    mem_version: Option<MemVersion>,
    batch_version: Option<BatchVersion>,
    segment: Option<SharedSegment>,
    vectors: Vectors,
    columns: IndexMap<String, Column>,
    reload_count: u64,
}

impl Batch {
    /// Create an empty, unbound batch. The first [`sync`](Self::sync)
    /// always binds and loads.
    pub fn new(id: BatchId, config: Arc<BatchConfig>) -> Self {
        Self {
            id,
            config,
            mem_version: None,
            batch_version: None,
            segment: None,
            vectors: Vectors::new(),
            columns: IndexMap::new(),
            reload_count: 0,
        }
    }

    /// Bring the batch up to date with `latest`.
    ///
    /// Rebinds the segment when memory is fresher and re-decodes the vectors
    /// (dropping every cached column) when content is fresher. A no-op when
    /// neither is. On failure the batch is left untouched.
    pub fn sync(&mut self, latest: &BatchDescriptor, schema: &SchemaRef) -> Result<(), BatchError> {
        let should_reload = self.batch_version < Some(latest.batch_version);
        let rebind = self.mem_version < Some(latest.mem_version);
        if rebind && !should_reload {
            return Err(BatchError::InvariantViolation {
                batch: self.id.clone(),
                mem_version: latest.mem_version,
                batch_version: latest.batch_version,
            });
        }
        if !should_reload {
            return Ok(());
        }

        let segment = if rebind {
            &latest.segment
        } else {
            self.segment.as_ref().ok_or_else(|| BatchError::NoSegment {
                batch: self.id.clone(),
            })?
        };
        let vectors = load_from_segment(segment, schema, &self.config.any_type_key)?;

        if rebind {
            debug!(
                batch = %self.id,
                mem_version = %latest.mem_version,
                len = latest.segment.len(),
                "rebinding shared segment"
            );
            self.segment = Some(latest.segment.clone());
            self.mem_version = Some(latest.mem_version);
        }
        debug!(
            batch = %self.id,
            batch_version = %latest.batch_version,
            dropped_columns = self.columns.len(),
            "reloading batch vectors"
        );
        self.vectors = vectors;
        self.columns.clear();
        self.batch_version = Some(latest.batch_version);
        self.reload_count += 1;
        Ok(())
    }

    /// Materialize the column for `name` and cache it.
    ///
    /// An explicit `loader` wins; otherwise hidden/private fields are loaded
    /// shallow and everything else fully. Replaces any cached column.
    pub fn load_col(
        &mut self,
        name: &str,
        loader: Option<ColumnLoader>,
    ) -> Result<&mut Column, BatchError> {
        let vector = self
            .vectors
            .get(name)
            .ok_or_else(|| BatchError::MissingField {
                field: name.to_string(),
            })?;
        let column = match loader {
            Some(loader) => loader(vector)?,
            None if self.config.is_hidden(name) => load_shallow(vector)?,
            None => load_full(vector)?,
        };
        trace!(batch = %self.id, field = name, kind = ?column.kind(), "materialized column");
        match self.columns.entry(name.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(column);
                Ok(slot.into_mut())
            }
            Entry::Vacant(slot) => Ok(slot.insert(column)),
        }
    }

    /// Materialize every schema field that has no cached column yet.
    pub fn load_missing_cols(
        &mut self,
        schema: &Schema,
        loaders: &Loaders,
    ) -> Result<(), BatchError> {
        for field in schema.fields() {
            let name = field.name();
            if !self.columns.contains_key(name) {
                self.load_col(name, loaders.get(name).copied())?;
            }
        }
        Ok(())
    }

    /// Encode every materialized column not listed in `skip`.
    ///
    /// Any-type cells are JSON-stringified first. Cached columns are left
    /// as they are, so repeated flushes produce identical output.
    pub fn flush_changes(
        &self,
        schema: &Schema,
        skip: &[&str],
    ) -> Result<Vec<ChangeRecord>, BatchError> {
        self.flush_changes_with(schema, skip, |_, _| None)
    }

    /// Like [`flush_changes`](Self::flush_changes), with a hook that may
    /// substitute a cell's value before encoding.
    pub fn flush_changes_with<F>(
        &self,
        schema: &Schema,
        skip: &[&str],
        prepare: F,
    ) -> Result<Vec<ChangeRecord>, BatchError>
    where
        F: Fn(&str, &Value) -> Option<Value>,
    {
        let mut changes = Vec::new();
        for (field_index, field) in schema.fields().iter().enumerate() {
            let name = field.name().as_str();
            if skip.contains(&name) {
                continue;
            }
            let Some(column) = self.columns.get(name) else {
                continue;
            };

            let data = match column.passthrough() {
                Some(array) => FfiArrayData::from_array(array.as_ref()),
                None => {
                    let is_any = self.vectors.get(name).is_some_and(Vector::is_any);
                    let cells: Vec<Cow<'_, Value>> = column
                        .values()?
                        .into_iter()
                        .map(|cell| {
                            let cell = match prepare(name, &*cell) {
                                Some(replacement) => Cow::Owned(replacement),
                                None => cell,
                            };
                            if is_any {
                                Cow::Owned(Value::String(cell.to_string()))
                            } else {
                                cell
                            }
                        })
                        .collect();
                    let refs: Vec<&Value> = cells.iter().map(|c| &**c).collect();
                    let array = encode_column(field, &refs)?;
                    FfiArrayData::from_array(array.as_ref())
                }
            };
            changes.push(ChangeRecord { field_index, data });
        }
        debug!(batch = %self.id, fields = changes.len(), "flushed batch changes");
        Ok(changes)
    }

    /// Registry key of this batch.
    pub fn id(&self) -> &BatchId {
        &self.id
    }

    /// Version of the bound segment, `None` before the first sync.
    pub fn mem_version(&self) -> Option<MemVersion> {
        self.mem_version
    }

    /// Version of the loaded content, `None` before the first sync.
    pub fn batch_version(&self) -> Option<BatchVersion> {
        self.batch_version
    }

    /// The bound segment.
    pub fn segment(&self) -> Option<&SharedSegment> {
        self.segment.as_ref()
    }

    /// Number of times the vectors have been re-decoded.
    pub fn reload_count(&self) -> u64 {
        self.reload_count
    }

    /// Decoded vectors in schema order.
    pub fn vectors(&self) -> &Vectors {
        &self.vectors
    }

    /// The vector for `name`.
    pub fn vector(&self, name: &str) -> Option<&Vector> {
        self.vectors.get(name)
    }

    /// The cached column for `name`, if materialized.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Mutable access to the cached column for `name`, if materialized.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name)
    }

    /// Names of the materialized columns, in materialization order.
    pub fn materialized(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// Registry of batches keyed by id, owned by one worker for a whole run.
#[derive(Debug, Default)]
pub struct Batches {
    config: Arc<BatchConfig>,
    batches: IndexMap<BatchId, Batch>,
}

impl Batches {
    /// Create an empty registry whose batches share `config`.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config: Arc::new(config),
            batches: IndexMap::new(),
        }
    }

    /// Look up a batch without syncing it.
    pub fn get(&self, id: &BatchId) -> Option<&Batch> {
        self.batches.get(id)
    }

    /// Mutable lookup without syncing.
    pub fn get_mut(&mut self, id: &BatchId) -> Option<&mut Batch> {
        self.batches.get_mut(id)
    }

    /// Sync the batch named by `latest`, creating it on first sight.
    pub fn sync(
        &mut self,
        latest: &BatchDescriptor,
        schema: &SchemaRef,
    ) -> Result<&mut Batch, BatchError> {
        let config = &self.config;
        let batch = self.batches.entry(latest.id.clone()).or_insert_with(|| {
            debug!(batch = %latest.id, "creating batch");
            Batch::new(latest.id.clone(), Arc::clone(config))
        });
        batch.sync(latest, schema)?;
        Ok(batch)
    }

    /// Drop a batch the host no longer schedules on this worker.
    pub fn remove(&mut self, id: &BatchId) -> Option<Batch> {
        self.batches.shift_remove(id)
    }

    /// Number of known batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether no batch has been synced yet.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// The configuration shared by every batch.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }
}
