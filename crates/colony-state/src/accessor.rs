//! Per-field access strategies for agent state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow_schema::Schema;
use indexmap::IndexMap;
use serde_json::Value;

use colony_core::{StateError, AGENT_ID_FIELD};

/// A user-supplied transform applied to a field's stored value on read.
#[derive(Clone)]
pub struct Getter(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl Getter {
    /// Wrap a transform.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Apply the transform to `stored`.
    pub fn apply(&self, stored: &Value) -> Value {
        (self.0)(stored)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Getter(..)")
    }
}

/// How reads and writes of one field are served.
#[derive(Clone, Debug)]
pub enum Accessor {
    /// The identity column. Reads render the id as a string; writes fail.
    AgentId,
    /// Reads and writes go straight to the column.
    Plain,
    /// Reads pass the stored value through a getter; writes are plain.
    Custom(Getter),
}

/// Field accessors for one agent schema, in schema order.
///
/// Built once per group schema and shared by every agent view.
#[derive(Clone, Debug, Default)]
pub struct AccessorTable {
    entries: IndexMap<String, Accessor>,
}

impl AccessorTable {
    /// Build the table for `schema`, attaching `getters` to their fields.
    ///
    /// A getter for `agent_id` is rejected, as is one for a field the
    /// schema lacks.
    pub fn build(
        schema: &Schema,
        mut getters: HashMap<String, Getter>,
    ) -> Result<Self, StateError> {
        if getters.contains_key(AGENT_ID_FIELD) {
            return Err(StateError::AgentIdGetter);
        }
        let mut entries = IndexMap::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let name = field.name();
            let accessor = if name == AGENT_ID_FIELD {
                Accessor::AgentId
            } else {
                match getters.remove(name) {
                    Some(getter) => Accessor::Custom(getter),
                    None => Accessor::Plain,
                }
            };
            entries.insert(name.clone(), accessor);
        }
        if let Some(unknown) = getters.into_keys().next() {
            return Err(StateError::MissingField { field: unknown });
        }
        Ok(Self { entries })
    }

    /// Accessor for `field`, if the schema has it.
    pub fn get(&self, field: &str) -> Option<&Accessor> {
        self.entries.get(field)
    }

    /// Field names in schema order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
