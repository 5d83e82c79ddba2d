//! Per-group schema bundle: agent and message layouts, accessors, loaders.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::SchemaRef;

use colony_batch::{ColumnLoader, Loaders};
use colony_core::{StateError, AGENT_ID_FIELD};

use crate::accessor::{AccessorTable, Getter};
use crate::message::message_batch_schema;

/// Everything a group needs to interpret its two batches.
///
/// Immutable once built; share it with `Arc` across steps.
#[derive(Debug)]
pub struct GroupSchema {
    agent: SchemaRef,
    msg: SchemaRef,
    accessors: AccessorTable,
    loaders: Loaders,
}

impl GroupSchema {
    /// A schema with plain accessors and default loaders.
    pub fn new(agent: SchemaRef) -> Result<Arc<Self>, StateError> {
        Self::builder(agent).build()
    }

    /// Start building a schema for `agent` batches.
    pub fn builder(agent: SchemaRef) -> GroupSchemaBuilder {
        GroupSchemaBuilder {
            agent,
            msg: message_batch_schema(),
            getters: HashMap::new(),
            loaders: Loaders::new(),
        }
    }

    /// Layout of the agent batch.
    pub fn agent(&self) -> &SchemaRef {
        &self.agent
    }

    /// Layout of the message batch.
    pub fn msg(&self) -> &SchemaRef {
        &self.msg
    }

    /// Field accessors for the agent batch.
    pub fn accessors(&self) -> &AccessorTable {
        &self.accessors
    }

    /// Explicit column loaders by field.
    pub fn loaders(&self) -> &Loaders {
        &self.loaders
    }

    /// The explicit loader for `field`, if one was registered.
    pub fn loader(&self, field: &str) -> Option<ColumnLoader> {
        self.loaders.get(field).copied()
    }
}

/// Builder for [`GroupSchema`].
pub struct GroupSchemaBuilder {
    agent: SchemaRef,
    msg: SchemaRef,
    getters: HashMap<String, Getter>,
    loaders: Loaders,
}

impl GroupSchemaBuilder {
    /// Use a custom message batch layout.
    pub fn msg_schema(mut self, msg: SchemaRef) -> Self {
        self.msg = msg;
        self
    }

    /// Register a read transform for `field`.
    pub fn getter(mut self, field: impl Into<String>, getter: Getter) -> Self {
        self.getters.insert(field.into(), getter);
        self
    }

    /// Register an explicit column loader for `field`.
    pub fn loader(mut self, field: impl Into<String>, loader: ColumnLoader) -> Self {
        self.loaders.insert(field.into(), loader);
        self
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> Result<Arc<GroupSchema>, StateError> {
        if self.agent.field_with_name(AGENT_ID_FIELD).is_err() {
            return Err(StateError::MissingField {
                field: AGENT_ID_FIELD.to_string(),
            });
        }
        let accessors = AccessorTable::build(&self.agent, self.getters)?;
        Ok(Arc::new(GroupSchema {
            agent: self.agent,
            msg: self.msg,
            accessors,
            loaders: self.loaders,
        }))
    }
}
