//! One group's view over its agent batch and message batch.

use std::sync::Arc;

use colony_batch::{load_shallow, Batch, ChangeRecord, Column};
use colony_core::{StateError, AGENT_ID_FIELD, MESSAGES_FIELD};
use tracing::debug;

use crate::agent::AgentState;
use crate::message::{load_messages, stringify_payloads};
use crate::schema::GroupSchema;

/// Flushed columns of both batches of a group.
#[derive(Clone, Debug, Default)]
pub struct GroupChanges {
    /// Changed agent-batch columns.
    pub agent: Vec<ChangeRecord>,
    /// Changed message-batch columns.
    pub msg: Vec<ChangeRecord>,
}

/// Mutable view of one group for the duration of a step.
///
/// Borrows an agent batch and a message batch that have already been
/// synced for this step.
#[derive(Debug)]
pub struct GroupState<'a> {
    pub(crate) schema: Arc<GroupSchema>,
    pub(crate) agent_batch: &'a mut Batch,
    pub(crate) msg_batch: &'a mut Batch,
}

impl<'a> GroupState<'a> {
    /// Bind the two batches.
    ///
    /// Materializes the identity column and the outboxes unless an
    /// earlier view of the same step already did.
    pub fn new(
        schema: Arc<GroupSchema>,
        agent_batch: &'a mut Batch,
        msg_batch: &'a mut Batch,
    ) -> Result<Self, StateError> {
        if agent_batch.column(AGENT_ID_FIELD).is_none() {
            agent_batch.load_col(AGENT_ID_FIELD, Some(load_shallow))?;
        }
        if msg_batch.column(MESSAGES_FIELD).is_none() {
            msg_batch.load_col(MESSAGES_FIELD, Some(load_messages))?;
        }
        Ok(Self {
            schema,
            agent_batch,
            msg_batch,
        })
    }

    /// Number of agents in the group.
    pub fn n_agents(&self) -> usize {
        self.agent_batch.column(AGENT_ID_FIELD).map_or(0, Column::len)
    }

    /// View of the agent at `index`.
    ///
    /// Out-of-range indices are reported by the first access, not here.
    pub fn get_agent(&mut self, index: usize) -> AgentState<'_, 'a> {
        AgentState::new(self, index)
    }

    /// Materialize `field`, replacing any cached column.
    pub fn load(&mut self, field: &str) -> Result<&mut Column, StateError> {
        let loader = self.schema.loader(field);
        Ok(self.agent_batch.load_col(field, loader)?)
    }

    /// Materialize every agent field not yet loaded.
    pub fn load_missing(&mut self) -> Result<(), StateError> {
        let schema = Arc::clone(&self.schema);
        self.agent_batch
            .load_missing_cols(schema.agent(), schema.loaders())?;
        Ok(())
    }

    /// Encode every materialized column of both batches.
    ///
    /// The identity column is never flushed. Outbox payloads are
    /// stringified on the way out; the cached outboxes keep their parsed
    /// form, so flushing twice gives the same result.
    pub fn flush_changes(&self) -> Result<GroupChanges, StateError> {
        let agent = self
            .agent_batch
            .flush_changes(self.schema.agent(), &[AGENT_ID_FIELD])?;
        let msg = self
            .msg_batch
            .flush_changes_with(self.schema.msg(), &[], |name, outbox| {
                (name == MESSAGES_FIELD).then(|| stringify_payloads(outbox))
            })?;
        debug!(
            agent_fields = agent.len(),
            msg_fields = msg.len(),
            "flushed group changes"
        );
        Ok(GroupChanges { agent, msg })
    }

    /// The group schema.
    pub fn schema(&self) -> &Arc<GroupSchema> {
        &self.schema
    }

    /// The bound agent batch.
    pub fn agent_batch(&self) -> &Batch {
        &*self.agent_batch
    }

    /// The bound message batch.
    pub fn msg_batch(&self) -> &Batch {
        &*self.msg_batch
    }
}
