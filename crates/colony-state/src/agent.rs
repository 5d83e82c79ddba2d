//! Row view of a single agent inside a group.

use std::borrow::Cow;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::Array;
use arrow_schema::DataType;
use serde_json::{Map, Value};

use colony_batch::cell::uuid_to_str;
use colony_batch::Column;
use colony_core::{BatchError, StateError, AGENT_ID_FIELD, MESSAGES_FIELD};

use crate::accessor::Accessor;
use crate::group::GroupState;
use crate::message::{Message, Recipients};

/// Field-level access to one agent's row.
///
/// Without dynamic access only columns already materialized for the
/// group can be touched; with it, a missing column is loaded on first use.
#[derive(Debug)]
pub struct AgentState<'g, 'a> {
    group: &'g mut GroupState<'a>,
    index: usize,
    dynamic_access: bool,
    behavior_index: Option<usize>,
}

impl<'g, 'a> AgentState<'g, 'a> {
    pub(crate) fn new(group: &'g mut GroupState<'a>, index: usize) -> Self {
        Self {
            group,
            index,
            dynamic_access: false,
            behavior_index: None,
        }
    }

    /// Row this view points at.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Point this view at another row, keeping its settings.
    pub fn rebind(&mut self, index: usize) {
        self.index = index;
    }

    /// Whether missing columns are loaded on first access.
    pub fn dynamic_access(&self) -> bool {
        self.dynamic_access
    }

    /// Enable or disable loading missing columns on first access.
    pub fn set_dynamic_access(&mut self, enabled: bool) {
        self.dynamic_access = enabled;
    }

    /// Index of the behavior currently running on this agent.
    pub fn behavior_index(&self) -> Option<usize> {
        self.behavior_index
    }

    /// Record the behavior about to run on this agent.
    pub fn set_behavior_index(&mut self, index: usize) {
        self.behavior_index = Some(index);
    }

    /// Read `field`, borrowing the stored value where possible.
    pub fn read(&mut self, field: &str) -> Result<Cow<'_, Value>, StateError> {
        let index = self.index;
        if field == MESSAGES_FIELD {
            return Ok(self.outboxes()?.cell(index)?);
        }
        let schema = Arc::clone(&self.group.schema);
        match schema.accessors().get(field) {
            None => Err(missing(field)),
            Some(Accessor::AgentId) => self.agent_id().map(|id| Cow::Owned(Value::String(id))),
            Some(Accessor::Plain) => Ok(self.column(field)?.cell(index)?),
            Some(Accessor::Custom(getter)) => {
                let stored = self.column(field)?.cell(index)?;
                Ok(Cow::Owned(getter.apply(&stored)))
            }
        }
    }

    /// Replace the value of `field`.
    ///
    /// The identity column is read-only. Writing `messages` replaces the
    /// whole outbox and must be a list of messages.
    pub fn write(&mut self, field: &str, value: Value) -> Result<(), StateError> {
        let index = self.index;
        if field == MESSAGES_FIELD {
            serde_json::from_value::<Vec<Message>>(value.clone()).map_err(|e| {
                StateError::InvalidMessage {
                    reason: e.to_string(),
                }
            })?;
            self.outboxes_mut()?.set(index, value)?;
            return Ok(());
        }
        let schema = Arc::clone(&self.group.schema);
        match schema.accessors().get(field) {
            None => Err(missing(field)),
            Some(Accessor::AgentId) => Err(StateError::ReadOnlyField {
                field: field.to_string(),
            }),
            Some(_) => {
                self.column(field)?.set(index, value)?;
                Ok(())
            }
        }
    }

    /// Owned copy of `field`.
    pub fn get(&mut self, field: &str) -> Result<Value, StateError> {
        self.read(field).map(Cow::into_owned)
    }

    /// Write a copy of `value` to `field`.
    pub fn set(&mut self, field: &str, value: &Value) -> Result<(), StateError> {
        self.write(field, value.clone())
    }

    /// Read-modify-write of `field`.
    pub fn modify<F>(&mut self, field: &str, f: F) -> Result<(), StateError>
    where
        F: FnOnce(Value) -> Value,
    {
        let current = self.get(field)?;
        self.write(field, f(current))
    }

    /// Append a message to this agent's outbox.
    pub fn add_message(
        &mut self,
        to: impl Into<Recipients>,
        kind: &str,
        data: &Value,
    ) -> Result<(), StateError> {
        let message = Message {
            to: to.into().into_inner(),
            kind: kind.to_string(),
            data: data.clone(),
        };
        let encoded = serde_json::to_value(&message).map_err(|e| StateError::InvalidMessage {
            reason: e.to_string(),
        })?;
        let index = self.index;
        let outbox = self.outboxes_mut()?.cell_mut(index)?;
        match outbox {
            Value::Array(messages) => messages.push(encoded),
            other => *other = Value::Array(vec![encoded]),
        }
        Ok(())
    }

    /// This agent's outbox as typed messages.
    pub fn messages(&mut self) -> Result<Vec<Message>, StateError> {
        let outbox = self.read(MESSAGES_FIELD)?.into_owned();
        if outbox.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(outbox).map_err(|e| StateError::InvalidMessage {
            reason: e.to_string(),
        })
    }

    /// Every field of the row plus the outbox, as one JSON object.
    ///
    /// Honors the same materialization rules as [`read`](Self::read).
    pub fn to_json(&mut self) -> Result<Value, StateError> {
        let schema = Arc::clone(&self.group.schema);
        let mut object = Map::new();
        for field in schema.accessors().fields() {
            object.insert(field.to_string(), self.get(field)?);
        }
        object.insert(MESSAGES_FIELD.to_string(), self.get(MESSAGES_FIELD)?);
        Ok(Value::Object(object))
    }

    /// The agent's id in string form.
    ///
    /// 16-byte ids render as hyphenated lowercase hex; string ids are
    /// returned as stored.
    pub fn agent_id(&self) -> Result<String, StateError> {
        let vector = self
            .group
            .agent_batch
            .vector(AGENT_ID_FIELD)
            .ok_or_else(|| missing(AGENT_ID_FIELD))?;
        let array = vector.array();
        if self.index >= array.len() {
            return Err(BatchError::IndexOutOfRange {
                field: AGENT_ID_FIELD.to_string(),
                index: self.index,
                len: array.len(),
            }
            .into());
        }
        match array.data_type() {
            DataType::FixedSizeBinary(_) => {
                Ok(uuid_to_str(array.as_fixed_size_binary().value(self.index)))
            }
            DataType::Utf8 => Ok(array.as_string::<i32>().value(self.index).to_string()),
            DataType::LargeUtf8 => Ok(array.as_string::<i64>().value(self.index).to_string()),
            other => Err(BatchError::Decode {
                reason: format!("unsupported {AGENT_ID_FIELD} type {other}"),
            }
            .into()),
        }
    }

    /// The materialized column for `field`, loading it under dynamic access.
    fn column(&mut self, field: &str) -> Result<&mut Column, StateError> {
        if self.group.agent_batch.column(field).is_none() {
            if !self.dynamic_access {
                return Err(missing(field));
            }
            self.group.load(field)?;
        }
        self.group
            .agent_batch
            .column_mut(field)
            .ok_or_else(|| missing(field))
    }

    fn outboxes(&self) -> Result<&Column, StateError> {
        self.group
            .msg_batch
            .column(MESSAGES_FIELD)
            .ok_or_else(|| missing(MESSAGES_FIELD))
    }

    fn outboxes_mut(&mut self) -> Result<&mut Column, StateError> {
        self.group
            .msg_batch
            .column_mut(MESSAGES_FIELD)
            .ok_or_else(|| missing(MESSAGES_FIELD))
    }
}

fn missing(field: &str) -> StateError {
    StateError::MissingField {
        field: field.to_string(),
    }
}
