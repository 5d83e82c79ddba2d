//! Outbound messages and the message batch layout.
//!
//! Each agent owns one row of the message batch: its `from` id and a
//! `messages` list. Payloads travel as JSON strings and are parsed when
//! the column is loaded.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use colony_batch::cell::{decode_any, decode_array};
use colony_batch::{Column, Vector};
use colony_core::{BatchError, MESSAGES_FIELD};

/// Recipient list. Nearly every message has exactly one recipient.
pub type RecipientList = SmallVec<[String; 1]>;

/// One outbound message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Recipient ids or names.
    pub to: RecipientList,
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Arbitrary payload.
    #[serde(default)]
    pub data: Value,
}

/// Anything accepted as a message's `to`: one recipient or several.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Recipients(RecipientList);

impl Recipients {
    /// The recipient list.
    pub fn into_inner(self) -> RecipientList {
        self.0
    }
}

impl From<&str> for Recipients {
    fn from(to: &str) -> Self {
        Self(SmallVec::from_elem(to.to_string(), 1))
    }
}

impl From<String> for Recipients {
    fn from(to: String) -> Self {
        let mut list = RecipientList::new();
        list.push(to);
        Self(list)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(to: Vec<String>) -> Self {
        Self(SmallVec::from_vec(to))
    }
}

impl From<&[&str]> for Recipients {
    fn from(to: &[&str]) -> Self {
        Self(to.iter().map(|r| r.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(to: [&str; N]) -> Self {
        Self(to.iter().map(|r| r.to_string()).collect())
    }
}

/// Schema of a message batch.
///
/// `from: FixedSizeBinary(16)`, then
/// `messages: List<Struct{to: List<Utf8>, type: Utf8, data: Utf8}>`.
pub fn message_batch_schema() -> SchemaRef {
    let to = Field::new(
        "to",
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        false,
    );
    let message = Field::new(
        "item",
        DataType::Struct(Fields::from(vec![
            to,
            Field::new("type", DataType::Utf8, false),
            Field::new("data", DataType::Utf8, true),
        ])),
        true,
    );
    Arc::new(Schema::new(vec![
        Field::new("from", DataType::FixedSizeBinary(16), false),
        Field::new(MESSAGES_FIELD, DataType::List(Arc::new(message)), false),
    ]))
}

/// Column loader for the `messages` field.
///
/// Decodes every outbox, parsing each payload from its JSON string. A
/// null outbox loads as an empty list.
pub fn load_messages(vector: &Vector) -> Result<Column, BatchError> {
    let mut outboxes = decode_array(vector.array().as_ref())?;
    for (row, outbox) in outboxes.iter_mut().enumerate() {
        match outbox {
            Value::Array(messages) => {
                for message in messages {
                    if let Some(data) = message.get_mut("data") {
                        *data = decode_any(data.take(), MESSAGES_FIELD, row)?;
                    }
                }
            }
            Value::Null => *outbox = Value::Array(Vec::new()),
            _ => {}
        }
    }
    Ok(Column::full(vector.name(), outboxes))
}

/// Copy of an outbox with every payload stringified for the wire.
pub(crate) fn stringify_payloads(outbox: &Value) -> Value {
    let mut outbox = outbox.clone();
    if let Value::Array(messages) = &mut outbox {
        for message in messages {
            if let Some(data) = message.get_mut("data") {
                *data = Value::String(data.to_string());
            }
        }
    }
    outbox
}
