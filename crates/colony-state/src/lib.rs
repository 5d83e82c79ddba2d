//! Group and agent state views for Colony behaviors.
//!
//! A worker step looks like this:
//!
//! ```text
//! Batches::sync(agent desc) ─┐
//!                            ├─► GroupState::new ─► get_agent(i) ─► read / write / add_message
//! Batches::sync(msg desc)  ──┘                                                     │
//!                                       host ◄── GroupChanges ◄── flush_changes ◄──┘
//! ```
//!
//! [`GroupState`] mutably borrows the two synced batches of one group for
//! the step; [`AgentState`] borrows the group and addresses one row.
//! Field access goes through a per-schema [`AccessorTable`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod accessor;
pub mod agent;
pub mod group;
pub mod message;
pub mod schema;

pub use accessor::{Accessor, AccessorTable, Getter};
pub use agent::AgentState;
pub use group::{GroupChanges, GroupState};
pub use message::{load_messages, message_batch_schema, Message, RecipientList, Recipients};
pub use schema::{GroupSchema, GroupSchemaBuilder};
