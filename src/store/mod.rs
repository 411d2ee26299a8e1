//! Authoritative canvas state: blocks, edges, selection, change notification.
//!
//! [`GraphStore`] owns the node and edge sets and enforces the structural
//! invariants (acyclicity, cascade deletion, insertion-ordered edges). It
//! knows nothing about jobs; the runtime mutates block payloads exclusively
//! through the setter API exposed here.

mod errors;
mod events;
mod graph;

pub use errors::GraphError;
pub use events::{StoreEvent, StoreEventKind};
pub use graph::{Edge, GraphStore, Lineage};
