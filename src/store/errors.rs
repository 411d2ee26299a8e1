use miette::Diagnostic;
use thiserror::Error;

use crate::types::NodeId;

/// Structural errors raised by [`GraphStore`](super::GraphStore) mutations.
///
/// These never escape the store/UI boundary: a rejected connection simply
/// means the edge does not appear. They are still typed so callers can log or
/// surface them as they see fit.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// Inserting the edge would create a cycle (self-loops included).
    #[error("edge {src} -> {target} would create a cycle")]
    #[diagnostic(
        code(blockweave::store::would_cycle),
        help("The canvas graph must stay acyclic. Connect in the other direction or through a different block.")
    )]
    WouldCycle { src: NodeId, target: NodeId },

    /// One of the endpoints does not exist in the store.
    #[error("unknown block: {id}")]
    #[diagnostic(code(blockweave::store::unknown_node))]
    UnknownNode { id: NodeId },

    /// An identical source -> target edge already exists.
    #[error("edge {src} -> {target} already exists")]
    #[diagnostic(code(blockweave::store::duplicate_edge))]
    DuplicateEdge { src: NodeId, target: NodeId },
}
