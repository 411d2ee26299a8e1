use chrono::{DateTime, Utc};

use crate::types::NodeId;

/// What changed in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEventKind {
    NodeAdded(NodeId),
    NodeUpdated(NodeId),
    NodeRemoved(NodeId),
    EdgeAdded { source: NodeId, target: NodeId },
    EdgeRemoved { source: NodeId, target: NodeId },
    SelectionChanged,
}

/// A timestamped change notification published after every successful
/// mutation. Observers (UI, persistence) subscribe via
/// [`GraphStore::subscribe`](super::GraphStore::subscribe).
#[derive(Clone, Debug)]
pub struct StoreEvent {
    pub when: DateTime<Utc>,
    pub kind: StoreEventKind,
}

impl StoreEvent {
    pub(crate) fn now(kind: StoreEventKind) -> Self {
        Self {
            when: Utc::now(),
            kind,
        }
    }

    /// The node this event concerns, if any.
    pub fn node_id(&self) -> Option<&NodeId> {
        match &self.kind {
            StoreEventKind::NodeAdded(id)
            | StoreEventKind::NodeUpdated(id)
            | StoreEventKind::NodeRemoved(id) => Some(id),
            StoreEventKind::EdgeAdded { .. }
            | StoreEventKind::EdgeRemoved { .. }
            | StoreEventKind::SelectionChanged => None,
        }
    }
}
