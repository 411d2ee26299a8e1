//! Core identifier and status types for the blockweave canvas.
//!
//! These are the fundamental domain concepts shared by every layer: opaque
//! identifiers for blocks and jobs, canvas coordinates, and the per-block
//! status state machine.
//!
//! # Key Types
//!
//! - [`NodeId`] / [`JobId`]: opaque string identifiers
//! - [`BlockKind`]: discriminates text blocks from image blocks
//! - [`BlockStatus`]: the per-block execution state machine
//! - [`ContentItem`]: one aggregated input contribution for a block
//!
//! # Examples
//!
//! ```rust
//! use blockweave::types::{BlockStatus, NodeId};
//!
//! let id = NodeId::generate();
//! assert!(!id.as_str().is_empty());
//!
//! let status = BlockStatus::Idle;
//! assert!(status.is_runnable());
//! assert!(!BlockStatus::Running.is_runnable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for a block (node) on the canvas.
///
/// Generated identifiers are UUIDv4 strings, but any non-empty string is a
/// valid id; the store treats ids as opaque keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        NodeId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Developer Experience: allow using string literals where a NodeId is expected.
impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Opaque identifier for a generation job owned by the external executor.
///
/// The client only ever holds a reference; the job record itself lives
/// server-side.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

/// Model identifier passed through verbatim to the executor.
pub type ModelId = String;

/// Canvas position of a block. Purely presentational; the store never
/// interprets coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Discriminates the two block families on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Per-block execution status, independent of job identity.
///
/// Transitions: `Idle -> Running -> Success | Error`. An `Error` block returns
/// to `Idle` implicitly when the user edits or retriggers it; there is no
/// direct `Idle -> Success` transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    /// Initial state, and the terminal "ready to run again" state.
    #[default]
    Idle,
    /// A job is in flight for this block.
    Running,
    /// The last job finished successfully.
    Success,
    /// The last job failed; the block carries an error message.
    Error,
}

impl BlockStatus {
    /// A block may be (re)triggered from any state except `Running`.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One aggregated input contribution collected from an upstream block.
///
/// Produced by [`GraphStore::input_content`](crate::store::GraphStore::input_content):
/// text blocks contribute their trimmed non-empty content, image blocks their
/// URL; blocks with neither are skipped silently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
    Text { content: String },
    Image { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_node_ids_are_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn status_runnable_gate() {
        assert!(BlockStatus::Idle.is_runnable());
        assert!(BlockStatus::Success.is_runnable());
        assert!(BlockStatus::Error.is_runnable());
        assert!(!BlockStatus::Running.is_runnable());
    }

    #[test]
    fn content_item_serializes_tagged() {
        let item = ContentItem::Text {
            content: "hello".into(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["content"], "hello");
    }
}
