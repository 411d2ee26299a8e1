//! # Blockweave: Acyclic AI Canvas Core
//!
//! Blockweave is the headless core of an AI canvas: a directed acyclic graph
//! of content blocks (text and image) whose contents are produced by
//! streamed, cancellable, recoverable generation jobs running on an external
//! executor.
//!
//! ## Core Concepts
//!
//! - **Blocks**: Canvas nodes carrying text or image payloads with a status
//!   lifecycle (`Idle → Running → Success | Error`)
//! - **GraphStore**: The acyclic node/edge store with lineage queries and
//!   input aggregation along incoming edges
//! - **RunScheduler**: A run queue with exactly-once claims and a one-shot
//!   auto-run latch for downstream blocks
//! - **JobClient**: Submit/stream/cancel/recover jobs over HTTP + SSE
//! - **CanvasRuntime**: Wires the three together: claims queued blocks,
//!   submits jobs, applies streamed events back into the store
//! - **PersistenceSync**: Debounce-saves `{nodes, edges, viewport}` snapshots
//!
//! ## Quick Start
//!
//! ```
//! use blockweave::block::Block;
//! use blockweave::store::GraphStore;
//! use blockweave::types::{BlockKind, Position};
//!
//! let store = GraphStore::new();
//! let prompt = store.add_node(BlockKind::Text, Position::new(0.0, 0.0));
//! let image = store.add_node(BlockKind::Image, Position::new(240.0, 0.0));
//!
//! // Output of the text block feeds the image block.
//! store.connect(&prompt, &image)?;
//!
//! // The reverse edge would close a cycle and is rejected.
//! assert!(store.connect(&image, &prompt).is_err());
//! # Ok::<(), blockweave::store::GraphError>(())
//! ```
//!
//! Driving generation requires a running executor; see [`runtime::CanvasRuntime`]
//! for the submit/stream/apply loop and [`jobs::JobClient`] for the wire
//! protocol.

pub mod block;
pub mod config;
pub mod jobs;
pub mod persistence;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod types;
