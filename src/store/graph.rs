//! The canvas graph store.
//!
//! All mutation happens synchronously under one lock; there is no suspension
//! point between a structural check and the mutation it guards, so an
//! interleaved async callback can never observe a half-applied change.

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::errors::GraphError;
use super::events::{StoreEvent, StoreEventKind};
use crate::block::{Block, BlockData, ImageSource};
use crate::types::{BlockKind, BlockStatus, ContentItem, JobId, NodeId, Position};

/// A directed dependency edge: `source`'s output feeds `target`'s input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            target,
        }
    }
}

/// Ancestor/descendant sets reachable from a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lineage {
    pub ancestors: FxHashSet<NodeId>,
    pub descendants: FxHashSet<NodeId>,
}

#[derive(Default)]
struct Inner {
    blocks: FxHashMap<NodeId, Block>,
    /// Block insertion order, for stable document snapshots.
    order: Vec<NodeId>,
    /// Edge insertion order is load-bearing: input aggregation follows it.
    edges: Vec<Edge>,
    selection: FxHashSet<NodeId>,
}

/// Authoritative owner of the canvas node and edge sets.
///
/// Constructed once per session; cheap to share behind an `Arc`. External
/// observers subscribe to change notifications rather than reading a shared
/// singleton.
///
/// # Examples
///
/// ```rust
/// use blockweave::store::GraphStore;
/// use blockweave::types::{BlockKind, Position};
///
/// let store = GraphStore::new();
/// let a = store.add_node(BlockKind::Text, Position::new(0.0, 0.0));
/// let b = store.add_node(BlockKind::Text, Position::new(200.0, 0.0));
///
/// store.connect(&a, &b).unwrap();
/// // The reverse edge would close a cycle and is refused.
/// assert!(store.connect(&b, &a).is_err());
/// ```
pub struct GraphStore {
    inner: RwLock<Inner>,
    subscribers: Mutex<Vec<flume::Sender<StoreEvent>>>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to change notifications. Every successful mutation publishes
    /// one [`StoreEvent`]; dropped receivers are pruned lazily and never block
    /// mutation.
    pub fn subscribe(&self) -> flume::Receiver<StoreEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn publish(&self, kind: StoreEventKind) {
        let event = StoreEvent::now(kind);
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ------------------------------------------------------------------
    // Node CRUD
    // ------------------------------------------------------------------

    /// Insert a fresh block of the given kind. Does not affect edges.
    pub fn add_node(&self, kind: BlockKind, position: Position) -> NodeId {
        let id = NodeId::generate();
        let block = match kind {
            BlockKind::Text => Block::text(id.clone(), position, DEFAULT_TEXT_MODEL),
            BlockKind::Image => Block::image(id.clone(), position),
        };
        self.add_block(block)
    }

    /// Insert a pre-built block (document restore, tool invocations).
    pub fn add_block(&self, block: Block) -> NodeId {
        let id = block.id.clone();
        {
            let mut inner = self.inner.write();
            inner.order.push(id.clone());
            inner.blocks.insert(id.clone(), block);
        }
        self.publish(StoreEventKind::NodeAdded(id.clone()));
        id
    }

    /// Remove a block, cascade-delete every incident edge, and drop it from
    /// the selection. Returns the removed block so the caller can inspect an
    /// in-flight job; server-side cancellation is the caller's responsibility.
    pub fn delete_node(&self, id: &NodeId) -> Option<Block> {
        let (removed, cascaded) = {
            let mut inner = self.inner.write();
            let removed = inner.blocks.remove(id)?;
            inner.order.retain(|n| n != id);
            inner.selection.remove(id);
            let mut cascaded = Vec::new();
            inner.edges.retain(|e| {
                if &e.source == id || &e.target == id {
                    cascaded.push((e.source.clone(), e.target.clone()));
                    false
                } else {
                    true
                }
            });
            (removed, cascaded)
        };
        for (source, target) in cascaded {
            self.publish(StoreEventKind::EdgeRemoved { source, target });
        }
        self.publish(StoreEventKind::NodeRemoved(id.clone()));
        Some(removed)
    }

    /// Clone of the block with the given id.
    pub fn get(&self, id: &NodeId) -> Option<Block> {
        self.inner.read().blocks.get(id).cloned()
    }

    /// All blocks in insertion order.
    pub fn blocks(&self) -> Vec<Block> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.blocks.get(id).cloned())
            .collect()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> Vec<Edge> {
        self.inner.read().edges.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }

    // ------------------------------------------------------------------
    // Edges & structure
    // ------------------------------------------------------------------

    /// Insert the edge `source -> target` if and only if the graph stays
    /// acyclic. On rejection the store is left untouched.
    pub fn connect(&self, source: &NodeId, target: &NodeId) -> Result<String, GraphError> {
        let edge = {
            let mut inner = self.inner.write();
            if !inner.blocks.contains_key(source) {
                return Err(GraphError::UnknownNode { id: source.clone() });
            }
            if !inner.blocks.contains_key(target) {
                return Err(GraphError::UnknownNode { id: target.clone() });
            }
            if inner
                .edges
                .iter()
                .any(|e| &e.source == source && &e.target == target)
            {
                return Err(GraphError::DuplicateEdge {
                    src: source.clone(),
                    target: target.clone(),
                });
            }
            if would_cycle(&inner.edges, source, target) {
                tracing::warn!(%source, %target, "rejecting edge: would create a cycle");
                return Err(GraphError::WouldCycle {
                    src: source.clone(),
                    target: target.clone(),
                });
            }
            let edge = Edge::new(source.clone(), target.clone());
            inner.edges.push(edge.clone());
            edge
        };
        self.publish(StoreEventKind::EdgeAdded {
            source: edge.source.clone(),
            target: edge.target.clone(),
        });
        Ok(edge.id)
    }

    /// Restore an edge verbatim (document load). Skips the cycle check's
    /// event chatter but still refuses edges that would corrupt the graph.
    pub fn add_edge(&self, edge: Edge) -> Result<(), GraphError> {
        {
            let mut inner = self.inner.write();
            if would_cycle(&inner.edges, &edge.source, &edge.target) {
                return Err(GraphError::WouldCycle {
                    src: edge.source,
                    target: edge.target,
                });
            }
            inner.edges.push(edge);
        }
        Ok(())
    }

    /// Ancestors and descendants reachable from `id`.
    ///
    /// Two independent BFS traversals, one over the reversed edge relation and
    /// one forward. The graph is acyclic so termination is guaranteed, but the
    /// visited sets are still required to keep diamonds from being revisited.
    pub fn lineage(&self, id: &NodeId) -> Lineage {
        let inner = self.inner.read();
        Lineage {
            ancestors: bfs_reachable(&inner.edges, id, Direction::Backward),
            descendants: bfs_reachable(&inner.edges, id, Direction::Forward),
        }
    }

    /// Direct input blocks of `id`, in edge-insertion order.
    pub fn inputs_of(&self, id: &NodeId) -> Vec<Block> {
        let inner = self.inner.read();
        inner
            .edges
            .iter()
            .filter(|e| &e.target == id)
            .filter_map(|e| inner.blocks.get(&e.source).cloned())
            .collect()
    }

    /// Aggregated input content of `id`, in edge-insertion order.
    ///
    /// Text inputs contribute trimmed non-empty content, image inputs a
    /// non-empty URL; inputs contributing neither are skipped silently.
    pub fn input_content(&self, id: &NodeId) -> Vec<ContentItem> {
        self.inputs_of(id)
            .into_iter()
            .filter_map(|block| match block.data {
                BlockData::Text(t) => {
                    let trimmed = t.content.trim();
                    (!trimmed.is_empty()).then(|| ContentItem::Text {
                        content: trimmed.to_string(),
                    })
                }
                BlockData::Image(i) => i
                    .image_url
                    .filter(|url| !url.is_empty())
                    .map(|url| ContentItem::Image { url }),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Replace the selection set.
    pub fn select(&self, ids: impl IntoIterator<Item = NodeId>) {
        {
            let mut inner = self.inner.write();
            inner.selection = ids.into_iter().collect();
        }
        self.publish(StoreEventKind::SelectionChanged);
    }

    /// Currently selected block ids, in insertion order.
    pub fn selected(&self) -> Vec<NodeId> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter(|id| inner.selection.contains(*id))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Payload mutation (used by the runtime and UI alike)
    // ------------------------------------------------------------------

    fn with_block_mut(&self, id: &NodeId, f: impl FnOnce(&mut Block)) -> bool {
        let updated = {
            let mut inner = self.inner.write();
            match inner.blocks.get_mut(id) {
                Some(block) => {
                    f(block);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.publish(StoreEventKind::NodeUpdated(id.clone()));
        }
        updated
    }

    pub fn set_position(&self, id: &NodeId, position: Position) -> bool {
        self.with_block_mut(id, |b| b.position = position)
    }

    pub fn set_status(&self, id: &NodeId, status: BlockStatus) -> bool {
        self.with_block_mut(id, |b| b.set_status(status))
    }

    /// Atomically gate a run trigger: flips a runnable block to `Running` and
    /// clears any stale error under a single lock acquisition, so two racing
    /// triggers can never both claim the same block.
    pub fn begin_run(&self, id: &NodeId) -> bool {
        let began = {
            let mut inner = self.inner.write();
            match inner.blocks.get_mut(id) {
                Some(block) if block.status().is_runnable() => {
                    block.set_status(BlockStatus::Running);
                    block.set_error(None);
                    true
                }
                _ => false,
            }
        };
        if began {
            self.publish(StoreEventKind::NodeUpdated(id.clone()));
        }
        began
    }

    pub fn set_error(&self, id: &NodeId, error: Option<String>) -> bool {
        self.with_block_mut(id, |b| b.set_error(error))
    }

    pub fn set_job(&self, id: &NodeId, job_id: JobId) -> bool {
        self.with_block_mut(id, |b| b.set_job(Some(job_id)))
    }

    /// Clearing `job_id` is the signal that the block is free to re-trigger.
    pub fn clear_job(&self, id: &NodeId) -> bool {
        self.with_block_mut(id, |b| b.set_job(None))
    }

    /// Editing the prompt also resets an errored block back to Idle so it can
    /// be retried.
    pub fn set_prompt(&self, id: &NodeId, prompt: impl Into<String>) -> bool {
        let prompt = prompt.into();
        self.with_block_mut(id, |b| {
            match &mut b.data {
                BlockData::Text(t) => t.prompt = Some(prompt),
                BlockData::Image(i) => i.prompt = Some(prompt),
            }
            if b.status() == BlockStatus::Error {
                b.set_status(BlockStatus::Idle);
                b.set_error(None);
            }
        })
    }

    /// Replace a text block's displayed content (streaming running total).
    /// No-op for image blocks.
    pub fn set_text_content(&self, id: &NodeId, content: impl Into<String>) -> bool {
        let content = content.into();
        self.with_block_mut(id, |b| {
            if let BlockData::Text(t) = &mut b.data {
                t.content = content;
            }
        })
    }

    /// Record a generated image on an image block. No-op for text blocks.
    pub fn set_image_result(&self, id: &NodeId, image_id: String, image_url: String) -> bool {
        self.with_block_mut(id, |b| {
            if let BlockData::Image(i) = &mut b.data {
                i.image_id = Some(image_id);
                i.image_url = Some(image_url);
                i.source = ImageSource::Generated;
            }
        })
    }

    /// Read and clear the one-shot auto-run latch for `id`.
    pub fn take_auto_run(&self, id: &NodeId) -> bool {
        let mut fired = false;
        self.with_block_mut(id, |b| fired = b.take_auto_run());
        fired
    }
}

/// Model used for text blocks created without an explicit model choice.
/// The executor resolves "default" to its configured default model.
const DEFAULT_TEXT_MODEL: &str = "default";

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn bfs_reachable(edges: &[Edge], start: &NodeId, direction: Direction) -> FxHashSet<NodeId> {
    let mut adjacency: FxHashMap<&NodeId, Vec<&NodeId>> = FxHashMap::default();
    for edge in edges {
        let (from, to) = match direction {
            Direction::Forward => (&edge.source, &edge.target),
            Direction::Backward => (&edge.target, &edge.source),
        };
        adjacency.entry(from).or_default().push(to);
    }

    let mut visited = FxHashSet::default();
    let mut queue: VecDeque<&NodeId> = VecDeque::new();
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        if let Some(next) = adjacency.get(current) {
            for &n in next {
                if visited.insert(n.clone()) {
                    queue.push_back(n);
                }
            }
        }
    }
    visited.remove(start);
    visited
}

/// Depth-first search with an explicit recursion stack over the existing
/// edges plus the candidate. Any back-edge into the active stack is a cycle;
/// self-loops fall out of the same check.
fn would_cycle(edges: &[Edge], source: &NodeId, target: &NodeId) -> bool {
    let mut adjacency: FxHashMap<&NodeId, Vec<&NodeId>> = FxHashMap::default();
    for edge in edges {
        adjacency.entry(&edge.source).or_default().push(&edge.target);
    }
    adjacency.entry(source).or_default().push(target);

    let roots: Vec<&NodeId> = adjacency.keys().copied().collect();
    let mut visited: FxHashSet<&NodeId> = FxHashSet::default();
    let mut on_stack: FxHashSet<&NodeId> = FxHashSet::default();

    for root in roots {
        if visited.contains(root) {
            continue;
        }
        // Iterative DFS: each frame tracks how far into the adjacency list
        // the node has been explored.
        let mut stack: Vec<(&NodeId, usize)> = vec![(root, 0)];
        visited.insert(root);
        on_stack.insert(root);
        loop {
            let Some(&(node, cursor)) = stack.last() else {
                break;
            };
            let neighbors = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&next) = neighbors.get(cursor) {
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                if on_stack.contains(next) {
                    return true;
                }
                if visited.insert(next) {
                    on_stack.insert(next);
                    stack.push((next, 0));
                }
            } else {
                stack.pop();
                on_stack.remove(node);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ids: &[&str]) -> GraphStore {
        let store = GraphStore::new();
        for id in ids {
            store.add_block(Block::text((*id).into(), Position::default(), "m"));
        }
        store
    }

    #[test]
    fn self_loop_is_rejected() {
        let store = store_with(&["a"]);
        let err = store.connect(&"a".into(), &"a".into()).unwrap_err();
        assert!(matches!(err, GraphError::WouldCycle { .. }));
        assert!(store.edges().is_empty());
    }

    #[test]
    fn reverse_edge_is_rejected_and_first_edge_kept() {
        let store = store_with(&["x", "y"]);
        store.connect(&"x".into(), &"y".into()).unwrap();
        let err = store.connect(&"y".into(), &"x".into()).unwrap_err();
        assert!(matches!(err, GraphError::WouldCycle { .. }));
        let edges = store.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "x".into());
        assert_eq!(edges[0].target, "y".into());
    }

    #[test]
    fn longer_cycle_is_rejected() {
        let store = store_with(&["a", "b", "c"]);
        store.connect(&"a".into(), &"b".into()).unwrap();
        store.connect(&"b".into(), &"c".into()).unwrap();
        assert!(store.connect(&"c".into(), &"a".into()).is_err());
        assert_eq!(store.edges().len(), 2);
    }

    #[test]
    fn duplicate_edge_is_rejected() {
        let store = store_with(&["a", "b"]);
        store.connect(&"a".into(), &"b".into()).unwrap();
        let err = store.connect(&"a".into(), &"b".into()).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateEdge { .. }));
    }

    #[test]
    fn connect_requires_known_endpoints() {
        let store = store_with(&["a"]);
        assert!(matches!(
            store.connect(&"a".into(), &"ghost".into()),
            Err(GraphError::UnknownNode { .. })
        ));
    }

    #[test]
    fn diamond_lineage() {
        let store = store_with(&["a", "b", "c", "d"]);
        store.connect(&"a".into(), &"b".into()).unwrap();
        store.connect(&"a".into(), &"c".into()).unwrap();
        store.connect(&"b".into(), &"d".into()).unwrap();
        store.connect(&"c".into(), &"d".into()).unwrap();

        let lineage = store.lineage(&"d".into());
        let expected: FxHashSet<NodeId> =
            ["a", "b", "c"].into_iter().map(NodeId::from).collect();
        assert_eq!(lineage.ancestors, expected);
        assert!(lineage.descendants.is_empty());

        let lineage = store.lineage(&"a".into());
        assert!(lineage.ancestors.is_empty());
        assert_eq!(lineage.descendants.len(), 3);
        assert!(!lineage.descendants.contains(&"a".into()));
    }

    #[test]
    fn delete_cascades_exactly_incident_edges() {
        let store = store_with(&["a", "b", "c"]);
        store.connect(&"a".into(), &"b".into()).unwrap();
        store.connect(&"b".into(), &"c".into()).unwrap();
        store.connect(&"a".into(), &"c".into()).unwrap();
        store.select(vec!["b".into(), "c".into()]);

        store.delete_node(&"b".into());

        let edges = store.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "a".into());
        assert_eq!(edges[0].target, "c".into());
        assert_eq!(store.selected(), vec![NodeId::from("c")]);
        assert!(store.get(&"b".into()).is_none());
    }

    #[test]
    fn input_content_follows_edge_order_and_skips_empty() {
        let store = GraphStore::new();
        let mut first = Block::text("first".into(), Position::default(), "m");
        if let BlockData::Text(t) = &mut first.data {
            t.content = "  one  ".into();
        }
        let empty = Block::text("empty".into(), Position::default(), "m");
        let mut img = Block::image("img".into(), Position::default());
        if let BlockData::Image(i) = &mut img.data {
            i.image_url = Some("/api/images/42".into());
        }
        let target = Block::text("target".into(), Position::default(), "m");
        for b in [first, empty, img, target] {
            store.add_block(b);
        }
        store.connect(&"first".into(), &"target".into()).unwrap();
        store.connect(&"empty".into(), &"target".into()).unwrap();
        store.connect(&"img".into(), &"target".into()).unwrap();

        let content = store.input_content(&"target".into());
        assert_eq!(
            content,
            vec![
                ContentItem::Text {
                    content: "one".into()
                },
                ContentItem::Image {
                    url: "/api/images/42".into()
                },
            ]
        );
    }

    #[test]
    fn mutations_publish_events() {
        let store = store_with(&["a"]);
        let rx = store.subscribe();
        store.set_status(&"a".into(), BlockStatus::Running);
        let event = rx.recv().unwrap();
        assert_eq!(event.kind, StoreEventKind::NodeUpdated("a".into()));
    }

    #[test]
    fn prompt_edit_resets_errored_block() {
        let store = store_with(&["a"]);
        store.set_status(&"a".into(), BlockStatus::Error);
        store.set_error(&"a".into(), Some("boom".into()));
        store.set_prompt(&"a".into(), "try again");
        let block = store.get(&"a".into()).unwrap();
        assert_eq!(block.status(), BlockStatus::Idle);
        match block.data {
            BlockData::Text(t) => {
                assert_eq!(t.prompt.as_deref(), Some("try again"));
                assert!(t.error.is_none());
            }
            BlockData::Image(_) => panic!("expected text payload"),
        }
    }
}
