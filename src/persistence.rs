//! Canvas document persistence.
//!
//! The persisted unit is `{nodes, edges, viewport}`. Storage is a pluggable
//! key-value blob behind the [`CanvasStorage`] trait; [`PersistenceSync`]
//! watches store change notifications and debounce-saves snapshots.
//!
//! Image URLs are stored host-relative and rehydrated to absolute addresses
//! on load, so a document survives the API host changing between sessions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::block::{Block, BlockData};
use crate::config::ClientConfig;
use crate::store::{Edge, GraphStore};

/// Pan/zoom state of the canvas. Opaque to the core; carried through
/// persistence for the UI's benefit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// The persisted canvas document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasDocument {
    #[serde(default)]
    pub nodes: Vec<Block>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl CanvasDocument {
    /// Snapshot the store. Image URLs under the configured origin are
    /// relativized for storage.
    #[must_use]
    pub fn snapshot(store: &GraphStore, viewport: Viewport, config: &ClientConfig) -> Self {
        let mut nodes = store.blocks();
        for block in &mut nodes {
            if let BlockData::Image(img) = &mut block.data {
                if let Some(url) = &img.image_url {
                    img.image_url = Some(config.relativize(url));
                }
            }
        }
        Self {
            nodes,
            edges: store.edges(),
            viewport,
        }
    }

    /// Restore this document into an (empty) store, rehydrating relative
    /// image URLs to absolute ones. Edges that would corrupt the graph are
    /// dropped with a warning rather than failing the whole load.
    pub fn restore(mut self, store: &GraphStore, config: &ClientConfig) -> Viewport {
        for block in &mut self.nodes {
            if let BlockData::Image(img) = &mut block.data {
                if let Some(url) = &img.image_url {
                    img.image_url = Some(config.absolutize(url));
                }
            }
        }
        for block in self.nodes {
            store.add_block(block);
        }
        for edge in self.edges {
            if let Err(err) = store.add_edge(edge) {
                tracing::warn!(error = %err, "dropping invalid edge from persisted document");
            }
        }
        self.viewport
    }
}

/// Load/save contract for the persisted document blob.
#[async_trait]
pub trait CanvasStorage: Send + Sync {
    async fn load(&self) -> Option<CanvasDocument>;
    async fn save(&self, document: &CanvasDocument);
}

/// In-memory storage, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    document: Mutex<Option<CanvasDocument>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<CanvasDocument> {
        self.document.lock().clone()
    }
}

#[async_trait]
impl CanvasStorage for MemoryStorage {
    async fn load(&self) -> Option<CanvasDocument> {
        self.document.lock().clone()
    }

    async fn save(&self, document: &CanvasDocument) {
        *self.document.lock() = Some(document.clone());
    }
}

/// JSON-file storage for local sessions. The document is written whole on
/// every save; at canvas scale that is cheaper than being clever.
pub struct FileStorage {
    path: std::path::PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CanvasStorage for FileStorage {
    async fn load(&self) -> Option<CanvasDocument> {
        let bytes = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(document) => Some(document),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "unreadable canvas document");
                None
            }
        }
    }

    async fn save(&self, document: &CanvasDocument) {
        let json = match serde_json::to_vec_pretty(document) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "canvas document failed to serialize");
                return;
            }
        };
        if let Err(err) = tokio::fs::write(&self.path, json).await {
            tracing::warn!(path = %self.path.display(), error = %err, "canvas document save failed");
        }
    }
}

/// Debounced store-to-storage synchronizer.
///
/// Subscribes to store change notifications and saves a snapshot after the
/// canvas has been quiet for the debounce window (default 800ms). Bursts of
/// edits collapse into one save.
pub struct PersistenceSync {
    viewport: Arc<Mutex<Viewport>>,
    commands: flume::Sender<SyncCommand>,
    task: JoinHandle<()>,
}

enum SyncCommand {
    Flush,
    Shutdown,
}

impl PersistenceSync {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

    /// Start watching `store`, saving into `storage`.
    pub fn spawn(
        store: Arc<GraphStore>,
        storage: Arc<dyn CanvasStorage>,
        config: ClientConfig,
        debounce: Duration,
    ) -> Self {
        let viewport = Arc::new(Mutex::new(Viewport::default()));
        let (command_tx, command_rx) = flume::unbounded();
        let changes = store.subscribe();
        let viewport_handle = Arc::clone(&viewport);

        let task = tokio::spawn(async move {
            let mut dirty = false;
            loop {
                let wait = async {
                    if dirty {
                        sleep(debounce).await;
                        true
                    } else {
                        // Nothing pending; park until something happens.
                        std::future::pending::<bool>().await
                    }
                };
                tokio::select! {
                    command = command_rx.recv_async() => match command {
                        Ok(SyncCommand::Flush) => {
                            if dirty {
                                save_snapshot(&store, &storage, &viewport_handle, &config).await;
                                dirty = false;
                            }
                        }
                        Ok(SyncCommand::Shutdown) | Err(_) => {
                            if dirty {
                                save_snapshot(&store, &storage, &viewport_handle, &config).await;
                            }
                            break;
                        }
                    },
                    change = changes.recv_async() => match change {
                        Ok(_) => dirty = true,
                        Err(_) => {
                            if dirty {
                                save_snapshot(&store, &storage, &viewport_handle, &config).await;
                            }
                            break;
                        }
                    },
                    elapsed = wait => {
                        if elapsed {
                            save_snapshot(&store, &storage, &viewport_handle, &config).await;
                            dirty = false;
                        }
                    }
                }
            }
        });

        Self {
            viewport,
            commands: command_tx,
            task,
        }
    }

    /// Record the current viewport; included in the next snapshot.
    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.lock() = viewport;
    }

    /// Force a pending save to happen now.
    pub fn flush(&self) {
        let _ = self.commands.send(SyncCommand::Flush);
    }

    /// Final save and stop.
    pub async fn shutdown(self) {
        let _ = self.commands.send(SyncCommand::Shutdown);
        let _ = self.task.await;
    }
}

async fn save_snapshot(
    store: &GraphStore,
    storage: &Arc<dyn CanvasStorage>,
    viewport: &Arc<Mutex<Viewport>>,
    config: &ClientConfig,
) {
    let snapshot = CanvasDocument::snapshot(store, *viewport.lock(), config);
    storage.save(&snapshot).await;
    tracing::debug!(
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "canvas document saved"
    );
}
