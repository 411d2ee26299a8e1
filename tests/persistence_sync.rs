//! Debounced document persistence: bursts collapse into one save, flush
//! forces a pending save, and shutdown never loses a dirty snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use blockweave::config::ClientConfig;
use blockweave::persistence::{
    CanvasDocument, CanvasStorage, FileStorage, MemoryStorage, PersistenceSync, Viewport,
};
use blockweave::store::GraphStore;
use blockweave::types::{BlockKind, Position};

const DEBOUNCE: Duration = Duration::from_millis(50);

fn parts() -> (Arc<GraphStore>, Arc<MemoryStorage>, ClientConfig) {
    (
        Arc::new(GraphStore::new()),
        Arc::new(MemoryStorage::new()),
        ClientConfig::new("http://127.0.0.1:8000/api"),
    )
}

async fn wait_for_save(storage: &MemoryStorage) -> CanvasDocument {
    for _ in 0..100 {
        if let Some(doc) = storage.document() {
            return doc;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("no document was saved");
}

#[tokio::test(flavor = "multi_thread")]
async fn burst_of_edits_collapses_into_one_snapshot() {
    let (store, storage, config) = parts();
    let sync = PersistenceSync::spawn(
        Arc::clone(&store),
        Arc::clone(&storage) as Arc<dyn CanvasStorage>,
        config,
        DEBOUNCE,
    );

    let a = store.add_node(BlockKind::Text, Position::new(0.0, 0.0));
    let b = store.add_node(BlockKind::Image, Position::new(100.0, 0.0));
    store.connect(&a, &b).unwrap();
    store.set_prompt(&a, "burst");

    let doc = wait_for_save(&storage).await;
    assert_eq!(doc.nodes.len(), 2);
    assert_eq!(doc.edges.len(), 1);

    sync.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn flush_saves_without_waiting_for_the_debounce() {
    let (store, storage, config) = parts();
    let sync = PersistenceSync::spawn(
        Arc::clone(&store),
        Arc::clone(&storage) as Arc<dyn CanvasStorage>,
        config,
        Duration::from_secs(3600), // would never fire on its own
    );

    store.add_node(BlockKind::Text, Position::default());
    sleep(Duration::from_millis(20)).await; // let the change notification land
    sync.flush();

    let doc = wait_for_save(&storage).await;
    assert_eq!(doc.nodes.len(), 1);

    sync.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_flushes_dirty_state() {
    let (store, storage, config) = parts();
    let sync = PersistenceSync::spawn(
        Arc::clone(&store),
        Arc::clone(&storage) as Arc<dyn CanvasStorage>,
        config,
        Duration::from_secs(3600),
    );

    store.add_node(BlockKind::Text, Position::default());
    sleep(Duration::from_millis(20)).await;
    sync.shutdown().await;

    let doc = storage.document().expect("shutdown saves pending changes");
    assert_eq!(doc.nodes.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn file_storage_round_trips_the_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = FileStorage::new(dir.path().join("canvas.json"));
    let config = ClientConfig::new("http://127.0.0.1:8000/api");

    let store = GraphStore::new();
    let a = store.add_node(BlockKind::Text, Position::new(1.0, 2.0));
    let b = store.add_node(BlockKind::Image, Position::new(3.0, 4.0));
    store.connect(&a, &b).unwrap();

    let snapshot = CanvasDocument::snapshot(
        &store,
        Viewport {
            x: 7.0,
            y: 8.0,
            zoom: 0.5,
        },
        &config,
    );
    storage.save(&snapshot).await;

    let loaded = storage.load().await.expect("document on disk");
    assert_eq!(loaded, snapshot);

    let restored = GraphStore::new();
    let viewport = loaded.restore(&restored, &config);
    assert_eq!(viewport.zoom, 0.5);
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.edges().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_or_corrupt_file_loads_as_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("canvas.json");

    let storage = FileStorage::new(&path);
    assert!(storage.load().await.is_none());

    std::fs::write(&path, b"{ not json").expect("write garbage");
    assert!(storage.load().await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn viewport_rides_along_with_the_snapshot() {
    let (store, storage, config) = parts();
    let sync = PersistenceSync::spawn(
        Arc::clone(&store),
        Arc::clone(&storage) as Arc<dyn CanvasStorage>,
        config,
        DEBOUNCE,
    );

    sync.set_viewport(Viewport {
        x: 10.0,
        y: -4.0,
        zoom: 1.5,
    });
    store.add_node(BlockKind::Text, Position::default());

    let doc = wait_for_save(&storage).await;
    assert_eq!(doc.viewport.zoom, 1.5);
    assert_eq!(doc.viewport.x, 10.0);

    sync.shutdown().await;
}
