//! Illustrative driver for two end-to-end scenarios, run against
//! [`bolflow::MockStore`] for human inspection. Not a CLI front-end in any
//! ergonomic sense, and not load-bearing for any invariant — the `tests/`
//! suite covers that.

use std::sync::Arc;

use bolflow::{
    Bol, BlockIdMint, Config, HandleRegistry, MockStore, ObjectStore, OsRandom,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let store: Arc<dyn ObjectStore> = Arc::new(MockStore::new());
    let config = Config::default();
    let registry = HandleRegistry::new();
    let mint = BlockIdMint::new(OsRandom);

    scenario_small_file_overwrite(&store, &config, &registry, &mint).await;
    scenario_truncate_extend(&store, &config, &registry, &mint).await;

    println!("demo run complete");
}

async fn scenario_small_file_overwrite(
    store: &Arc<dyn ObjectStore>,
    config: &Config,
    registry: &HandleRegistry,
    mint: &BlockIdMint<OsRandom>,
) {
    let path = "/demo/small.txt";
    let mut bol = Bol::new_small_file();
    bol.small_file_write(0, b"test data");

    let id = registry.open(path.to_string(), bol, None).await;
    let handle = registry.get(id).await.unwrap();
    let mut guard = handle.lock().await;
    let etag = bolflow::flush::flush(&mut guard.bol, store, path, config, None, mint)
        .await
        .expect("flush should succeed against MockStore");
    guard.known_etag = Some(etag);
    drop(guard);

    let content = store
        .get_properties(path)
        .await
        .expect("object should exist after commit");
    println!("small-file scenario: {} bytes committed", content.size);
}

async fn scenario_truncate_extend(
    store: &Arc<dyn ObjectStore>,
    config: &Config,
    registry: &HandleRegistry,
    mint: &BlockIdMint<OsRandom>,
) {
    let path = "/demo/extend.txt";
    let mut bol = Bol::new_empty(16);
    bol.apply_write(0, b"test data", config.max_block_size(), mint);
    bol.truncate(15, config.max_block_size(), mint);

    let id = registry.open(path.to_string(), bol, None).await;
    let handle = registry.get(id).await.unwrap();
    let mut guard = handle.lock().await;
    let etag = bolflow::flush::flush(&mut guard.bol, store, path, config, None, mint)
        .await
        .expect("flush should succeed against MockStore");
    guard.known_etag = Some(etag);
    drop(guard);

    let props = store.get_properties(path).await.unwrap();
    println!("truncate-extend scenario: {} bytes committed", props.size);
}
