//! Shared fixtures for the service tests.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::{
    client::{ClientSnapshot, IdentitySlot, LocalView, MemoryIdentitySlot, PartyClient},
    config::GameConfig,
    services::roster_service,
    state::game::Player,
    store::{
        Batch, BatchOutcome, MemoryStore, SharedStore, StoreError, StorePath, StoreResult,
        Subscription,
    },
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub async fn connect(store: &Arc<MemoryStore>) -> Arc<PartyClient> {
    connect_with(store.clone(), GameConfig::default(), MemoryIdentitySlot::new()).await
}

pub async fn connect_with(
    store: Arc<dyn SharedStore>,
    config: GameConfig,
    slot: impl IdentitySlot + 'static,
) -> Arc<PartyClient> {
    PartyClient::connect(store, Arc::new(config), Arc::new(slot))
        .await
        .unwrap()
}

/// Connect a new client and join as `name`, waiting until the roster shows the join.
pub async fn join(store: &Arc<MemoryStore>, name: &str) -> Arc<PartyClient> {
    let client = connect(store).await;
    let player = roster_service::join(
        &client,
        name,
        vec![format!("{name} secret one"), format!("{name} secret two")],
    )
    .await
    .unwrap();
    settle(&client, |view, _| view.roster.contains(&player.id)).await;
    client
}

/// Wait (bounded) until `predicate` holds on `client`.
pub async fn settle<F>(client: &PartyClient, predicate: F) -> ClientSnapshot
where
    F: FnMut(&LocalView, Option<&Player>) -> bool,
{
    tokio::time::timeout(SETTLE_TIMEOUT, client.wait_until(predicate))
        .await
        .expect("client view did not converge in time")
}

/// Wait until `client` has observed at least store version `version`.
pub async fn catch_up(client: &PartyClient, store: &MemoryStore) -> ClientSnapshot {
    let version = store.version().await;
    tokio::time::timeout(SETTLE_TIMEOUT, client.observe(version))
        .await
        .expect("client did not catch up with the store in time");
    client.snapshot().await
}

pub async fn user_id(client: &PartyClient) -> String {
    client.user().await.unwrap().id
}

pub fn path(raw: &str) -> StorePath {
    StorePath::parse(raw).unwrap()
}

pub async fn read(store: &MemoryStore, raw: &str) -> Value {
    store.read(path(raw)).await.unwrap()
}

/// Store whose writes always fail while reads and subscriptions work.
pub struct FailingStore {
    inner: MemoryStore,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

impl SharedStore for FailingStore {
    fn read(&self, path: StorePath) -> BoxFuture<'static, StoreResult<Value>> {
        self.inner.read(path)
    }

    fn write_batch(&self, _batch: Batch) -> BoxFuture<'static, StoreResult<BatchOutcome>> {
        Box::pin(async { Err(StoreError::unavailable("connection lost")) })
    }

    fn subscribe(&self, path: StorePath) -> BoxFuture<'static, StoreResult<Subscription>> {
        self.inner.subscribe(path)
    }
}
