use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use futures::{Stream, StreamExt, future::BoxFuture};
use serde_json::Value;
use tokio::sync::{
    Mutex, broadcast,
    broadcast::error::RecvError,
    watch,
};
use tracing::{debug, warn};

use super::{
    Change, SharedStore, Subscription,
    batch::{Batch, BatchOutcome, Mutation},
    error::{StoreError, StoreResult},
    path::StorePath,
    tree,
};

/// Buffered commits per subscriber before it has to resync from the head.
const DEFAULT_COMMIT_CAPACITY: usize = 256;

/// Result of one applied batch, shared with every subscriber.
#[derive(Debug)]
struct Commit {
    version: u64,
    root: Arc<Value>,
    touched: Vec<StorePath>,
}

/// In-process realtime store: a JSON tree guarded by a single lock, fanning out
/// committed snapshots to subscribers.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    state: Mutex<MemoryState>,
    commits: broadcast::Sender<Arc<Commit>>,
    head: watch::Sender<Arc<Commit>>,
}

struct MemoryState {
    root: Arc<Value>,
    version: u64,
    last_timestamp_ms: u64,
}

impl MemoryState {
    /// Wall clock in milliseconds, bumped when needed so values strictly increase.
    fn next_timestamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        self.last_timestamp_ms = now.max(self.last_timestamp_ms + 1);
        self.last_timestamp_ms
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_COMMIT_CAPACITY)
    }

    /// Create an empty store whose subscribers buffer up to `capacity` commits.
    pub fn with_capacity(capacity: usize) -> Self {
        let root = Arc::new(Value::Null);
        let (commits, _rx) = broadcast::channel(capacity.max(1));
        let (head, _head_rx) = watch::channel(Arc::new(Commit {
            version: 0,
            root: root.clone(),
            touched: Vec::new(),
        }));

        Self {
            inner: Arc::new(MemoryInner {
                state: Mutex::new(MemoryState {
                    root,
                    version: 0,
                    last_timestamp_ms: 0,
                }),
                commits,
                head,
            }),
        }
    }

    /// Version of the latest committed batch (0 for a fresh store).
    pub async fn version(&self) -> u64 {
        self.inner.state.lock().await.version
    }
}

impl MemoryInner {
    async fn read(&self, path: &StorePath) -> Value {
        let state = self.state.lock().await;
        tree::value_at(&state.root, path)
    }

    async fn apply(&self, batch: Batch) -> StoreResult<BatchOutcome> {
        let mut state = self.state.lock().await;

        let marker = match batch.token() {
            Some(token) => {
                let marker = token.marker_path()?;
                if !tree::value_at(&state.root, &marker).is_null() {
                    debug!(token = %token, "skipping batch with an already applied token");
                    return Ok(BatchOutcome::Duplicate);
                }
                Some(marker)
            }
            None => None,
        };

        if batch.is_empty() && marker.is_none() {
            return Ok(BatchOutcome::Applied {
                version: state.version,
            });
        }

        // Mutate a copy so a failing mutation leaves the committed tree untouched.
        let mut next = (*state.root).clone();
        let mut touched = Vec::with_capacity(batch.len() + 1);
        for (path, mutation) in batch.mutations() {
            match mutation {
                Mutation::Set(value) => tree::set_at(&mut next, path, value.clone()),
                Mutation::Delete => tree::delete_at(&mut next, path),
                Mutation::Increment(delta) => {
                    let total = incremented(&tree::value_at(&next, path), *delta, path)?;
                    tree::set_at(&mut next, path, Value::from(total));
                }
                Mutation::ServerTimestamp => {
                    let timestamp = state.next_timestamp();
                    tree::set_at(&mut next, path, Value::from(timestamp));
                }
            }
            touched.push(path.clone());
        }
        if let Some(marker) = marker {
            tree::set_at(&mut next, &marker, Value::Bool(true));
            touched.push(marker);
        }

        state.version += 1;
        state.root = Arc::new(next);
        let commit = Arc::new(Commit {
            version: state.version,
            root: state.root.clone(),
            touched,
        });

        // Publishing under the lock keeps commit order identical for every subscriber.
        let _ = self.commits.send(commit.clone());
        self.head.send_replace(commit);

        Ok(BatchOutcome::Applied {
            version: state.version,
        })
    }

    async fn subscribe(&self, path: StorePath) -> Subscription {
        let state = self.state.lock().await;
        let commits = self.commits.subscribe();
        let head = self.head.subscribe();
        let current = Change {
            version: state.version,
            value: tree::value_at(&state.root, &path),
        };
        drop(state);

        let (observed, observed_rx) = watch::channel(current.version);
        let changes = change_stream(path.clone(), current.clone(), commits, head, observed);
        Subscription::new(path, current, changes.boxed(), observed_rx)
    }
}

fn incremented(current: &Value, delta: i64, path: &StorePath) -> StoreResult<i64> {
    let base = match current {
        Value::Null => 0,
        Value::Number(number) => number.as_i64().ok_or_else(|| StoreError::TypeMismatch {
            path: path.to_string(),
            reason: format!("cannot increment non-integer number {number}"),
        })?,
        other => {
            return Err(StoreError::TypeMismatch {
                path: path.to_string(),
                reason: format!("cannot increment {other}"),
            });
        }
    };
    base.checked_add(delta).ok_or_else(|| StoreError::TypeMismatch {
        path: path.to_string(),
        reason: "increment overflows".into(),
    })
}

fn head_commit(head: &watch::Receiver<Arc<Commit>>) -> Arc<Commit> {
    head.borrow().clone()
}

/// Project the commit feed onto one path, skipping commits that leave it unchanged.
///
/// `observed` tracks the last commit this subscription accounted for. A delivered change
/// counts once the consumer asks for the next one.
fn change_stream(
    path: StorePath,
    mut last: Change,
    mut commits: broadcast::Receiver<Arc<Commit>>,
    head: watch::Receiver<Arc<Commit>>,
    observed: watch::Sender<u64>,
) -> impl Stream<Item = Change> + Send + 'static {
    async_stream::stream! {
        loop {
            let (commit, resync) = match commits.recv().await {
                Ok(commit) => (commit, false),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%path, skipped, "subscriber lagged behind; resyncing from head");
                    (head_commit(&head), true)
                }
                Err(RecvError::Closed) => break,
            };

            if commit.version <= last.version {
                continue;
            }
            if !resync && !commit.touched.iter().any(|touched| touched.overlaps(&path)) {
                observed.send_replace(commit.version);
                continue;
            }

            let value = tree::value_at(&commit.root, &path);
            last.version = commit.version;
            if value == last.value {
                observed.send_replace(last.version);
                continue;
            }
            last.value = value;
            yield last.clone();
            observed.send_replace(last.version);
        }
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, path: StorePath) -> BoxFuture<'static, StoreResult<Value>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read(&path).await) })
    }

    fn write_batch(&self, batch: Batch) -> BoxFuture<'static, StoreResult<BatchOutcome>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.apply(batch).await })
    }

    fn subscribe(&self, path: StorePath) -> BoxFuture<'static, StoreResult<Subscription>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.subscribe(path).await) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::store::ActionToken;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn subscribe_yields_current_value_then_changes() {
        let store = MemoryStore::new();
        store
            .write(path("gameState"), json!("lobby"))
            .await
            .unwrap();

        let mut sub = store.subscribe(path("gameState")).await.unwrap();
        assert_eq!(sub.current().value, json!("lobby"));

        store
            .write(path("gameState"), json!("gift_rating"))
            .await
            .unwrap();
        let change = sub.next_change().await.unwrap();
        assert_eq!(change.value, json!("gift_rating"));
        assert_eq!(change.version, 2);
    }

    #[tokio::test]
    async fn unrelated_writes_are_not_delivered() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(path("level1")).await.unwrap();

        store.write(path("level2/status"), json!("voting")).await.unwrap();
        store.write(path("level1/status"), json!("voting")).await.unwrap();

        let change = sub.next_change().await.unwrap();
        assert_eq!(change.value, json!({"status": "voting"}));
        assert_eq!(change.version, 2);
    }

    #[tokio::test]
    async fn unchanged_values_still_advance_the_observed_version() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(path("level1")).await.unwrap();
        let observed = sub.observed();

        store.write(path("level1/votes/p1"), json!(1)).await.unwrap();
        assert_eq!(sub.next_change().await.unwrap().version, 1);

        store.write(path("level1/votes/p1"), json!(1)).await.unwrap();
        store.write(path("level2/status"), json!("voting")).await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), sub.next_change()).await;
        assert!(pending.is_err(), "identical value was delivered again");
        assert_eq!(*observed.borrow(), 3);
    }

    #[tokio::test]
    async fn batch_is_observed_as_one_change() {
        let store = MemoryStore::new();
        store
            .write(path("players/p1"), json!({"id": "p1", "score": 0}))
            .await
            .unwrap();
        let mut sub = store.subscribe(StorePath::root()).await.unwrap();

        let batch = Batch::new()
            .increment(path("players/p1/score"), 10)
            .set(path("level1/status"), json!("revealed"));
        store.write_batch(batch).await.unwrap();

        let change = sub.next_change().await.unwrap();
        assert_eq!(change.value["players"]["p1"]["score"], json!(10));
        assert_eq!(change.value["level1"]["status"], json!("revealed"));
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_updates() {
        let store = MemoryStore::new();
        let score = path("players/p1/score");

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let score = score.clone();
            handles.push(tokio::spawn(async move {
                store
                    .write_batch(Batch::new().increment(score, 5))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.read(score).await.unwrap(), json!(100));
    }

    #[tokio::test]
    async fn failing_mutation_leaves_tree_untouched() {
        let store = MemoryStore::new();
        store.write(path("players/p1/name"), json!("Ada")).await.unwrap();

        let batch = Batch::new()
            .set(path("gameState"), json!("level1"))
            .increment(path("players/p1/name"), 1);
        let err = store.write_batch(batch).await.unwrap_err();

        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert_eq!(store.read(path("gameState")).await.unwrap(), Value::Null);
        assert_eq!(store.version().await, 1);
    }

    #[tokio::test]
    async fn tokened_batch_applies_once() {
        let store = MemoryStore::new();
        let token = ActionToken::new("level1", None, "q0-reveal");

        let first = store
            .write_batch(
                Batch::new()
                    .increment(path("players/p1/score"), 10)
                    .with_token(token.clone()),
            )
            .await
            .unwrap();
        let second = store
            .write_batch(
                Batch::new()
                    .increment(path("players/p1/score"), 10)
                    .with_token(token),
            )
            .await
            .unwrap();

        assert!(first.is_applied());
        assert_eq!(second, BatchOutcome::Duplicate);
        assert_eq!(
            store.read(path("players/p1/score")).await.unwrap(),
            json!(10)
        );
    }

    #[tokio::test]
    async fn server_timestamps_strictly_increase() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store
                .write_batch(Batch::new().server_timestamp(path(&format!("players/{id}/joinedAt"))))
                .await
                .unwrap();
        }

        let a = store.read(path("players/a/joinedAt")).await.unwrap();
        let b = store.read(path("players/b/joinedAt")).await.unwrap();
        let c = store.read(path("players/c/joinedAt")).await.unwrap();
        assert!(a.as_u64().unwrap() < b.as_u64().unwrap());
        assert!(b.as_u64().unwrap() < c.as_u64().unwrap());
    }

    #[tokio::test]
    async fn lagging_subscriber_resyncs_to_latest_value() {
        let store = MemoryStore::with_capacity(2);
        let mut sub = store.subscribe(path("level3/round")).await.unwrap();

        for round in 1..=6 {
            store.write(path("level3/round"), json!(round)).await.unwrap();
        }

        let mut last = None;
        while let Ok(Some(change)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), sub.next_change()).await
        {
            last = Some(change.value);
        }
        assert_eq!(last, Some(json!(6)));
    }
}
