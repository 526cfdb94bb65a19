//! Key-path addressable shared store consumed by every client reactor.
//!
//! Three primitives are offered: write a value at a path, apply a batch of path
//! mutations atomically, and subscribe to a path (current value plus every later
//! change). There is no read-modify-write transaction; score arithmetic goes through
//! [`Mutation::Increment`] so the store applies the delta itself.

mod batch;
mod error;
pub mod memory;
mod path;
pub mod tree;

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use serde_json::Value;
use tokio::sync::watch;

pub use self::batch::{ACTIONS_ROOT, ActionToken, Batch, BatchOutcome, Mutation};
pub use self::error::{StoreError, StoreResult};
pub use self::memory::MemoryStore;
pub use self::path::StorePath;

/// Value observed at a subscribed path together with the store version that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub version: u64,
    pub value: Value,
}

/// Live view on one path: the value at subscription time plus a stream of later values.
///
/// Consecutive identical values are never delivered twice. Values for a path arrive in
/// the order the store committed them.
pub struct Subscription {
    path: StorePath,
    current: Change,
    changes: BoxStream<'static, Change>,
    observed: watch::Receiver<u64>,
}

impl Subscription {
    pub fn new(
        path: StorePath,
        current: Change,
        changes: BoxStream<'static, Change>,
        observed: watch::Receiver<u64>,
    ) -> Self {
        Self {
            path,
            current,
            changes,
            observed,
        }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Most recent value delivered for this path.
    pub fn current(&self) -> &Change {
        &self.current
    }

    /// Wait for the next value. Returns `None` once the store is gone.
    pub async fn next_change(&mut self) -> Option<Change> {
        let change = self.changes.next().await?;
        self.current = change.clone();
        Some(change)
    }

    /// Latest store version this subscription has accounted for, including commits that
    /// did not change the value at its path.
    pub fn observed(&self) -> watch::Receiver<u64> {
        self.observed.clone()
    }

    /// Turn the subscription into a stream that starts with the current value.
    pub fn into_stream(self) -> BoxStream<'static, Change> {
        let Subscription {
            current, changes, ..
        } = self;
        futures::stream::once(async move { current })
            .chain(changes)
            .boxed()
    }
}

/// Abstraction over the realtime store backing a party session.
pub trait SharedStore: Send + Sync {
    /// Read the value currently stored at `path` (`null` when absent).
    fn read(&self, path: StorePath) -> BoxFuture<'static, StoreResult<Value>>;

    /// Apply every mutation of `batch` as one atomic, atomically observed unit.
    fn write_batch(&self, batch: Batch) -> BoxFuture<'static, StoreResult<BatchOutcome>>;

    /// Subscribe to `path`, receiving its current value and every later change.
    fn subscribe(&self, path: StorePath) -> BoxFuture<'static, StoreResult<Subscription>>;

    /// Replace the value at a single path. Writing `null` deletes the subtree.
    fn write(&self, path: StorePath, value: Value) -> BoxFuture<'static, StoreResult<BatchOutcome>> {
        self.write_batch(Batch::new().set(path, value))
    }
}
