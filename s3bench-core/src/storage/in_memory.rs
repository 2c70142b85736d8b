//! In-memory storage for dry runs and tests.
//!
//! This provides a [`Storage`] backed by a `HashMap`. The storage is [`Clone`] so that tests can
//! hold a handle for inspection while the driver owns a shared copy. Besides storing objects it
//! records the order in which operations start and finish, and it can be told to fail specific
//! calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::storage::{Storage, StorageError, StorageResult};
use crate::target::ObjectTarget;

/// An operation observed by [`InMemoryStorage`], in the order it happened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageEvent {
    PutStarted,
    PutFinished { len: usize },
    GetStarted,
    GetFinished { len: usize },
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectTarget, Bytes>,
    events: Vec<StorageEvent>,
    put_calls: usize,
    get_calls: usize,
    failing_puts: HashSet<usize>,
    failing_gets: HashSet<usize>,
    targets: HashSet<ObjectTarget>,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<State>>,
    latency: Duration,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every operation by the given duration before it completes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the put call with the given zero-based index fail.
    ///
    /// Calls are counted over the lifetime of the storage, across all batches.
    pub fn fail_put(&self, index: usize) {
        self.state.lock().unwrap().failing_puts.insert(index);
    }

    /// Makes the get call with the given zero-based index fail.
    pub fn fail_get(&self, index: usize) {
        self.state.lock().unwrap().failing_gets.insert(index);
    }

    /// Stores an object directly, bypassing the [`Storage`] trait.
    pub fn insert(&self, target: ObjectTarget, body: Bytes) {
        self.state.lock().unwrap().objects.insert(target, body);
    }

    /// Returns a clone of the stored bytes, if present.
    pub fn get_stored(&self, target: &ObjectTarget) -> Option<Bytes> {
        self.state.lock().unwrap().objects.get(target).cloned()
    }

    /// Total number of put calls received.
    pub fn put_calls(&self) -> usize {
        self.state.lock().unwrap().put_calls
    }

    /// Total number of get calls received.
    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }

    /// All operations observed so far, in order.
    pub fn events(&self) -> Vec<StorageEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Every distinct target that was addressed by a put or get.
    pub fn targets(&self) -> HashSet<ObjectTarget> {
        self.state.lock().unwrap().targets.clone()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait::async_trait]
impl Storage for InMemoryStorage {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn put_object(&self, target: &ObjectTarget, body: Bytes) -> StorageResult<()> {
        let index = {
            let mut state = self.state.lock().unwrap();
            let index = state.put_calls;
            state.put_calls += 1;
            state.targets.insert(target.clone());
            state.events.push(StorageEvent::PutStarted);
            index
        };

        self.simulate_latency().await;

        let mut state = self.state.lock().unwrap();
        if state.failing_puts.contains(&index) {
            return Err(StorageError::generic(format!("injected failure of put #{index}")));
        }

        state.events.push(StorageEvent::PutFinished { len: body.len() });
        state.objects.insert(target.clone(), body);
        Ok(())
    }

    async fn get_object(&self, target: &ObjectTarget) -> StorageResult<u64> {
        let index = {
            let mut state = self.state.lock().unwrap();
            let index = state.get_calls;
            state.get_calls += 1;
            state.targets.insert(target.clone());
            state.events.push(StorageEvent::GetStarted);
            index
        };

        self.simulate_latency().await;

        let mut state = self.state.lock().unwrap();
        if state.failing_gets.contains(&index) {
            return Err(StorageError::generic(format!("injected failure of get #{index}")));
        }

        let len = state
            .objects
            .get(target)
            .map(Bytes::len)
            .ok_or_else(|| StorageError::NotFound(target.clone()))?;

        state.events.push(StorageEvent::GetFinished { len });
        Ok(len as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ObjectTarget {
        ObjectTarget::new("bucket", "key")
    }

    #[tokio::test]
    async fn stores_and_reads_back() {
        let storage = InMemoryStorage::new();
        storage
            .put_object(&target(), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(storage.get_object(&target()).await.unwrap(), 5);
        assert_eq!(storage.get_stored(&target()).unwrap(), &b"hello"[..]);
        assert_eq!(storage.put_calls(), 1);
        assert_eq!(storage.get_calls(), 1);
        assert_eq!(
            storage.events(),
            [
                StorageEvent::PutStarted,
                StorageEvent::PutFinished { len: 5 },
                StorageEvent::GetStarted,
                StorageEvent::GetFinished { len: 5 },
            ]
        );
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let storage = InMemoryStorage::new();
        let err = storage.get_object(&target()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_failures_hit_only_that_call() {
        let storage = InMemoryStorage::new();
        storage.fail_put(1);

        let body = Bytes::from_static(b"x");
        assert!(storage.put_object(&target(), body.clone()).await.is_ok());
        assert!(storage.put_object(&target(), body.clone()).await.is_err());
        assert!(storage.put_object(&target(), body).await.is_ok());
    }
}
