//! Serialized read-modify-write-verify cycles.
//!
//! Every update takes the queue's async gate first. `tokio::sync::Mutex`
//! grants the lock in FIFO order, so concurrent updates apply in the order
//! they were submitted and never interleave their read and write halves.

use crate::config::RetryPolicy;
use crate::error::{StorageError, StorageResult};
use crate::store::EntityStore;
use reelkeep_model::{EntityKey, EntityKind, StoredEntity};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Secondary copy of written entities, e.g. the extension's key/value
/// storage. Each verified write is mirrored and read back.
pub trait WriteMirror: Send + Sync {
    /// Store `value` under `(kind, key)`, or remove it when `None`.
    fn store(&self, kind: EntityKind, key: &EntityKey, value: Option<&Value>) -> StorageResult<()>;

    fn load(&self, kind: EntityKind, key: &EntityKey) -> StorageResult<Option<Value>>;
}

/// In-process mirror backed by a map.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    entries: Mutex<HashMap<(EntityKind, EntityKey), Value>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(EntityKind, EntityKey), Value>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WriteMirror for MemoryMirror {
    fn store(&self, kind: EntityKind, key: &EntityKey, value: Option<&Value>) -> StorageResult<()> {
        let mut entries = self.lock();
        match value {
            Some(value) => {
                entries.insert((kind, key.clone()), value.clone());
            }
            None => {
                entries.remove(&(kind, key.clone()));
            }
        }
        Ok(())
    }

    fn load(&self, kind: EntityKind, key: &EntityKey) -> StorageResult<Option<Value>> {
        Ok(self.lock().get(&(kind, key.clone())).cloned())
    }
}

#[derive(Clone)]
pub struct WriteQueue {
    gate: Arc<tokio::sync::Mutex<()>>,
    retry: RetryPolicy,
    mirror: Option<Arc<dyn WriteMirror>>,
}

impl WriteQueue {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            gate: Arc::new(tokio::sync::Mutex::new(())),
            retry,
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn WriteMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Run `work` while holding the queue's turn, so no `update` can
    /// interleave with it. For multi-row passes that read one kind and
    /// write another.
    pub async fn exclusive<R>(&self, work: impl FnOnce() -> R) -> R {
        let _turn = self.gate.lock().await;
        work()
    }

    /// Read `key`, apply `mutate`, write the result (or delete it when
    /// `mutate` returns `None`), then read both copies back.
    ///
    /// `mutate` runs once. A read-back mismatch rewrites the same value
    /// after a linear backoff. Once `max_attempts` writes have failed
    /// verification the call returns [`StorageError::Verification`]. Other
    /// errors are returned at once.
    pub async fn update<T, F>(
        &self,
        store: &EntityStore<T>,
        key: impl Into<EntityKey>,
        mutate: F,
    ) -> StorageResult<Option<T>>
    where
        T: StoredEntity,
        F: FnOnce(Option<T>) -> Option<T> + Send,
    {
        let key = key.into();
        let max_attempts = self.retry.max_attempts.max(1);
        let _turn = self.gate.lock().await;

        let next = mutate(store.get(key.clone())?);
        if let Some(next) = &next {
            if next.key().as_ref() != Some(&key) {
                return Err(StorageError::Validation(format!(
                    "update of {} {key} produced an entity with key {:?}",
                    T::KIND,
                    next.key()
                )));
            }
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let written = match &next {
                Some(next) => Some(store.put(next)?),
                None => {
                    store.delete(key.clone())?;
                    None
                }
            };

            let document = written.as_ref().map(serde_json::to_value).transpose()?;
            if let Some(mirror) = &self.mirror {
                mirror.store(T::KIND, &key, document.as_ref())?;
            }

            if self.verify(store, &key, written.as_ref(), document.as_ref())? {
                debug!(kind = %T::KIND, key = %key, attempt, "verified write");
                return Ok(written);
            }

            if attempt >= max_attempts {
                warn!(kind = %T::KIND, key = %key, attempts = attempt, "write verification failed");
                return Err(StorageError::Verification {
                    kind: T::KIND,
                    key,
                    attempts: attempt,
                });
            }
            let backoff = self.retry.backoff_for(attempt);
            warn!(kind = %T::KIND, key = %key, attempt, "write verification mismatch, retrying in {backoff:?}");
            tokio::time::sleep(backoff).await;
        }
    }

    fn verify<T: StoredEntity>(
        &self,
        store: &EntityStore<T>,
        key: &EntityKey,
        expected: Option<&T>,
        expected_document: Option<&Value>,
    ) -> StorageResult<bool> {
        if store.get(key.clone())?.as_ref() != expected {
            return Ok(false);
        }
        if let Some(mirror) = &self.mirror {
            if mirror.load(T::KIND, key)?.as_ref() != expected_document {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
