//! Per-key execution registry
//!
//! Holds, for every execution key, the cancellation token of the loop that
//! currently owns the key and the last content chunk that loop delivered.
//! Each activation gets a fresh generation number; a loop may only touch the
//! slot while its generation is still the registered one, so a superseded loop
//! can neither clear its successor's state nor record sends into it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use termrelay_types::ExecutionKey;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct ExecutionSlot {
    generation: u64,
    cancel: CancellationToken,
    finished: CancellationToken,
    last_sent: Option<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    slots: Mutex<HashMap<ExecutionKey, ExecutionSlot>>,
    next_generation: AtomicU64,
}

/// Shared registry of active executions. Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStore {
    inner: Arc<StoreInner>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ExecutionKey, ExecutionSlot>> {
        // Slot updates are single assignments, a poisoned map is still consistent
        self.inner
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Retire whatever owns `key`, wait up to `grace` for it to exit, then
    /// register a new owner
    pub async fn begin(&self, key: ExecutionKey, grace: Duration) -> ExecutionTicket {
        if let Some(finished) = self.retire(&key) {
            tokio::select! {
                _ = finished.cancelled() => {}
                _ = tokio::time::sleep(grace) => {}
            }
        }
        self.activate(key)
    }

    /// Cancel the current owner of `key` and forget its state, including the
    /// last sent chunk. Returns a token that fires once the old loop has exited.
    pub fn retire(&self, key: &ExecutionKey) -> Option<CancellationToken> {
        let slot = self.slots().remove(key)?;
        slot.cancel.cancel();
        Some(slot.finished)
    }

    /// Register a new owner for `key`, cancelling any owner still registered
    pub fn activate(&self, key: ExecutionKey) -> ExecutionTicket {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();

        let previous = self.slots().insert(
            key.clone(),
            ExecutionSlot {
                generation,
                cancel: cancel.clone(),
                finished: finished.clone(),
                last_sent: None,
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        ExecutionTicket {
            store: self.clone(),
            key,
            generation,
            cancel,
            finished,
        }
    }

    /// Request cooperative cancellation of the execution owning `key`.
    /// The slot is released by the loop itself when it exits.
    pub fn cancel(&self, key: &ExecutionKey) -> bool {
        match self.slots().get(key) {
            Some(slot) => {
                slot.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, key: &ExecutionKey) -> bool {
        self.slots().contains_key(key)
    }

    pub fn active_keys(&self) -> Vec<ExecutionKey> {
        let mut keys: Vec<ExecutionKey> = self.slots().keys().cloned().collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        keys
    }

    pub fn active_count(&self) -> usize {
        self.slots().len()
    }

    fn last_sent(&self, key: &ExecutionKey, generation: u64) -> Option<String> {
        self.slots()
            .get(key)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.last_sent.clone())
    }

    fn record_sent(&self, key: &ExecutionKey, generation: u64, chunk: &str) -> bool {
        match self.slots().get_mut(key) {
            Some(slot) if slot.generation == generation => {
                slot.last_sent = Some(chunk.to_string());
                true
            }
            _ => false,
        }
    }

    fn is_current(&self, key: &ExecutionKey, generation: u64) -> bool {
        self.slots()
            .get(key)
            .map_or(false, |slot| slot.generation == generation)
    }

    fn release(&self, key: &ExecutionKey, generation: u64) {
        let mut slots = self.slots();
        if slots.get(key).map_or(false, |slot| slot.generation == generation) {
            slots.remove(key);
        }
    }
}

/// Ownership of one execution key for the lifetime of a monitoring loop.
/// Dropping the ticket releases the key (if still owned) and signals anyone
/// waiting for the loop to finish.
#[derive(Debug)]
pub struct ExecutionTicket {
    store: ExecutionStore,
    key: ExecutionKey,
    generation: u64,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl ExecutionTicket {
    pub fn key(&self) -> &ExecutionKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancelled explicitly or superseded by a newer execution
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || !self.store.is_current(&self.key, self.generation)
    }

    pub fn last_sent(&self) -> Option<String> {
        self.store.last_sent(&self.key, self.generation)
    }

    pub fn record_sent(&self, chunk: &str) -> bool {
        self.store.record_sent(&self.key, self.generation, chunk)
    }
}

impl Drop for ExecutionTicket {
    fn drop(&mut self) {
        self.store.release(&self.key, self.generation);
        self.finished.cancel();
    }
}
