//! Per-account and per-signal serialization primitives (spec.md §5).
//!
//! Grounded on
//! `poruru210-sankey-copier/relay-server/src/connection_manager/mod.rs`: a
//! keyed map behind a single `Arc<RwLock<HashMap<..>>>`, lazily populated
//! per key rather than pre-registered. Here the values are per-key locks
//! instead of connection state, so two distinct signals never block each
//! other's command processing while two commands against the *same*
//! signal still serialize.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, Semaphore};

/// Gates broker-terminal calls: session-sensitive calls (login, order_send)
/// serialize fully, read-only calls (tick, positions_get) allow limited
/// concurrency — spec.md §5. The `Broker` trait itself only describes the
/// wire contract; a concrete terminal adapter holds one `BrokerGate` and
/// wraps its own calls with `acquire_write`/`acquire_read` before talking
/// to the underlying connection.
pub struct BrokerGate {
    writes: Semaphore,
    reads: Semaphore,
}

impl BrokerGate {
    pub fn new() -> Self {
        Self {
            writes: Semaphore::new(1),
            reads: Semaphore::new(3),
        }
    }

    pub async fn acquire_write(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.writes.acquire().await.expect("broker write semaphore closed")
    }

    pub async fn acquire_read(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.reads.acquire().await.expect("broker read semaphore closed")
    }
}

impl Default for BrokerGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-signal-id command serialization: two edits/deletes against the same
/// signal never interleave, but unrelated signals proceed independently.
pub struct SignalLocks {
    locks: RwLock<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SignalLocks {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, key: i64) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&key) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquires the lock for `key`, returning a guard that serializes every
    /// other caller keyed on the same id until dropped.
    pub async fn acquire(&self, key: i64) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(key).await;
        lock.lock_owned().await
    }
}

impl Default for SignalLocks {
    fn default() -> Self {
        Self::new()
    }
}
