//! Transaction cache external interface (§3, §6).
//!
//! The gateway core never owns the transaction cache's storage — it only
//! borrows a read snapshot for the duration of a short-ID mapping pass. The
//! trait here is the seam a real node-backed cache implements; the
//! in-memory implementation is a reference used by tests and by callers that
//! don't need persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::hash::TxHash;

/// External interface consumed by the short-ID mapper (§4.2).
///
/// Implementations MUST yield a consistent snapshot for the duration of a
/// single `enumerate` call — cache enumeration must not observe a write that
/// started after the enumeration began (§5, "Cache enumeration must not
/// suspend mid-enumeration").
pub trait TransactionCache: Send + Sync {
    /// Returns a point-in-time snapshot of `(hash, tx_bytes)` pairs.
    ///
    /// The borrowed form would be preferable, but the lock-guard lifetime
    /// would otherwise leak into every short-ID mapping call site; an owned
    /// snapshot keeps the trait object-safe and the enumeration atomic.
    fn snapshot(&self) -> Vec<(TxHash, Vec<u8>)>;

    /// Looks up one transaction by hash, if present.
    fn get(&self, hash: &TxHash) -> Option<Vec<u8>>;

    /// Inserts or overwrites `(hash, tx_bytes)`. Concurrent readers may
    /// observe either the old or new value (§4.6) but never a torn write.
    fn insert(&self, hash: TxHash, tx_bytes: Vec<u8>);
}

/// Reference in-memory [`TransactionCache`], snapshotting under a read guard
/// for the duration of enumeration, matching the interior-mutability
/// convention this codebase uses for its own indices.
#[derive(Debug, Default)]
pub struct InMemoryTransactionCache {
    entries: RwLock<HashMap<TxHash, Vec<u8>>>,
}

impl InMemoryTransactionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached transactions.
    pub fn len(&self) -> usize {
        self.entries.read().expect("tx cache lock poisoned").len()
    }

    /// Whether the cache currently holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionCache for InMemoryTransactionCache {
    fn snapshot(&self) -> Vec<(TxHash, Vec<u8>)> {
        self.entries
            .read()
            .expect("tx cache lock poisoned")
            .iter()
            .map(|(hash, bytes)| (*hash, bytes.clone()))
            .collect()
    }

    fn get(&self, hash: &TxHash) -> Option<Vec<u8>> {
        self.entries.read().expect("tx cache lock poisoned").get(hash).cloned()
    }

    fn insert(&self, hash: TxHash, tx_bytes: Vec<u8>) {
        self.entries
            .write()
            .expect("tx cache lock poisoned")
            .insert(hash, tx_bytes);
    }
}
