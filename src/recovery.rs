//! Recovery resolver and registry (§4.4, §4.5 recovery states).
//!
//! A [`PartialReconstruction`](crate::compact_block::PartialReconstruction)
//! parks here until an external recovery service delivers the missing
//! transactions (in index order) or the entry's deadline elapses. At most
//! one entry exists per block hash; a duplicate full block arriving via the
//! overlay cancels it outright (see §4.5's `AWAITING_RECOVERY → CANCELLED`
//! transition).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::compact_block::{self, BlockHeader, PartialReconstruction, ReconstructedBlock};
use crate::error::{GatewayError, Result};
use crate::hash::BlockHash;

/// Completes a [`PartialReconstruction`] given the caller-supplied recovered
/// transactions, in the same order as `partial.missing_indices` (§4.4).
pub fn resolve(
    magic: u32,
    header: &BlockHeader,
    partial: &PartialReconstruction,
    recovered_transactions: &[Vec<u8>],
) -> Result<ReconstructedBlock> {
    if recovered_transactions.len() != partial.missing_indices.len() {
        return Err(GatewayError::RecoveryMismatch {
            missing: partial.missing_indices.len(),
            recovered: recovered_transactions.len(),
        });
    }

    let mut slots = partial.slots.clone();
    for (missing_index, recovered_tx) in partial.missing_indices.iter().zip(recovered_transactions) {
        slots[*missing_index] = Some(recovered_tx.clone());
    }

    compact_block::assemble_block(magic, header, slots)
}

/// One pending recovery: enough of the original compact block to re-assemble,
/// plus the partial reconstruction and an absolute deadline.
#[derive(Debug, Clone)]
struct RecoveryEntry {
    header: BlockHeader,
    partial: PartialReconstruction,
    deadline: Instant,
}

/// Tracks in-flight recoveries, keyed by block hash. At most one entry per
/// hash; entries are removed on completion, cancellation, or deadline sweep.
#[derive(Debug, Default)]
pub struct RecoveryRegistry {
    entries: HashMap<BlockHash, RecoveryEntry>,
}

impl RecoveryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a partial reconstruction awaiting recovery, replacing any
    /// prior entry for the same hash.
    pub fn insert(
        &mut self,
        hash: BlockHash,
        header: BlockHeader,
        partial: PartialReconstruction,
        deadline_after: Duration,
    ) {
        self.entries.insert(
            hash,
            RecoveryEntry {
                header,
                partial,
                deadline: Instant::now() + deadline_after,
            },
        );
    }

    /// Returns whether a recovery is currently pending for `hash`.
    pub fn is_pending(&self, hash: &BlockHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Cancels a pending recovery (duplicate full block arrived, or explicit
    /// API call). Returns `true` if an entry was actually removed.
    pub fn cancel(&mut self, hash: &BlockHash) -> bool {
        self.entries.remove(hash).is_some()
    }

    /// Completes a pending recovery with caller-supplied transactions,
    /// removing the entry regardless of outcome — a failed recovery is not
    /// retried with the same partial state.
    pub fn complete(
        &mut self,
        magic: u32,
        hash: &BlockHash,
        recovered_transactions: &[Vec<u8>],
    ) -> Result<ReconstructedBlock> {
        let entry = self
            .entries
            .remove(hash)
            .ok_or_else(|| GatewayError::RecoveryNotPending {
                block_hash: hash.to_string(),
            })?;

        resolve(magic, &entry.header, &entry.partial, recovered_transactions)
    }

    /// Removes and returns the hashes of all entries whose deadline has
    /// passed as of `now`. Callers should emit
    /// [`GatewayError::RecoveryTimeout`] and a stats event for each.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<BlockHash> {
        let expired: Vec<BlockHash> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(hash, _)| *hash)
            .collect();

        for hash in &expired {
            self.entries.remove(hash);
        }

        expired
    }

    /// Number of recoveries currently pending.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry currently holds no pending recoveries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
