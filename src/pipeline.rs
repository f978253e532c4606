//! Block and transaction dispatch pipeline (§4.5, §4.6).
//!
//! Wires the leaf components (decompressor, recovery registry, seen-blocks
//! dedup, stats) together with the external collaborators of §6. Per §9's
//! cyclic-reference redesign flag, the pipeline holds its collaborators by
//! explicit reference/handle rather than the connection/node/service cycle
//! the upstream source used — there is no back-pointer from a collaborator
//! into the pipeline.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::collaborators::{Broadcaster, LocalNodeSink, NeutralityService, PeerHandle, RecoveryService};
use crate::compact_block::{self, CompactBlock, DecompressionResult};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::hash::{BlockHash, TxHash};
use crate::recovery::RecoveryRegistry;
use crate::seen_blocks::SeenBlocks;
use crate::shortid::ShortId;
use crate::stats::GatewayStats;
use crate::tx_cache::TransactionCache;

/// Translates a raw local-node transaction message into zero or more
/// overlay-bound tuples. Out of scope for this core beyond the interface:
/// the actual wire-format translation is the message layer's concern.
pub trait TxMessageConverter: Send + Sync {
    /// Converts one local-node transaction message.
    fn convert(&self, local_tx_message: &[u8]) -> Vec<(Vec<u8>, TxHash, Vec<u8>)>;
}

/// Ties the leaf components together behind the external collaborators of §6.
pub struct BlockDispatchPipeline<B, N, Neu, R> {
    config: GatewayConfig,
    seen_blocks: Mutex<SeenBlocks>,
    recovery_registry: Mutex<RecoveryRegistry>,
    stats: std::sync::Arc<GatewayStats>,
    broadcaster: B,
    local_node: N,
    neutrality: Neu,
    recovery_service: R,
}

impl<B, N, Neu, R> BlockDispatchPipeline<B, N, Neu, R>
where
    B: Broadcaster,
    N: LocalNodeSink,
    Neu: NeutralityService,
    R: RecoveryService,
{
    /// Builds a pipeline from its configuration, a stats instance shared with
    /// the [`TransactionDispatcher`] handling the same gateway's transaction
    /// flow, and its other collaborators.
    pub fn new(
        config: GatewayConfig,
        stats: std::sync::Arc<GatewayStats>,
        broadcaster: B,
        local_node: N,
        neutrality: Neu,
        recovery_service: R,
    ) -> Self {
        Self {
            seen_blocks: Mutex::new(SeenBlocks::new(config.seen_blocks_capacity)),
            recovery_registry: Mutex::new(RecoveryRegistry::new()),
            stats,
            config,
            broadcaster,
            local_node,
            neutrality,
            recovery_service,
        }
    }

    /// Read-only access to accumulated statistics.
    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    /// Handles a full block received directly from the local node
    /// (§4.5 `UNSEEN → COMPRESSING → PROPAGATED`).
    pub async fn handle_local_full_block(&self, hash: BlockHash, block_bytes: &[u8]) {
        self.stats.record_block_from_node();

        if self.seen_blocks.lock().expect("seen blocks lock poisoned").contains(&hash) {
            self.stats.record_block_ignored_seen();
            debug!(%hash, "ignoring already-seen block from local node");
            return;
        }

        self.neutrality.propagate(block_bytes, None, hash).await;

        let cancelled = self
            .recovery_registry
            .lock()
            .expect("recovery registry lock poisoned")
            .cancel(&hash);
        if cancelled {
            debug!(%hash, "cancelled pending recovery: full block arrived first");
        }

        self.seen_blocks.lock().expect("seen blocks lock poisoned").insert(hash);
        info!(%hash, "propagated block from local node to overlay");
    }

    /// Releases the decryption key for a previously propagated block
    /// (§4.5 `PROPAGATED → KEY_SENT`).
    pub async fn send_key(&self, hash: BlockHash) {
        let Some(key) = self.neutrality.get_encryption_key(hash).await else {
            warn!(%hash, "no encryption key available to release");
            return;
        };
        let peers = self.broadcaster.broadcast(&key, None).await;
        info!(%hash, peer_count = peers.len(), "released encryption key to overlay peers");
    }

    /// Handles a compact block received from the local node
    /// (§4.5 `UNSEEN → DECOMPRESSING → {RESOLVED | AWAITING_RECOVERY}`).
    pub async fn handle_local_compact_block(
        &self,
        hash: BlockHash,
        compact: &CompactBlock,
        tx_cache: &dyn TransactionCache,
    ) -> Result<()> {
        if self.seen_blocks.lock().expect("seen blocks lock poisoned").contains(&hash) {
            self.stats.record_block_ignored_seen();
            debug!(%hash, "ignoring compact block for already-seen block");
            return Ok(());
        }

        let key = compact_block::derive_sip_key(&compact.block_header, compact.short_nonce);
        let cache_entries: Vec<(TxHash, Vec<u8>)> = tx_cache.snapshot();
        let sid_to_tx: HashMap<ShortId, Vec<u8>> = crate::shortid::map_short_ids(
            &key,
            compact,
            cache_entries.iter().map(|(h, b)| (*h, b.as_slice())),
        );

        match compact_block::decompress(self.config.network_magic, compact, &sid_to_tx)? {
            DecompressionResult::Complete(block) => {
                debug!(%hash, "compact block fully decompressed from cache");
                self.handle_local_full_block(hash, &block.bytes).await;
                Ok(())
            }
            DecompressionResult::Partial(partial) => {
                let missing = partial.missing_indices.clone();
                self.recovery_registry
                    .lock()
                    .expect("recovery registry lock poisoned")
                    .insert(
                        hash,
                        compact.block_header,
                        partial,
                        Duration::from_millis(self.config.recovery_deadline_ms),
                    );
                warn!(%hash, missing = missing.len(), "compact block partially decompressed, requesting recovery");
                self.recovery_service.request(hash, &missing).await;
                Ok(())
            }
        }
    }

    /// Completes a pending recovery with out-of-band fetched transactions
    /// (§4.4, §4.5 `AWAITING_RECOVERY → RESOLVED`).
    pub async fn handle_recovery_completed(&self, hash: BlockHash, recovered_transactions: &[Vec<u8>]) -> Result<()> {
        let result = self
            .recovery_registry
            .lock()
            .expect("recovery registry lock poisoned")
            .complete(self.config.network_magic, &hash, recovered_transactions);

        match result {
            Ok(block) => {
                self.stats.record_recovery_completed();
                info!(%hash, "recovery completed, propagating reconstructed block");
                self.handle_local_full_block(hash, &block.bytes).await;
                Ok(())
            }
            Err(GatewayError::RecoveryMismatch { missing, recovered }) => {
                self.stats.record_recovery_mismatch();
                warn!(%hash, missing, recovered, "recovery transaction count mismatch");
                Err(GatewayError::RecoveryMismatch { missing, recovered })
            }
            Err(GatewayError::RecoveryNotPending { block_hash }) => {
                debug!(%hash, block_hash, "ignoring recovery completion for a hash with no pending entry (already resolved or cancelled)");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Sweeps and reports expired recoveries (§5 cancellation path 1).
    pub async fn sweep_expired_recoveries(&self, now: Instant) {
        let expired = self
            .recovery_registry
            .lock()
            .expect("recovery registry lock poisoned")
            .sweep_expired(now);

        for hash in expired {
            self.stats.record_recovery_timeout();
            warn!(%hash, "recovery deadline elapsed, abandoning partial reconstruction");
        }
    }

    /// Handles a full block arriving from the overlay (BDN), forwarding it
    /// to the local node after the same dedup check (§4.5's second data-flow
    /// direction: overlay → pipeline → local node).
    pub async fn handle_overlay_block(&self, hash: BlockHash, block_bytes: &[u8], source: Option<&PeerHandle>) -> Result<()> {
        self.stats.record_block_from_bdn();

        if self.seen_blocks.lock().expect("seen blocks lock poisoned").contains(&hash) {
            self.stats.record_block_ignored_seen();
            debug!(%hash, "ignoring already-seen block from overlay");
            return Ok(());
        }

        let cancelled = self
            .recovery_registry
            .lock()
            .expect("recovery registry lock poisoned")
            .cancel(&hash);
        if cancelled {
            debug!(%hash, "cancelled pending recovery: overlay delivered the block first");
        }

        self.seen_blocks.lock().expect("seen blocks lock poisoned").insert(hash);
        self.local_node.send_to_local_node(block_bytes).await?;
        info!(%hash, from = source.map(|p| p.0.as_str()).unwrap_or("unknown"), "forwarded overlay block to local node");
        Ok(())
    }
}

/// Transaction dispatch (§4.6): converts local-node transactions to overlay
/// form, broadcasts them, and writes them into the transaction cache.
pub struct TransactionDispatcher<B, C> {
    converter: C,
    broadcaster: B,
    stats: std::sync::Arc<GatewayStats>,
}

impl<B, C> TransactionDispatcher<B, C>
where
    B: Broadcaster,
    C: TxMessageConverter,
{
    /// Builds a dispatcher from its collaborators and a shared stats handle.
    pub fn new(converter: C, broadcaster: B, stats: std::sync::Arc<GatewayStats>) -> Self {
        Self {
            converter,
            broadcaster,
            stats,
        }
    }

    /// Handles one inbound local-node transaction message, writing every
    /// resulting `(hash, tx_bytes)` pair into `tx_cache` after broadcasting.
    pub async fn handle_local_transaction(
        &self,
        local_tx_message: &[u8],
        source: Option<&PeerHandle>,
        tx_cache: &dyn TransactionCache,
    ) {
        self.stats.record_tx_from_node();

        for (overlay_tx_msg, tx_hash, tx_bytes) in self.converter.convert(local_tx_message) {
            self.broadcaster.broadcast(&overlay_tx_msg, source).await;
            tx_cache.insert(tx_hash, tx_bytes);
        }
    }
}
