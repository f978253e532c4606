//! Compact-block decompression/recovery engine and block/tx dispatch
//! pipeline for a Bitcoin-protocol gateway relay.
//!
//! This crate implements the core described in the gateway's design: it sits
//! between a single local Bitcoin node and an overlay relay network,
//! reconstructing BIP-152 compact blocks from a shared transaction cache and
//! dispatching full blocks and transactions between the two sides while
//! deduplicating already-seen blocks.
//!
//! Out of scope, by design: TCP connection management, the process-wide
//! event loop, the RPC surface, peer discovery/overlay routing, and the
//! block-encryption/neutrality service's internals — those are external
//! collaborators reached only through the traits in [`collaborators`].

pub mod collaborators;
pub mod compact_block;
pub mod config;
pub mod error;
pub mod hash;
pub mod pipeline;
pub mod recovery;
pub mod seen_blocks;
pub mod shortid;
pub mod stats;
pub mod tx_cache;
pub mod wire;

pub use collaborators::{Broadcaster, LocalNodeSink, NeutralityService, PeerHandle, RecoveryService};
pub use compact_block::{CompactBlock, DecompressionResult, PartialReconstruction, ReconstructedBlock};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use hash::{BlockHash, TxHash};
pub use pipeline::{BlockDispatchPipeline, TransactionDispatcher, TxMessageConverter};
pub use recovery::RecoveryRegistry;
pub use seen_blocks::SeenBlocks;
pub use shortid::{ShortId, SipKey};
pub use stats::{GatewayStats, GatewayStatsInterval};
pub use tx_cache::{InMemoryTransactionCache, TransactionCache};
