//! Gateway configuration.
//!
//! Follows the layered-struct-with-documented-defaults convention used
//! elsewhere in this codebase rather than scattering bare constants through
//! the pipeline.

use serde::{Deserialize, Serialize};

/// Mainnet network magic (`0xD9B4BEF9`, little-endian on the wire).
pub const MAINNET_MAGIC: u32 = 0xD9B4_BEF9;

/// Default capacity of the [`crate::seen_blocks::SeenBlocks`] FIFO dedup set.
pub const DEFAULT_SEEN_BLOCKS_CAPACITY: usize = 1024;

/// Default time a [`crate::recovery::RecoveryRegistry`] entry is kept before
/// it is abandoned and reported as [`crate::error::GatewayError::RecoveryTimeout`].
pub const DEFAULT_RECOVERY_DEADLINE_MS: u64 = 5_000;

/// Gateway-core configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Maximum number of block hashes tracked by [`crate::seen_blocks::SeenBlocks`]
    /// before the oldest entry is evicted.
    #[serde(default = "default_seen_blocks_capacity")]
    pub seen_blocks_capacity: usize,

    /// Milliseconds a partial reconstruction may wait for out-of-band
    /// recovery before it is abandoned.
    #[serde(default = "default_recovery_deadline_ms")]
    pub recovery_deadline_ms: u64,

    /// Four-byte constant identifying the Bitcoin network this gateway
    /// relays for (little-endian on the wire).
    #[serde(default = "default_network_magic")]
    pub network_magic: u32,
}

fn default_seen_blocks_capacity() -> usize {
    DEFAULT_SEEN_BLOCKS_CAPACITY
}

fn default_recovery_deadline_ms() -> u64 {
    DEFAULT_RECOVERY_DEADLINE_MS
}

fn default_network_magic() -> u32 {
    MAINNET_MAGIC
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            seen_blocks_capacity: DEFAULT_SEEN_BLOCKS_CAPACITY,
            recovery_deadline_ms: DEFAULT_RECOVERY_DEADLINE_MS,
            network_magic: MAINNET_MAGIC,
        }
    }
}
