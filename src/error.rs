//! Gateway core error types.

use thiserror::Error;

/// Errors produced by the compact-block reconstruction and dispatch core.
///
/// All variants are recovered locally by callers — a malformed peer message
/// never aborts the process. Only [`GatewayError::ChecksumMismatch`] signals
/// an implementation bug (the core checksummed its own assembled bytes).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// A compact block carried a duplicate or out-of-range prefilled index,
    /// or its buffer was truncated before decoding completed.
    #[error("malformed compact block: {0}")]
    MalformedCompactBlock(String),

    /// The checksum of a just-assembled block payload did not match the
    /// checksum recorded in its own envelope. Indicates an assembly bug.
    #[error("checksum mismatch on assembled block {block_hash}")]
    ChecksumMismatch {
        /// Hex-encoded hash of the block whose self-check failed.
        block_hash: String,
    },

    /// The recovery resolver was handed a different number of recovered
    /// transactions than there were missing slot indices.
    #[error("recovery mismatch: {missing} missing indices, {recovered} recovered transactions")]
    RecoveryMismatch {
        /// Number of missing slot indices in the partial reconstruction.
        missing: usize,
        /// Number of transactions the caller supplied.
        recovered: usize,
    },

    /// A pending recovery's deadline elapsed before the missing transactions
    /// arrived.
    #[error("recovery timed out for block {block_hash}")]
    RecoveryTimeout {
        /// Hex-encoded hash of the block whose recovery expired.
        block_hash: String,
    },

    /// No pending recovery was registered for the given block hash.
    #[error("no recovery pending for block {block_hash}")]
    RecoveryNotPending {
        /// Hex-encoded hash of the block that was looked up.
        block_hash: String,
    },

    /// The destination's outbound queue is full; the caller should enqueue
    /// and retry rather than treat this as fatal.
    #[error("send queue full for destination {destination}")]
    SendQueueFull {
        /// Description of the backpressured destination (peer, local node, ...).
        destination: String,
    },
}

/// Result alias used throughout the gateway core.
pub type Result<T> = std::result::Result<T, GatewayError>;
