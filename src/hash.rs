//! Hash value types.
//!
//! Bitcoin hashes are conventionally displayed (RPC, block explorers) in the
//! *reverse* of their internal wire byte order. The transaction cache's
//! external interface speaks display-order hex; short-ID computation needs
//! the internal (natural) byte order. See the module-level note in
//! [`crate::shortid`] for why both orderings are exposed here rather than
//! one being silently assumed.

use crate::error::{GatewayError, Result};

/// A 32-byte block hash in natural (wire) byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Returns the display-order (reversed) hex encoding, matching RPC convention.
    pub fn to_display_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }
}

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_hex())
    }
}

/// A 32-byte transaction hash.
///
/// The open question in the upstream source over which byte order is
/// "correct" for relays is left unresolved here by design: both orderings
/// are exposed as distinct, named conversions rather than picking one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Parses a display-order (reverse-byte) hex string, the convention used
    /// by the transaction cache's `enumerate_hashes` interface.
    pub fn from_display_hex(hex_str: &str) -> Result<Self> {
        let mut bytes = decode_hex32(hex_str)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Returns the display-order (reverse-byte) hex encoding.
    pub fn to_display_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Returns the natural (internal, non-reversed) byte order — the input
    /// required by short-ID computation (§4.2 of the core spec).
    pub fn natural_bytes(&self) -> [u8; 32] {
        self.0
    }
}

fn decode_hex32(hex_str: &str) -> Result<[u8; 32]> {
    let decoded = hex::decode(hex_str)
        .map_err(|e| GatewayError::MalformedCompactBlock(format!("invalid hex hash: {e}")))?;
    decoded.try_into().map_err(|v: Vec<u8>| {
        GatewayError::MalformedCompactBlock(format!("hash must be 32 bytes, got {}", v.len()))
    })
}
