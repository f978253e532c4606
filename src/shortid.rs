//! BIP-152 short transaction ID computation.
//!
//! A short ID is the low 6 bytes of `SipHash-2-4(key, reversed_txid)`, where
//! `key` is the per-block [`SipKey`] derived in [`crate::compact_block`]. The
//! transaction cache hands us hashes in *display* byte order; we must reverse
//! once at this boundary to get the natural order SipHash expects — mixing
//! the two orders up silently turns into a 100% cache-miss regression rather
//! than a visible error, so the reversal happens in exactly one place
//! ([`TxHash::natural_bytes`](crate::hash::TxHash::natural_bytes)).

use std::collections::HashMap;
use std::hash::Hasher;

use siphasher::sip::SipHasher24;

use crate::compact_block::CompactBlock;
use crate::hash::TxHash;

/// 16-byte SipHash-2-4 key derived per compact block: the first 16 bytes of
/// `SHA256(block_header ‖ short_nonce)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SipKey(pub [u8; 16]);

impl SipKey {
    fn k0_k1(&self) -> (u64, u64) {
        let k0 = u64::from_le_bytes(self.0[0..8].try_into().unwrap());
        let k1 = u64::from_le_bytes(self.0[8..16].try_into().unwrap());
        (k0, k1)
    }
}

/// A 6-byte BIP-152 short transaction ID.
pub type ShortId = [u8; 6];

/// Computes the short ID of a transaction hash's natural byte order under `key`.
pub fn compute_short_id(key: &SipKey, tx_hash_natural: &[u8; 32]) -> ShortId {
    let (k0, k1) = key.k0_k1();
    let mut hasher = SipHasher24::new_with_keys(k0, k1);
    hasher.write(tx_hash_natural);
    let digest = hasher.finish();

    let mut short_id = [0u8; 6];
    short_id.copy_from_slice(&digest.to_le_bytes()[..6]);
    short_id
}

/// Builds the `short_id → tx_bytes` map restricted to short IDs referenced
/// by `compact_block`, from a snapshot enumeration of the transaction cache.
///
/// On a short-ID collision between two cached transactions, the first one
/// encountered in `cache_entries`' iteration order wins; the second is
/// dropped rather than overwriting. This matches §4.2's requirement that the
/// result be deterministic for a given enumeration order without ever
/// inserting both colliding entries.
pub fn map_short_ids<'a, I>(
    key: &SipKey,
    compact_block: &CompactBlock,
    cache_entries: I,
) -> HashMap<ShortId, Vec<u8>>
where
    I: IntoIterator<Item = (TxHash, &'a [u8])>,
{
    let wanted: std::collections::HashSet<ShortId> =
        compact_block.short_ids.iter().copied().collect();

    let mut result = HashMap::with_capacity(wanted.len());
    for (tx_hash, tx_bytes) in cache_entries {
        let short_id = compute_short_id(key, &tx_hash.natural_bytes());
        if wanted.contains(&short_id) && !result.contains_key(&short_id) {
            result.insert(short_id, tx_bytes.to_vec());
        }
    }
    result
}
