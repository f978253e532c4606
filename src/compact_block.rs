//! Compact block decompression (§4.3).
//!
//! Reconstructs a full Bitcoin `block` wire message from a BIP-152 compact
//! block plus whatever transactions the local cache already holds, falling
//! back to a [`PartialReconstruction`] naming the slots still missing.

use sha2::{Digest, Sha256};

use crate::error::{GatewayError, Result};
use crate::hash::TxHash;
use crate::shortid::{self, ShortId, SipKey};
use crate::wire::{self, BLOCK_COMMAND};

/// 80-byte Bitcoin block header.
pub type BlockHeader = [u8; 80];

/// A BIP-152 compact block, already decoded down to absolute prefilled
/// indices by the message layer (see §6: differential-index decoding is not
/// this core's concern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactBlock {
    /// 80-byte block header.
    pub block_header: BlockHeader,
    /// Nonce used to derive the per-block SipHash key, little-endian on the wire.
    pub short_nonce: u64,
    /// Short IDs, in block order (excluding prefilled slots).
    pub short_ids: Vec<ShortId>,
    /// `(absolute_index, tx_bytes)` pairs, in strictly increasing index order.
    pub prefilled: Vec<(usize, Vec<u8>)>,
}

impl CompactBlock {
    /// Total slot count: `len(prefilled) + len(short_ids)`.
    pub fn total_slots(&self) -> usize {
        self.prefilled.len() + self.short_ids.len()
    }

    fn validate(&self) -> Result<()> {
        let total = self.total_slots();
        let mut last_index: Option<usize> = None;
        for (index, _) in &self.prefilled {
            if *index >= total {
                return Err(GatewayError::MalformedCompactBlock(format!(
                    "prefilled index {index} out of range for {total} total slots"
                )));
            }
            if let Some(last) = last_index {
                if *index <= last {
                    return Err(GatewayError::MalformedCompactBlock(format!(
                        "prefilled indices must be strictly increasing: {last} then {index}"
                    )));
                }
            }
            last_index = Some(*index);
        }
        Ok(())
    }
}

/// The SipHash key derived for a single compact block:
/// `SHA256(block_header ‖ short_nonce)[0:16]`.
pub fn derive_sip_key(header: &BlockHeader, short_nonce: u64) -> SipKey {
    let mut hasher = Sha256::new();
    hasher.update(header);
    hasher.update(short_nonce.to_le_bytes());
    let digest = hasher.finalize();

    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    SipKey(key)
}

/// A fully assembled, byte-exact Bitcoin `block` wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedBlock {
    /// Complete wire bytes: 24-byte envelope ‖ header ‖ varint(tx_count) ‖ transactions.
    pub bytes: Vec<u8>,
}

impl ReconstructedBlock {
    /// The payload (everything after the 24-byte envelope).
    pub fn payload(&self) -> &[u8] {
        &self.bytes[wire::ENVELOPE_SIZE..]
    }
}

/// A decompression attempt that is missing one or more transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialReconstruction {
    /// One slot per transaction in block order; `None` where the
    /// transaction was not found in the cache.
    pub slots: Vec<Option<Vec<u8>>>,
    /// Ascending indices of the `None` slots.
    pub missing_indices: Vec<usize>,
}

/// Outcome of a decompression attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompressionResult {
    /// Every slot was filled; the block is ready to propagate.
    Complete(ReconstructedBlock),
    /// Some slots are missing; recovery must be requested for them.
    Partial(PartialReconstruction),
}

/// Attempts to reconstruct `compact_block` using the transactions in
/// `sid_to_tx` (the output of [`shortid::map_short_ids`]).
///
/// This function performs the slot-interleaving walk of §4.3 step 4: at each
/// absolute index, a prefilled entry takes priority over the next short ID
/// in sequence.
pub fn decompress(
    magic: u32,
    compact_block: &CompactBlock,
    sid_to_tx: &std::collections::HashMap<ShortId, Vec<u8>>,
) -> Result<DecompressionResult> {
    compact_block.validate()?;

    let total = compact_block.total_slots();
    let mut slots: Vec<Option<Vec<u8>>> = vec![None; total];
    let mut missing_indices = Vec::new();
    let mut short_cursor = 0usize;

    for index in 0..total {
        if let Some((_, tx_bytes)) = compact_block
            .prefilled
            .iter()
            .find(|(prefilled_index, _)| *prefilled_index == index)
        {
            slots[index] = Some(tx_bytes.clone());
            continue;
        }

        let short_id = compact_block.short_ids.get(short_cursor).ok_or_else(|| {
            GatewayError::MalformedCompactBlock(format!(
                "ran out of short ids at slot {index} of {total}"
            ))
        })?;
        short_cursor += 1;

        match sid_to_tx.get(short_id) {
            Some(tx_bytes) => slots[index] = Some(tx_bytes.clone()),
            None => missing_indices.push(index),
        }
    }

    if !missing_indices.is_empty() {
        return Ok(DecompressionResult::Partial(PartialReconstruction {
            slots,
            missing_indices,
        }));
    }

    assemble_block(magic, &compact_block.block_header, slots)
        .map(DecompressionResult::Complete)
}

/// Assembles a full block from a complete set of slots (no `None` entries),
/// producing the envelope + header + varint(tx_count) + transactions layout
/// described in §4.3 step 6. Shared by both the decompressor's happy path
/// and the recovery resolver.
pub(crate) fn assemble_block(
    magic: u32,
    header: &BlockHeader,
    slots: Vec<Option<Vec<u8>>>,
) -> Result<ReconstructedBlock> {
    let tx_count = slots.len() as u64;

    let mut payload = Vec::with_capacity(header.len() + wire::varint_size(tx_count) + 64);
    payload.extend_from_slice(header);
    payload.extend_from_slice(&wire::encode_varint(tx_count));

    for (index, slot) in slots.into_iter().enumerate() {
        let tx_bytes = slot.ok_or_else(|| {
            GatewayError::MalformedCompactBlock(format!("slot {index} unexpectedly empty at assembly time"))
        })?;
        payload.extend_from_slice(&tx_bytes);
    }

    let checksum = wire::btc_checksum(&payload);
    let env = wire::envelope(magic, BLOCK_COMMAND, payload.len() as u32, checksum)?;

    let recomputed = wire::btc_checksum(&payload);
    if recomputed != checksum {
        return Err(GatewayError::ChecksumMismatch {
            block_hash: hex::encode(checksum),
        });
    }

    let mut bytes = Vec::with_capacity(env.len() + payload.len());
    bytes.extend_from_slice(&env);
    bytes.extend_from_slice(&payload);

    Ok(ReconstructedBlock { bytes })
}

/// Convenience wrapper around [`shortid::map_short_ids`] plus [`decompress`]
/// for callers that have a raw cache snapshot rather than a pre-built map.
pub fn decompress_with_cache<'a, I>(
    magic: u32,
    compact_block: &CompactBlock,
    cache_entries: I,
) -> Result<DecompressionResult>
where
    I: IntoIterator<Item = (TxHash, &'a [u8])>,
{
    let key = derive_sip_key(&compact_block.block_header, compact_block.short_nonce);
    let sid_to_tx = shortid::map_short_ids(&key, compact_block, cache_entries);
    decompress(magic, compact_block, &sid_to_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MAGIC: u32 = 0xD9B4_BEF9;

    fn header() -> BlockHeader {
        [0x11u8; 80]
    }

    #[test]
    fn all_prefilled_block_assembles() {
        let coinbase = vec![0xAAu8; 10];
        let compact = CompactBlock {
            block_header: header(),
            short_nonce: 42,
            short_ids: vec![],
            prefilled: vec![(0, coinbase.clone())],
        };

        let result = decompress(MAGIC, &compact, &HashMap::new()).unwrap();
        match result {
            DecompressionResult::Complete(block) => {
                let mut expected_payload = Vec::new();
                expected_payload.extend_from_slice(&header());
                expected_payload.push(0x01);
                expected_payload.extend_from_slice(&coinbase);
                assert_eq!(block.payload(), expected_payload.as_slice());
            }
            DecompressionResult::Partial(_) => panic!("expected complete reconstruction"),
        }
    }

    #[test]
    fn fully_cached_block_assembles_in_slot_order() {
        let coinbase = vec![0xAAu8];
        let tx1 = vec![0xBBu8, 0xBB];
        let tx2 = vec![0xCCu8, 0xCC, 0xCC];

        let compact = CompactBlock {
            block_header: header(),
            short_nonce: 1,
            short_ids: vec![[1; 6], [2; 6]],
            prefilled: vec![(0, coinbase.clone())],
        };

        let mut sid_to_tx = HashMap::new();
        sid_to_tx.insert([1u8; 6], tx1.clone());
        sid_to_tx.insert([2u8; 6], tx2.clone());

        let result = decompress(MAGIC, &compact, &sid_to_tx).unwrap();
        match result {
            DecompressionResult::Complete(block) => {
                let mut expected_payload = Vec::new();
                expected_payload.extend_from_slice(&header());
                expected_payload.push(0x03);
                expected_payload.extend_from_slice(&coinbase);
                expected_payload.extend_from_slice(&tx1);
                expected_payload.extend_from_slice(&tx2);
                assert_eq!(block.payload(), expected_payload.as_slice());
            }
            DecompressionResult::Partial(_) => panic!("expected complete reconstruction"),
        }
    }

    #[test]
    fn one_missing_transaction_yields_partial() {
        let coinbase = vec![0xAAu8];
        let tx1 = vec![0xBBu8, 0xBB];

        let compact = CompactBlock {
            block_header: header(),
            short_nonce: 1,
            short_ids: vec![[1; 6], [2; 6]],
            prefilled: vec![(0, coinbase.clone())],
        };

        let mut sid_to_tx = HashMap::new();
        sid_to_tx.insert([1u8; 6], tx1.clone());

        let result = decompress(MAGIC, &compact, &sid_to_tx).unwrap();
        match result {
            DecompressionResult::Partial(partial) => {
                assert_eq!(partial.missing_indices, vec![2]);
                assert_eq!(partial.slots[0], Some(coinbase));
                assert_eq!(partial.slots[1], Some(tx1));
                assert_eq!(partial.slots[2], None);
            }
            DecompressionResult::Complete(_) => panic!("expected partial reconstruction"),
        }
    }

    #[test]
    fn duplicate_prefilled_index_is_malformed() {
        let compact = CompactBlock {
            block_header: header(),
            short_nonce: 1,
            short_ids: vec![],
            prefilled: vec![(0, vec![1]), (0, vec![2])],
        };

        assert!(matches!(
            decompress(MAGIC, &compact, &HashMap::new()),
            Err(GatewayError::MalformedCompactBlock(_))
        ));
    }

    #[test]
    fn out_of_range_prefilled_index_is_malformed() {
        let compact = CompactBlock {
            block_header: header(),
            short_nonce: 1,
            short_ids: vec![],
            prefilled: vec![(5, vec![1])],
        };

        assert!(matches!(
            decompress(MAGIC, &compact, &HashMap::new()),
            Err(GatewayError::MalformedCompactBlock(_))
        ));
    }

    #[test]
    fn envelope_is_self_consistent() {
        let compact = CompactBlock {
            block_header: header(),
            short_nonce: 1,
            short_ids: vec![],
            prefilled: vec![(0, vec![0xAA, 0xBB, 0xCC])],
        };

        let DecompressionResult::Complete(block) = decompress(MAGIC, &compact, &HashMap::new()).unwrap() else {
            panic!("expected complete reconstruction")
        };

        let payload = block.payload();
        let checksum = wire::btc_checksum(payload);
        assert_eq!(&block.bytes[20..24], &checksum);
        let payload_len = u32::from_le_bytes(block.bytes[16..20].try_into().unwrap());
        assert_eq!(payload_len as usize, payload.len());
    }
}
