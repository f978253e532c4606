//! Property tests for compact-block reconstruction invariants (P1-P6).

use std::collections::HashMap;

use proptest::prelude::*;

use bxgateway_core::compact_block::{self, CompactBlock, DecompressionResult};
use bxgateway_core::recovery;
use bxgateway_core::seen_blocks::SeenBlocks;
use bxgateway_core::shortid::{self, SipKey};
use bxgateway_core::wire;
use bxgateway_core::BlockHash;

const MAGIC: u32 = 0xD9B4_BEF9;

fn arb_tx_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..32)
}

/// Builds a compact block from a set of transactions, splitting them into
/// prefilled and short-ID slots according to `prefilled_mask`, and returns
/// the expected full-block payload alongside it.
fn build_compact_block(
    header: [u8; 80],
    nonce: u64,
    transactions: &[Vec<u8>],
    prefilled_mask: &[bool],
) -> (CompactBlock, Vec<u8>) {
    let key = compact_block::derive_sip_key(&header, nonce);
    let mut short_ids = Vec::new();
    let mut prefilled = Vec::new();

    for (index, tx) in transactions.iter().enumerate() {
        if prefilled_mask[index] {
            prefilled.push((index, tx.clone()));
        } else {
            // The fake "hash" here is just the tx bytes padded/truncated to 32 bytes;
            // this is purely a test fixture, not a real txid.
            let mut fake_hash = [0u8; 32];
            let n = tx.len().min(32);
            fake_hash[..n].copy_from_slice(&tx[..n]);
            short_ids.push(shortid::compute_short_id(&key, &fake_hash));
        }
    }

    let compact = CompactBlock {
        block_header: header,
        short_nonce: nonce,
        short_ids,
        prefilled,
    };

    let mut expected_payload = Vec::new();
    expected_payload.extend_from_slice(&header);
    expected_payload.extend_from_slice(&wire::encode_varint(transactions.len() as u64));
    for tx in transactions {
        expected_payload.extend_from_slice(tx);
    }

    (compact, expected_payload)
}

/// Builds the cache entries needed to fully resolve `compact` back to
/// `transactions`, keyed by the same fake hash scheme `build_compact_block` used.
fn cache_entries_for(transactions: &[Vec<u8>], prefilled_mask: &[bool]) -> Vec<([u8; 32], Vec<u8>)> {
    transactions
        .iter()
        .zip(prefilled_mask)
        .filter(|(_, is_prefilled)| !**is_prefilled)
        .map(|(tx, _)| {
            let mut fake_hash = [0u8; 32];
            let n = tx.len().min(32);
            fake_hash[..n].copy_from_slice(&tx[..n]);
            (fake_hash, tx.clone())
        })
        .collect()
}

proptest! {
    /// P1: round-trip — decompressing a compact block built from `B` with a
    /// fully-populated cache reproduces `B` byte-for-byte.
    #[test]
    fn p1_round_trip(
        header in any::<[u8; 80]>(),
        nonce in any::<u64>(),
        transactions in proptest::collection::vec(arb_tx_bytes(), 1..8),
    ) {
        let prefilled_mask: Vec<bool> = (0..transactions.len()).map(|i| i % 3 == 0).collect();
        let (compact, expected_payload) = build_compact_block(header, nonce, &transactions, &prefilled_mask);

        let key = compact_block::derive_sip_key(&header, nonce);
        let raw_cache = cache_entries_for(&transactions, &prefilled_mask);
        let cache_map: HashMap<[u8; 32], Vec<u8>> = raw_cache.into_iter().collect();

        // Build sid_to_tx directly since the fake hashes aren't real TxHash display hex.
        let mut sid_to_tx = HashMap::new();
        for (fake_hash, tx_bytes) in &cache_map {
            let sid = shortid::compute_short_id(&key, fake_hash);
            sid_to_tx.insert(sid, tx_bytes.clone());
        }

        let result = compact_block::decompress(MAGIC, &compact, &sid_to_tx).unwrap();
        match result {
            DecompressionResult::Complete(block) => {
                prop_assert_eq!(block.payload(), expected_payload.as_slice());
            }
            DecompressionResult::Partial(p) => {
                prop_assert!(false, "expected complete reconstruction, got partial with missing {:?}", p.missing_indices);
            }
        }
    }

    /// P2: envelope validity — checksum and length fields always match the payload.
    #[test]
    fn p2_envelope_validity(
        header in any::<[u8; 80]>(),
        nonce in any::<u64>(),
        coinbase in arb_tx_bytes(),
    ) {
        let compact = CompactBlock {
            block_header: header,
            short_nonce: nonce,
            short_ids: vec![],
            prefilled: vec![(0, coinbase)],
        };

        let DecompressionResult::Complete(block) = compact_block::decompress(MAGIC, &compact, &HashMap::new()).unwrap() else {
            prop_assert!(false, "expected complete reconstruction");
            return Ok(());
        };

        let payload = block.payload();
        let checksum = wire::btc_checksum(payload);
        prop_assert_eq!(&block.bytes[20..24], &checksum);
        let payload_len = u32::from_le_bytes(block.bytes[16..20].try_into().unwrap());
        prop_assert_eq!(payload_len as usize, payload.len());
    }

    /// P3: slot accounting — slot count and missing-index list are internally consistent.
    #[test]
    fn p3_slot_accounting(
        header in any::<[u8; 80]>(),
        nonce in any::<u64>(),
        transactions in proptest::collection::vec(arb_tx_bytes(), 1..8),
        drop_every_other in any::<bool>(),
    ) {
        let prefilled_mask: Vec<bool> = (0..transactions.len()).map(|i| i == 0).collect();
        let (compact, _) = build_compact_block(header, nonce, &transactions, &prefilled_mask);

        let key = compact_block::derive_sip_key(&header, nonce);
        let raw_cache = cache_entries_for(&transactions, &prefilled_mask);

        let mut sid_to_tx = HashMap::new();
        for (i, (fake_hash, tx_bytes)) in raw_cache.into_iter().enumerate() {
            let keep = if drop_every_other { i % 2 == 0 } else { true };
            if keep {
                let sid = shortid::compute_short_id(&key, &fake_hash);
                sid_to_tx.insert(sid, tx_bytes);
            }
        }

        let result = compact_block::decompress(MAGIC, &compact, &sid_to_tx).unwrap();
        if let DecompressionResult::Partial(partial) = result {
            prop_assert_eq!(partial.slots.len(), compact.total_slots());
            let computed_missing: Vec<usize> = partial
                .slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_none())
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(partial.missing_indices, computed_missing);
        }
    }

    /// P4: short-ID determinism — identical key and enumeration order always
    /// produce the same mapping.
    #[test]
    fn p4_short_id_determinism(key_bytes in any::<[u8; 16]>(), tx_hash in any::<[u8; 32]>()) {
        let key = SipKey(key_bytes);
        let a = shortid::compute_short_id(&key, &tx_hash);
        let b = shortid::compute_short_id(&key, &tx_hash);
        prop_assert_eq!(a, b);
    }

    /// P5: seen-blocks dedup — an inserted hash is never re-inserted until evicted.
    #[test]
    fn p5_seen_blocks_dedup(hash_byte in any::<u8>(), capacity in 1usize..8) {
        let mut seen = SeenBlocks::new(capacity);
        let hash = BlockHash([hash_byte; 32]);
        prop_assert!(seen.insert(hash));
        prop_assert!(!seen.insert(hash));
        prop_assert!(seen.contains(&hash));
    }

    /// P6: recovery idempotence — resolving the same partial twice yields
    /// identical bytes.
    #[test]
    fn p6_recovery_idempotence(
        header in any::<[u8; 80]>(),
        coinbase in arb_tx_bytes(),
        recovered in arb_tx_bytes(),
    ) {
        let compact = CompactBlock {
            block_header: header,
            short_nonce: 1,
            short_ids: vec![[1; 6]],
            prefilled: vec![(0, coinbase)],
        };

        let DecompressionResult::Partial(partial) = compact_block::decompress(MAGIC, &compact, &HashMap::new()).unwrap() else {
            prop_assert!(false, "expected partial reconstruction");
            return Ok(());
        };

        let a = recovery::resolve(MAGIC, &header, &partial, &[recovered.clone()]).unwrap();
        let b = recovery::resolve(MAGIC, &header, &partial, &[recovered]).unwrap();
        prop_assert_eq!(a, b);
    }
}
