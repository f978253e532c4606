//! Bitcoin-family wire codec: envelopes, varints, and the double-SHA256
//! message checksum.

use sha2::{Digest, Sha256};

use crate::error::{GatewayError, Result};

/// Size, in bytes, of a Bitcoin message envelope (magic + command + length + checksum).
pub const ENVELOPE_SIZE: usize = 24;

/// Size, in bytes, of the zero-padded ASCII command field inside an envelope.
const COMMAND_FIELD_SIZE: usize = 12;

/// Command string used for assembled full-block messages.
pub const BLOCK_COMMAND: &str = "block";

/// Returns the encoded size, in bytes, of a Bitcoin `CompactSize` varint for `n`.
pub fn varint_size(n: u64) -> usize {
    if n < 0xFD {
        1
    } else if n <= 0xFFFF {
        3
    } else if n <= 0xFFFF_FFFF {
        5
    } else {
        9
    }
}

/// Writes `n` as a little-endian Bitcoin `CompactSize` varint into `buf` at `off`,
/// returning the number of bytes written.
///
/// Fails with [`GatewayError::MalformedCompactBlock`] if `buf` does not have
/// room for the encoding at `off`.
pub fn write_varint(buf: &mut [u8], off: usize, n: u64) -> Result<usize> {
    let size = varint_size(n);
    if buf.len() < off + size {
        return Err(GatewayError::MalformedCompactBlock(format!(
            "buffer too small to write varint: need {} bytes at offset {}, have {}",
            size,
            off,
            buf.len()
        )));
    }

    if n < 0xFD {
        buf[off] = n as u8;
    } else if n <= 0xFFFF {
        buf[off] = 0xFD;
        buf[off + 1..off + 3].copy_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xFFFF_FFFF {
        buf[off] = 0xFE;
        buf[off + 1..off + 5].copy_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf[off] = 0xFF;
        buf[off + 1..off + 9].copy_from_slice(&n.to_le_bytes());
    }

    Ok(size)
}

/// Encodes `n` as a standalone little-endian Bitcoin `CompactSize` varint.
pub fn encode_varint(n: u64) -> Vec<u8> {
    let mut buf = vec![0u8; varint_size(n)];
    write_varint(&mut buf, 0, n).expect("buffer sized by varint_size");
    buf
}

/// Computes the Bitcoin message checksum: the first four bytes of
/// `SHA256(SHA256(payload))`.
pub fn btc_checksum(payload: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&second[..4]);
    checksum
}

/// Builds a 24-byte Bitcoin message envelope: `<u32 magic><12-byte ASCII
/// command><u32 payload_len><4-byte checksum>`, all integers little-endian.
pub fn envelope(magic: u32, command: &str, payload_len: u32, checksum: [u8; 4]) -> Result<[u8; ENVELOPE_SIZE]> {
    if command.len() > COMMAND_FIELD_SIZE {
        return Err(GatewayError::MalformedCompactBlock(format!(
            "command '{command}' exceeds {COMMAND_FIELD_SIZE} bytes"
        )));
    }

    let mut out = [0u8; ENVELOPE_SIZE];
    out[0..4].copy_from_slice(&magic.to_le_bytes());

    let mut command_bytes = [0u8; COMMAND_FIELD_SIZE];
    command_bytes[..command.len()].copy_from_slice(command.as_bytes());
    out[4..16].copy_from_slice(&command_bytes);

    out[16..20].copy_from_slice(&payload_len.to_le_bytes());
    out[20..24].copy_from_slice(&checksum);

    Ok(out)
}
