//! Payload masking (RFC 6455 Section 5.3)
//!
//! Every call starts the key rotation at byte 0 of the slice it is given.
//! Callers that mask one frame across several slices rotate the key with
//! [`rotate_key`] to stay aligned with the frame offset.

use bytes::{BufMut, Bytes, BytesMut};

/// XOR `buf` in place with the big-endian bytes of `key`, cycling every 4 bytes.
///
/// Applying the same key twice restores the original bytes.
pub fn apply_mask(key: u32, buf: &mut [u8]) {
    if key == 0 {
        return;
    }

    let mask = key.to_be_bytes();
    let mask_word = u32::from_ne_bytes(mask);

    let mut chunks = buf.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_word;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    for (byte, m) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= m;
    }
}

/// Key to use for a slice that starts `offset` bytes into a masked payload.
pub fn rotate_key(key: u32, offset: u64) -> u32 {
    key.rotate_left((offset % 4) as u32 * 8)
}

/// Build a single buffer holding `header` followed by `payload` masked with `key`.
pub fn merge_and_mask(key: u32, header: &[u8], payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(header.len() + payload.len());
    buf.put_slice(header);
    buf.put_slice(payload);
    apply_mask(key, &mut buf[header.len()..]);
    buf.freeze()
}
