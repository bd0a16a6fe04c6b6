//! Payload masking for Draft-07+ frames.
//!
//! The payload is XORed with a 4-byte key that cycles every four bytes.
//! Masking and unmasking are the same operation.

/// Scalar byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking.
///
/// Produces the same output as [`apply_mask`] but processes four bytes per
/// step, which matters for the multi-megabyte frames Draft-07+ allows.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    // The tail starts on a 4-byte boundary, so the key phase restarts at 0.
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc_hello_mask() {
        // RFC 6455 section 5.7
        let mut data = [0x7f, 0x9f, 0x4d, 0x51, 0x58];
        apply_mask(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
        assert_eq!(&data, b"Hello");
    }

    #[test]
    fn test_fast_matches_scalar() {
        let mask = [0xde, 0xad, 0xbe, 0xef];
        for len in 0..40 {
            let original: Vec<u8> = (0..len as u8).collect();
            let mut a = original.clone();
            let mut b = original.clone();
            apply_mask(&mut a, mask);
            apply_mask_fast(&mut b, mask);
            assert_eq!(a, b, "length {len}");
        }
    }

    #[test]
    fn test_mask_is_involution() {
        let mask = [1, 2, 3, 4];
        let mut data = b"round and round".to_vec();
        apply_mask_fast(&mut data, mask);
        assert_ne!(data, b"round and round");
        apply_mask_fast(&mut data, mask);
        assert_eq!(data, b"round and round");
    }

    #[test]
    fn test_empty_payload() {
        let mut data: [u8; 0] = [];
        apply_mask_fast(&mut data, [9, 9, 9, 9]);
    }
}
