//! Draft-76 challenge/response.
//!
//! The client sends two obfuscated keys in `Sec-WebSocket-Key1` and
//! `Sec-WebSocket-Key2` plus eight raw bytes after the header block. Each key
//! hides a 32-bit number: its digits, read as one integer, divided by the
//! number of spaces in the key. The server proves receipt by answering with
//! `md5(be32(n1) || be32(n2) || challenge)` as the response body.

use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::protocol::random::RandomSource;

/// Raw bytes the client sends after its header block.
pub const CHALLENGE_LEN: usize = 8;

/// Bytes of MD5 token the server sends after its header block.
pub const RESPONSE_LEN: usize = 16;

/// Recover the number hidden in a `Sec-WebSocket-Key1/2` value.
///
/// # Errors
///
/// `Error::InvalidHandshake` if the key has no digits, no spaces, a digit
/// run that overflows `u64`, a value not evenly divisible by the space
/// count, or a quotient that does not fit in 32 bits.
pub fn decode_key(key: &str) -> Result<u32> {
    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(Error::InvalidHandshake(format!("key has no digits: {key}")));
    }
    let number: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidHandshake(format!("key number overflows: {key}")))?;
    let spaces = key.chars().filter(|&c| c == ' ').count() as u64;
    if spaces == 0 {
        return Err(Error::InvalidHandshake(format!("key has no spaces: {key}")));
    }
    if number % spaces != 0 {
        return Err(Error::InvalidHandshake(format!(
            "key number {number} is not a multiple of {spaces} spaces"
        )));
    }
    u32::try_from(number / spaces)
        .map_err(|_| Error::InvalidHandshake(format!("key value exceeds 32 bits: {key}")))
}

/// MD5 token for two decoded key numbers and the challenge bytes.
#[must_use]
pub fn response_for_numbers(
    number1: u32,
    number2: u32,
    challenge: &[u8; CHALLENGE_LEN],
) -> [u8; RESPONSE_LEN] {
    let mut hasher = Md5::new();
    hasher.update(number1.to_be_bytes());
    hasher.update(number2.to_be_bytes());
    hasher.update(challenge);
    hasher.finalize().into()
}

/// Server-side token for the raw `Key1`/`Key2` header values.
///
/// # Errors
///
/// `Error::InvalidHandshake` if either key fails [`decode_key`].
pub fn compute_response(
    key1: &str,
    key2: &str,
    challenge: &[u8; CHALLENGE_LEN],
) -> Result<[u8; RESPONSE_LEN]> {
    Ok(response_for_numbers(
        decode_key(key1)?,
        decode_key(key2)?,
        challenge,
    ))
}

/// A generated client key and the number it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey {
    pub key: String,
    pub number: u32,
}

/// Characters a client may sprinkle into a key: U+0021-U+002F and U+003A-U+007E.
fn noise_char(index: u32) -> char {
    let byte = if index < 15 {
        0x21 + index as u8
    } else {
        0x3A + (index - 15) as u8
    };
    char::from(byte)
}

/// Generate one obfuscated key the way a Draft-76 client does.
pub fn generate_key<R: RandomSource + ?Sized>(rng: &mut R) -> ClientKey {
    let spaces = rng.range_inclusive(1, 12);
    let number = rng.range_inclusive(0, u32::MAX / spaces);
    let product = u64::from(number) * u64::from(spaces);

    let mut chars: Vec<char> = product.to_string().chars().collect();
    for _ in 0..rng.range_inclusive(1, 12) {
        let at = rng.range_inclusive(0, chars.len() as u32) as usize;
        chars.insert(at, noise_char(rng.range_inclusive(0, 83)));
    }
    for _ in 0..spaces {
        // Never first or last.
        let at = rng.range_inclusive(1, chars.len() as u32 - 1) as usize;
        chars.insert(at, ' ');
    }

    ClientKey {
        key: chars.into_iter().collect(),
        number,
    }
}

/// Eight random challenge bytes.
pub fn generate_challenge<R: RandomSource + ?Sized>(rng: &mut R) -> [u8; CHALLENGE_LEN] {
    let mut challenge = [0u8; CHALLENGE_LEN];
    rng.fill(&mut challenge);
    challenge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::random::SeededRandom;

    const KEY1: &str = "4 @1  46546xW%0l 1 5";
    const KEY2: &str = "12998 5 Y3 1  .P00";

    #[test]
    fn test_decode_sample_keys() {
        assert_eq!(decode_key(KEY1).unwrap(), 906_585_445);
        assert_eq!(decode_key(KEY2).unwrap(), 179_922_739);
    }

    #[test]
    fn test_sample_response() {
        let token = compute_response(KEY1, KEY2, b"^n:ds[4U").unwrap();
        assert_eq!(&token, b"8jKS'y:G*Co,Wxa-");
    }

    #[test]
    fn test_response_is_deterministic() {
        let a = compute_response(KEY1, KEY2, b"abcdefgh").unwrap();
        let b = compute_response(KEY1, KEY2, b"abcdefgh").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), RESPONSE_LEN);
    }

    #[test]
    fn test_zero_spaces_is_invalid() {
        assert!(matches!(
            decode_key("12345"),
            Err(Error::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_non_dividing_is_invalid() {
        assert!(matches!(
            decode_key("1 0 1"),
            Err(Error::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_no_digits_and_overflow_are_invalid() {
        assert!(decode_key(" abc ").is_err());
        assert!(decode_key("99999999999999999999999 ").is_err());
        // 2^32 with one space does not fit in 32 bits.
        assert!(decode_key("4294967296 ").is_err());
        assert_eq!(decode_key("4294967295 ").unwrap(), u32::MAX);
    }

    #[test]
    fn test_generated_keys_decode() {
        let mut rng = SeededRandom::new(0x76);
        for _ in 0..500 {
            let generated = generate_key(&mut rng);
            assert!(!generated.key.starts_with(' '));
            assert!(!generated.key.ends_with(' '));
            assert_eq!(decode_key(&generated.key).unwrap(), generated.number);
        }
    }

    #[test]
    fn test_noise_chars_are_not_digits_or_spaces() {
        for index in 0..84 {
            let c = noise_char(index);
            assert!(!c.is_ascii_digit(), "{c:?}");
            assert!(c.is_ascii_graphic(), "{c:?}");
        }
        assert_eq!(noise_char(0), '!');
        assert_eq!(noise_char(14), '/');
        assert_eq!(noise_char(15), ':');
        assert_eq!(noise_char(83), '~');
    }
}
