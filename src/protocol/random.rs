//! Random sources for handshake credentials and frame masks.
//!
//! Everything random in the engine (the Draft-07+ client key, the Draft-76
//! key pair and challenge bytes, per-frame mask keys) is drawn from a
//! [`RandomSource`] handed in by the caller, so tests can replay exact bytes.

/// A source of random bytes.
pub trait RandomSource {
    /// Fill `dest` with random bytes.
    fn fill(&mut self, dest: &mut [u8]);

    /// Next random `u32`.
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill(&mut buf);
        u32::from_le_bytes(buf)
    }

    /// Random value in `low..=high`. Returns `low` when the range is empty.
    fn range_inclusive(&mut self, low: u32, high: u32) -> u32 {
        if low >= high {
            return low;
        }
        let span = u64::from(high - low) + 1;
        low + (u64::from(self.next_u32()) % span) as u32
    }

    /// Fresh 4-byte mask key for one outgoing client frame.
    fn mask_key(&mut self) -> [u8; 4] {
        let mut key = [0u8; 4];
        self.fill(&mut key);
        key
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn fill(&mut self, dest: &mut [u8]) {
        (**self).fill(dest);
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn fill(&mut self, dest: &mut [u8]) {
        (**self).fill(dest);
    }
}

/// Operating-system randomness via `getrandom`.
///
/// If the OS source fails, falls back to a [`SeededRandom`] seeded from the
/// system clock rather than aborting the connection.
#[derive(Debug, Default)]
pub struct OsRandom {
    fallback: Option<SeededRandom>,
}

impl OsRandom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RandomSource for OsRandom {
    fn fill(&mut self, dest: &mut [u8]) {
        if getrandom::getrandom(dest).is_ok() {
            return;
        }
        tracing::warn!("OS random source failed, using clock-seeded generator");
        self.fallback
            .get_or_insert_with(|| {
                use std::time::{SystemTime, UNIX_EPOCH};
                let seed = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0x1234_5678);
                SeededRandom::new(seed)
            })
            .fill(dest);
    }
}

/// Deterministic generator (splitmix-style mixing of a counter).
///
/// Not cryptographically secure. Intended for tests and for replaying a
/// recorded session.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

impl RandomSource for SeededRandom {
    fn fill(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
