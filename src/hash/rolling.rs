// Polynomial rolling hash over a fixed window.
//
// h(b0..bW) = b0*257^(W-1) + b1*257^(W-2) + ... + b(W-1)   (mod 2^23)
//
// The first two bytes are combined without reduction; every following byte
// is folded in with `(h * 257 + b) mod 2^23`.  Sliding the window by one
// byte costs one table lookup and one modular multiply-add, using a
// per-window removal table:
//
//   removal[b] = -(b * 257^(W-1)) mod 2^23
//   next       = ((old + removal[dropped]) * 257 + added) mod 2^23

use crate::error::MatchError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Polynomial multiplier.
pub const HASH_MULT: u32 = 257;

/// Hash modulus (2^23).  All hash values are strictly below this.
pub const HASH_BASE: u32 = 1 << 23;

/// Smallest window the hash accepts.  Windows of 1 or 2 bytes are rejected.
pub const MIN_WINDOW: usize = 3;

#[inline(always)]
const fn mod_base(v: u32) -> u32 {
    v & (HASH_BASE - 1)
}

// ---------------------------------------------------------------------------
// RollingHash
// ---------------------------------------------------------------------------

/// Fixed-window rolling hash with O(1) slide.
///
/// Stateless with respect to the data: `hash()` is a pure function of the
/// window bytes, and `update()` maps one window hash to the next.  The only
/// state is the window width and its precomputed removal table.
#[derive(Clone)]
pub struct RollingHash {
    window: usize,
    /// `257^(window-1) mod 2^23`.
    multiplier: u32,
    /// Contribution removed when a byte leaves the window.
    removal: [u32; 256],
}

impl RollingHash {
    /// Build the hash for a window of `window` bytes.
    ///
    /// Fails with [`MatchError::InvalidWindow`] when `window <= 2`.
    pub fn new(window: usize) -> Result<Self, MatchError> {
        if window < MIN_WINDOW {
            return Err(MatchError::InvalidWindow { window });
        }

        let mut multiplier: u32 = 1;
        for _ in 0..window - 1 {
            multiplier = mod_base(multiplier.wrapping_mul(HASH_MULT));
        }

        let mut removal = [0u32; 256];
        let mut byte_multiplier: u32 = 0;
        for slot in removal.iter_mut() {
            *slot = mod_base(0u32.wrapping_sub(byte_multiplier));
            byte_multiplier = mod_base(byte_multiplier.wrapping_add(multiplier));
        }

        Ok(Self {
            window,
            multiplier,
            removal,
        })
    }

    /// Window width in bytes.
    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    /// `257^(window-1) mod 2^23`.
    #[inline]
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Removal-table entry for `byte`.
    #[inline]
    pub fn removal(&self, byte: u8) -> u32 {
        self.removal[byte as usize]
    }

    /// Hash of `bytes[..window]`.
    ///
    /// `bytes` must hold at least `window` bytes.
    #[inline]
    pub fn hash(&self, bytes: &[u8]) -> u32 {
        let win = &bytes[..self.window];
        let mut h = u32::from(win[0]) * HASH_MULT + u32::from(win[1]);
        for &b in &win[2..] {
            h = mod_base(h.wrapping_mul(HASH_MULT).wrapping_add(u32::from(b)));
        }
        h
    }

    /// Slide the window one byte to the right.
    ///
    /// `dropped` is the first byte of the current window, `added` the byte
    /// just past its end.  For any buffer `p` and valid `i`:
    /// `update(hash(&p[i..]), p[i], p[i + window]) == hash(&p[i + 1..])`.
    #[inline(always)]
    pub fn update(&self, old: u32, dropped: u8, added: u8) -> u32 {
        let h = mod_base(old.wrapping_add(self.removal[dropped as usize]));
        mod_base(h.wrapping_mul(HASH_MULT).wrapping_add(u32::from(added)))
    }

    /// Roll from the window at `pos` to the window at `pos + 1` in `data`.
    ///
    /// `data` must contain `pos + window` (the incoming byte).
    #[inline(always)]
    pub fn roll(&self, old: u32, data: &[u8], pos: usize) -> u32 {
        self.update(old, data[pos], data[pos + self.window])
    }
}

impl std::fmt::Debug for RollingHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingHash")
            .field("window", &self.window)
            .field("multiplier", &self.multiplier)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn lowercase(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random_range(b'a'..=b'z')).collect()
    }

    #[test]
    fn rejects_tiny_windows() {
        for w in 0..MIN_WINDOW {
            assert!(matches!(
                RollingHash::new(w),
                Err(MatchError::InvalidWindow { window }) if window == w
            ));
        }
        assert!(RollingHash::new(MIN_WINDOW).is_ok());
    }

    #[test]
    fn multiplier_matches_power() {
        let rh = RollingHash::new(4).unwrap();
        assert_eq!(rh.multiplier(), 257 * 257 * 257 % HASH_BASE);
        assert_eq!(rh.removal(0), 0);
        assert_eq!(
            rh.removal(1),
            (HASH_BASE - rh.multiplier()) % HASH_BASE,
            "removal[1] must be the additive inverse of the multiplier"
        );
    }

    #[test]
    fn hash_matches_direct_polynomial() {
        let rh = RollingHash::new(5).unwrap();
        let data = b"hello";
        let mut expected: u64 = 0;
        for &b in data {
            expected = (expected * 257 + u64::from(b)) % u64::from(HASH_BASE);
        }
        assert_eq!(u64::from(rh.hash(data)), expected);
    }

    #[test]
    fn hash_only_reads_window() {
        let rh = RollingHash::new(3).unwrap();
        assert_eq!(rh.hash(b"abcXYZ"), rh.hash(b"abc"));
    }

    #[test]
    fn values_stay_below_base() {
        let rh = RollingHash::new(16).unwrap();
        let data = vec![0xFFu8; 64];
        let mut h = rh.hash(&data);
        assert!(h < HASH_BASE);
        for i in 0..data.len() - 16 {
            h = rh.roll(h, &data, i);
            assert!(h < HASH_BASE);
        }
    }

    #[test]
    fn rolling_equivalence_window_3() {
        // Same shape as the classic test: window 3, 10_000 blocks of letters.
        let rh = RollingHash::new(3).unwrap();
        let data = lowercase(3 * 10_000, 11);
        let mut h = rh.hash(&data);
        for i in 0..data.len() - 3 {
            assert_eq!(h, rh.hash(&data[i..]), "mismatch at offset {i}");
            h = rh.update(h, data[i], data[i + 3]);
        }
    }

    #[test]
    fn rolling_equivalence_binary_many_windows() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut data = vec![0u8; 4096];
        rng.fill(&mut data[..]);
        for w in [3usize, 4, 7, 16, 31, 64, 257] {
            let rh = RollingHash::new(w).unwrap();
            let mut h = rh.hash(&data);
            for i in 0..data.len() - w {
                h = rh.roll(h, &data, i);
                assert_eq!(h, rh.hash(&data[i + 1..]), "window {w}, offset {i}");
            }
        }
    }

    #[test]
    fn high_bytes_are_unsigned() {
        // Bytes >= 0x80 must index the removal table as unsigned values.
        let rh = RollingHash::new(4).unwrap();
        let data = [0x80u8, 0xFF, 0x81, 0xFE, 0x90, 0x00];
        let mut h = rh.hash(&data);
        for i in 0..2 {
            h = rh.roll(h, &data, i);
            assert_eq!(h, rh.hash(&data[i + 1..]));
        }
    }
}
