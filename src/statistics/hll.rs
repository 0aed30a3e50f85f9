//! HyperLogLog distinct value estimator.

use std::hash::Hash;

/// The default precision. A sketch with precision `p` uses `2^p` one-byte registers.
pub const DEFAULT_PRECISION: u8 = 14;

// Fixed seeds make estimates reproducible across runs.
const SEEDS: (u64, u64, u64, u64) = (0x5851_f42d, 0x4c95_7f2d, 0x1405_7b7e, 0xf767_814f);

/// Estimates the number of distinct values added to it.
#[derive(Debug, Clone)]
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
    hasher: ahash::RandomState,
}

impl Default for HyperLogLog {
    fn default() -> Self {
        HyperLogLog::new()
    }
}

impl HyperLogLog {
    /// Creates a sketch with the [default precision](self::DEFAULT_PRECISION).
    pub fn new() -> Self {
        HyperLogLog::with_precision(DEFAULT_PRECISION)
    }

    /// Creates a sketch with the given precision.
    ///
    /// # Panics
    ///
    /// This method panics if the precision is outside of `[4, 16]` range.
    pub fn with_precision(precision: u8) -> Self {
        assert!((4..=16).contains(&precision), "precision must be within [4, 16] but got {}", precision);
        HyperLogLog {
            precision,
            registers: vec![0; 1 << precision],
            hasher: ahash::RandomState::with_seeds(SEEDS.0, SEEDS.1, SEEDS.2, SEEDS.3),
        }
    }

    /// Adds the given value to this sketch.
    pub fn add<T: Hash + ?Sized>(&mut self, value: &T) {
        let x = self.hasher.hash_one(value) as u32;
        let p = self.precision as u32;
        let j = (x >> (32 - p)) as usize;
        let w = x << p;
        let rho = (w.leading_zeros() + 1).min(32 - p + 1) as u8;
        if self.registers[j] < rho {
            self.registers[j] = rho;
        }
    }

    /// Merges the registers of the given sketch into this one.
    ///
    /// # Panics
    ///
    /// This method panics if sketches have different precision.
    pub fn merge(&mut self, other: &HyperLogLog) {
        assert_eq!(self.precision, other.precision, "Unable to merge sketches of different precision");
        for (r, o) in self.registers.iter_mut().zip(other.registers.iter()) {
            *r = (*r).max(*o);
        }
    }

    /// Returns the estimated number of distinct values.
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let alpha = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };
        let sum: f64 = self.registers.iter().map(|r| 2f64.powi(-(*r as i32))).sum();
        let estimate = alpha * m * m / sum;

        if estimate <= 2.5 * m {
            let zeros = self.registers.iter().filter(|r| **r == 0).count();
            if zeros > 0 {
                return m * (m / zeros as f64).ln();
            }
        }

        let two_32 = 2f64.powi(32);
        if estimate > two_32 / 30.0 {
            -two_32 * (1.0 - estimate / two_32).ln()
        } else {
            estimate
        }
    }
}
