//! Deterministic seed generation.
//!
//! The seed string is hashed with a fixed-key `SipHash-1-3` to a 64-bit
//! state that keys a `ChaCha8` stream. Both are portable, so the same
//! string yields the same seeds on every platform and every run.

use std::hash::Hasher;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use siphasher::sip::SipHasher13;

use crate::types::{Dimensions, Point, SeedPoint, SeedStrategy};

const HASH_KEY_0: u64 = 0x6d6f_7361_6963_2d30;
const HASH_KEY_1: u64 = 0x7365_6564_732d_3031;

/// A deterministic pseudo-random stream keyed by a string.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Create a stream keyed by `seed`.
    #[must_use]
    pub fn new(seed: &str) -> Self {
        let mut hasher = SipHasher13::new_with_keys(HASH_KEY_0, HASH_KEY_1);
        hasher.write(seed.as_bytes());
        Self {
            rng: ChaCha8Rng::seed_from_u64(hasher.finish()),
        }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}

/// Number of seeds for an image of the given size.
///
/// The count is `round(density * normalized_area)`, where the normalized
/// area depends on `strategy`:
///
/// - [`SeedStrategy::Aspect`]: `width / height`
/// - [`SeedStrategy::MaxAspect`]: `max(width, height) / min(width, height)`
///
/// Degenerate dimensions or densities yield zero.
#[must_use = "returns the seed count without side effects"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn compute_seed_count(dimensions: Dimensions, density: f64, strategy: SeedStrategy) -> usize {
    if dimensions.width == 0 || dimensions.height == 0 {
        return 0;
    }
    let w = f64::from(dimensions.width);
    let h = f64::from(dimensions.height);
    let area = match strategy {
        SeedStrategy::Aspect => w / h,
        SeedStrategy::MaxAspect => w.max(h) / w.min(h),
    };
    let count = (density * area).round();
    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

/// Draw `count` normalized seeds from the stream keyed by `seed`.
///
/// Each seed consumes two draws, x then y, in index order.
#[must_use = "returns the generated seeds without side effects"]
pub fn generate_seeds(count: usize, seed: &str) -> Vec<SeedPoint> {
    let mut rng = SeededRandom::new(seed);
    (0..count)
        .map(|_| {
            let x01 = rng.next_f64();
            let y01 = rng.next_f64();
            SeedPoint { x01, y01 }
        })
        .collect()
}

/// Scale normalized seeds to pixel coordinates.
#[must_use = "returns the scaled seeds without side effects"]
pub fn seeds_to_pixels(seeds: &[SeedPoint], dimensions: Dimensions) -> Vec<Point> {
    let w = f64::from(dimensions.width);
    let h = f64::from(dimensions.height);
    seeds
        .iter()
        .map(|s| Point::new(s.x01 * w, s.y01 * h))
        .collect()
}
