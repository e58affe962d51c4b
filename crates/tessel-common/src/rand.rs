pub use rand::{Rng, SeedableRng, rngs::StdRng};

use half::{bf16, f16};

use crate::Element;

/// Returns a seeded random number generator using entropy.
#[cfg(feature = "std")]
#[inline(always)]
pub fn get_seeded_rng() -> StdRng {
    StdRng::from_os_rng()
}

/// Returns a random number generator with a fixed seed, for reproducible data.
#[inline(always)]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Elements that can be sampled for test and benchmark inputs.
///
/// Integers are drawn from a small symmetric range so sums over long reductions stay exact.
pub trait Sample: Element {
    /// Draws one value.
    fn sample(rng: &mut StdRng) -> Self;
}

impl Sample for i8 {
    fn sample(rng: &mut StdRng) -> Self {
        rng.random_range(-16i8..=16)
    }
}

impl Sample for f16 {
    fn sample(rng: &mut StdRng) -> Self {
        f16::from_f32(rng.random_range(-1.0f32..1.0))
    }
}

impl Sample for bf16 {
    fn sample(rng: &mut StdRng) -> Self {
        bf16::from_f32(rng.random_range(-1.0f32..1.0))
    }
}

impl Sample for f32 {
    fn sample(rng: &mut StdRng) -> Self {
        rng.random_range(-1.0f32..1.0)
    }
}

/// Generates `len` random elements from a fixed seed.
pub fn random_vec<E: Sample>(len: usize, seed: u64) -> Vec<E> {
    let mut rng = seeded_rng(seed);
    (0..len).map(|_| E::sample(&mut rng)).collect()
}

/// Generates `len` positive scale factors around one, from a fixed seed.
pub fn random_scales<E: Element>(len: usize, seed: u64) -> Vec<E> {
    let mut rng = seeded_rng(seed);
    (0..len)
        .map(|_| E::from_f32(rng.random_range(0.5f32..1.5)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn same_seed_gives_same_data() {
        let lhs: Vec<i8> = random_vec(64, 7);
        let rhs: Vec<i8> = random_vec(64, 7);

        pretty_assertions::assert_eq!(lhs, rhs);
        assert!(lhs.iter().all(|v| (-16..=16).contains(v)));
    }
}
