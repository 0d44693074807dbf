use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive a sub-RNG seed for a child operator slot, ensuring independent streams.
pub fn derive_seed(base_seed: u64, stream: usize) -> u64 {
    base_seed.wrapping_add((stream as u64).wrapping_mul(crate::constants::RNG_DERIVATION_PRIME))
}

/// Derive a sub-RNG for a child operator slot.
pub fn derive_rng(base_seed: u64, stream: usize) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(derive_seed(base_seed, stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = create_rng(7);
        let mut b = create_rng(7);
        for _ in 0..16 {
            assert_eq!(a.random::<u64>(), b.random::<u64>());
        }
    }

    #[test]
    fn derived_streams_differ_per_slot() {
        let mut a = derive_rng(7, 0);
        let mut b = derive_rng(7, 1);
        let xs: Vec<u64> = (0..4).map(|_| a.random()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.random()).collect();
        assert_ne!(xs, ys);
    }
}
