//! Bloom filters sized from a projected population and a false-positive
//! target.
//!
//! The dedup cascade stores canonical identity strings only through these
//! filters, so membership answers may be wrong in one direction: a false
//! positive rejects a genuinely new molecule (a small, accepted loss of
//! diversity), while false negatives cannot happen.

use crate::errors::SynthesisError;

/// Sizing parameters for one filter.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BloomParams {
    /// Roughly how many distinct items will be inserted.
    pub projected_items: u64,
    /// Tolerable false-positive probability, in `(0, 1)`.
    pub false_positive_rate: f64,
    /// Mixed into the hash basis so independent filters disagree on
    /// collisions.
    pub seed: u64,
}

/// A fixed-size Bloom filter over string items.
#[derive(Clone, Debug)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    seed: u64,
}

impl BloomFilter {
    /// Builds a filter with optimal bit and hash counts for the parameters.
    ///
    /// # Errors
    ///
    /// [`SynthesisError::ResourceExhausted`] when the parameters are
    /// unusable (zero population, rate outside `(0, 1)`) or the bit array
    /// cannot be allocated.
    pub fn new(params: BloomParams) -> Result<Self, SynthesisError> {
        if params.projected_items == 0 {
            return Err(SynthesisError::ResourceExhausted(
                "bloom filter projected population is zero".to_string(),
            ));
        }
        if !(params.false_positive_rate > 0.0 && params.false_positive_rate < 1.0) {
            return Err(SynthesisError::ResourceExhausted(format!(
                "bloom filter false-positive rate {} outside (0, 1)",
                params.false_positive_rate
            )));
        }

        let ln2 = std::f64::consts::LN_2;
        let items = params.projected_items as f64;
        let num_bits = ((-items * params.false_positive_rate.ln()) / (ln2 * ln2)).ceil() as u64;
        let num_bits = num_bits.max(64);
        let num_hashes = (((num_bits as f64 / items) * ln2).round() as u32).max(1);

        let num_words = usize::try_from(num_bits.div_ceil(64)).map_err(|_| {
            SynthesisError::ResourceExhausted(format!(
                "bloom filter of {num_bits} bits does not fit in memory"
            ))
        })?;

        let mut bits = Vec::new();
        bits.try_reserve_exact(num_words).map_err(|_| {
            SynthesisError::ResourceExhausted(format!(
                "bloom filter allocation of {num_words} words failed"
            ))
        })?;
        bits.resize(num_words, 0);

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
            seed: params.seed,
        })
    }

    /// Inserts an item.
    pub fn insert(&mut self, item: &str) {
        let (h1, h2) = self.hash_basis(item);
        for round in 0..self.num_hashes {
            let bit = h1.wrapping_add(u64::from(round).wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
    }

    /// Tests membership; `true` may be a false positive, `false` never lies.
    pub fn contains(&self, item: &str) -> bool {
        let (h1, h2) = self.hash_basis(item);
        (0..self.num_hashes).all(|round| {
            let bit = h1.wrapping_add(u64::from(round).wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    /// Number of bits backing the filter.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Number of hash rounds per item.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Derives two independent 64-bit hashes for double hashing.
    fn hash_basis(&self, item: &str) -> (u64, u64) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(item.as_bytes());
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();

        let h1 = u64::from_le_bytes(bytes[0..8].try_into().expect("digest slice"));
        let h2 = u64::from_le_bytes(bytes[8..16].try_into().expect("digest slice"));
        // An even stride could cycle over a fraction of the bit space.
        (h1, h2 | 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_filter(seed: u64) -> BloomFilter {
        BloomFilter::new(BloomParams {
            projected_items: 1_000,
            false_positive_rate: 0.01,
            seed,
        })
        .expect("filter")
    }

    #[test]
    fn construction_rejects_unusable_parameters() {
        let zero = BloomFilter::new(BloomParams {
            projected_items: 0,
            false_positive_rate: 0.01,
            seed: 0,
        });
        assert!(matches!(zero, Err(SynthesisError::ResourceExhausted(_))));

        let rate = BloomFilter::new(BloomParams {
            projected_items: 10,
            false_positive_rate: 1.5,
            seed: 0,
        });
        assert!(matches!(rate, Err(SynthesisError::ResourceExhausted(_))));
    }

    #[test]
    fn optimal_sizing_grows_with_population_and_precision() {
        let loose = small_filter(0);
        let tight = BloomFilter::new(BloomParams {
            projected_items: 1_000,
            false_positive_rate: 0.001,
            seed: 0,
        })
        .expect("filter");

        assert!(tight.num_bits() > loose.num_bits());
        assert!(tight.num_hashes() > loose.num_hashes());
    }

    #[test]
    fn inserted_items_are_never_reported_absent() {
        let mut filter = small_filter(7);
        let items: Vec<String> = (0..1_000).map(|i| format!("identity-{i}")).collect();

        for item in &items {
            filter.insert(item);
        }
        for item in &items {
            assert!(filter.contains(item), "false negative for {item}");
        }
    }

    #[test]
    fn false_positive_rate_stays_near_the_target() {
        let mut filter = small_filter(11);
        for i in 0..1_000 {
            filter.insert(&format!("present-{i}"));
        }

        let false_positives = (0..10_000)
            .filter(|i| filter.contains(&format!("absent-{i}")))
            .count();

        // Target is 1%; leave generous slack so sizing bugs still surface.
        assert!(
            false_positives < 500,
            "{false_positives} false positives out of 10000"
        );
    }
}
