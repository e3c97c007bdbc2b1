//! Two-tier Bloom cascade over canonical identities.
//!
//! The per-level tier stops duplicates produced within one level; the global
//! tier stops re-derivation of molecules accepted at any earlier level. Only
//! identity strings pass through here, never molecule objects. Admission is
//! a single check-and-record step under the filter locks, so two workers can
//! never both admit the same identity.

use crate::config::SynthesisConfig;
use crate::errors::SynthesisError;
use crate::filters::bloom::{BloomFilter, BloomParams};
use parking_lot::Mutex;
use tracing::debug;

// Fixed hash seeds so the two tiers disagree on collision patterns.
const LEVEL_FILTER_SEED: u64 = 0x5A5A_5A5A;
const GLOBAL_FILTER_SEED: u64 = 0xA5A5_A5A5;

/// Per-level filters plus the process-wide filter guarding the admit path.
pub struct DedupCascade {
    global: Mutex<BloomFilter>,
    levels: Vec<Mutex<Option<BloomFilter>>>,
}

impl DedupCascade {
    /// Builds the cascade for levels `2..=level_bound`.
    ///
    /// # Errors
    ///
    /// [`SynthesisError::ResourceExhausted`] when any filter cannot be
    /// constructed.
    pub fn new(config: &SynthesisConfig) -> Result<Self, SynthesisError> {
        let global = BloomFilter::new(BloomParams {
            projected_items: config.global_population().max(1),
            false_positive_rate: config.global_fp_rate,
            seed: GLOBAL_FILTER_SEED,
        })?;

        let mut levels = Vec::with_capacity(config.level_bound + 1);
        for level in 0..=config.level_bound {
            let population = config.level_population(level);
            let filter = if level >= 2 && population > 0 {
                Some(BloomFilter::new(BloomParams {
                    projected_items: population,
                    false_positive_rate: config.level_fp_rate,
                    seed: LEVEL_FILTER_SEED,
                })?)
            } else {
                None
            };
            levels.push(Mutex::new(filter));
        }

        Ok(Self {
            global: Mutex::new(global),
            levels,
        })
    }

    /// Atomically tests and records an identity at the given level.
    ///
    /// Returns `true` when the identity was fresh (and is now recorded in
    /// both tiers), `false` when either tier already held it. A retired
    /// level has no per-level tier; the global tier still applies.
    pub fn admit(&self, level: usize, identity: &str) -> bool {
        let mut level_filter = self.levels[level].lock();
        if let Some(filter) = level_filter.as_ref() {
            if filter.contains(identity) {
                debug!(level, identity, "duplicate within level");
                return false;
            }
        }

        let mut global = self.global.lock();
        if global.contains(identity) {
            debug!(level, identity, "duplicate across levels");
            return false;
        }

        if let Some(filter) = level_filter.as_mut() {
            filter.insert(identity);
        }
        global.insert(identity);
        true
    }

    /// Releases the given level's filter; later `admit` calls for that level
    /// consult only the global tier.
    pub fn retire_level(&self, level: usize) {
        if let Some(slot) = self.levels.get(level) {
            *slot.lock() = None;
        }
    }

    /// Whether the level still holds its filter (used by retirement tests).
    pub fn level_is_live(&self, level: usize) -> bool {
        self.levels
            .get(level)
            .is_some_and(|slot| slot.lock().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SynthesisConfig {
        let mut config = SynthesisConfig::default();
        config.level_bound = 4;
        config.level_populations = Some(vec![0, 0, 100, 100, 100]);
        config
    }

    #[test]
    fn fresh_identities_are_admitted_once() {
        let cascade = DedupCascade::new(&small_config()).expect("cascade");

        assert!(cascade.admit(2, "mol-a"));
        assert!(!cascade.admit(2, "mol-a"), "within-level duplicate");
    }

    #[test]
    fn global_tier_blocks_across_levels() {
        let cascade = DedupCascade::new(&small_config()).expect("cascade");

        assert!(cascade.admit(2, "mol-a"));
        assert!(!cascade.admit(3, "mol-a"), "cross-level duplicate");
    }

    #[test]
    fn retired_levels_keep_only_the_global_tier() {
        let cascade = DedupCascade::new(&small_config()).expect("cascade");

        assert!(cascade.admit(2, "mol-a"));
        assert!(cascade.level_is_live(2));

        cascade.retire_level(2);
        assert!(!cascade.level_is_live(2));

        // Still blocked by the global tier after retirement.
        assert!(!cascade.admit(2, "mol-a"));
        // Fresh identities are fine.
        assert!(cascade.admit(2, "mol-b"));
    }

    #[test]
    fn levels_zero_and_one_carry_no_filter() {
        let cascade = DedupCascade::new(&small_config()).expect("cascade");

        assert!(!cascade.level_is_live(0));
        assert!(!cascade.level_is_live(1));
    }
}
