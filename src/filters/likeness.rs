//! Drug-likeness gates: absolute thresholds and the additive pair pre-filter.
//!
//! Descriptors of composed molecules are never recomputed chemically; they
//! are estimated with fixed affine models fitted against the descriptors of
//! the two parts. The same models power the cheap pre-filter that rejects a
//! pair before any composition work happens.

use crate::fragment::Descriptors;

const MOL_WT_OFFSET: f64 = 6.6746;
const MOL_WT_SCALE: f64 = 0.95965;
const HBD_OFFSET: f64 = 0.41189;
const HBD_SCALE: f64 = 0.4898;
const HBA1_OFFSET: f64 = 0.278;
const HBA1_SCALE: f64 = 0.93778;
const LOG_P_OFFSET: f64 = 0.84121;
const LOG_P_SCALE: f64 = 0.59105;

/// Upper bounds a molecule must stay under to be emitted.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Thresholds {
    /// Molecular-weight bound in daltons.
    pub mol_wt: f64,
    /// Hydrogen-bond donor bound.
    pub hbd: f64,
    /// Hydrogen-bond acceptor bound.
    pub hba1: f64,
    /// Partition-coefficient bound.
    pub log_p: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mol_wt: 570.0,
            hbd: 5.0,
            hba1: 10.0,
            log_p: 7.2,
        }
    }
}

/// Estimates the descriptors of the molecule obtained by joining two parts.
pub fn estimate(a: Descriptors, b: Descriptors) -> Descriptors {
    Descriptors {
        mol_wt: MOL_WT_OFFSET + MOL_WT_SCALE * (a.mol_wt + b.mol_wt),
        hbd: HBD_OFFSET + HBD_SCALE * (a.hbd + b.hbd),
        hba1: HBA1_OFFSET + HBA1_SCALE * (a.hba1 + b.hba1),
        log_p: LOG_P_OFFSET + LOG_P_SCALE * (a.log_p + b.log_p),
    }
}

/// Threshold-backed gates applied before composition and before emission.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct LikenessGates {
    thresholds: Thresholds,
}

impl LikenessGates {
    /// Creates gates over the given thresholds.
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Returns the configured thresholds.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Cheap pre-filter on a pair of molecules about to be composed.
    ///
    /// Rejects when any of the estimated weight, donor or acceptor counts
    /// would exceed its bound. The partition coefficient is deliberately not
    /// part of this test: its additive model is too loose to reject on.
    pub fn pair_will_exceed(&self, a: Descriptors, b: Descriptors) -> bool {
        let combined = estimate(a, b);
        combined.mol_wt > self.thresholds.mol_wt
            || combined.hbd > self.thresholds.hbd
            || combined.hba1 > self.thresholds.hba1
    }

    /// Absolute gate on a single molecule's (estimated) descriptors.
    pub fn rejects(&self, descriptors: Descriptors) -> bool {
        descriptors.mol_wt > self.thresholds.mol_wt
            || descriptors.hbd > self.thresholds.hbd
            || descriptors.hba1 > self.thresholds.hba1
            || descriptors.log_p > self.thresholds.log_p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(mol_wt: f64, hbd: f64, hba1: f64, log_p: f64) -> Descriptors {
        Descriptors {
            mol_wt,
            hbd,
            hba1,
            log_p,
        }
    }

    #[test]
    fn estimate_applies_the_affine_models() {
        let a = descriptors(100.0, 1.0, 2.0, 1.5);
        let b = descriptors(50.0, 2.0, 1.0, 0.5);
        let combined = estimate(a, b);

        assert!((combined.mol_wt - (6.6746 + 0.95965 * 150.0)).abs() < 1e-9);
        assert!((combined.hbd - (0.41189 + 0.4898 * 3.0)).abs() < 1e-9);
        assert!((combined.hba1 - (0.278 + 0.93778 * 3.0)).abs() < 1e-9);
        assert!((combined.log_p - (0.84121 + 0.59105 * 2.0)).abs() < 1e-9);
    }

    #[test]
    fn pair_filter_trips_on_each_additive_bound() {
        let gates = LikenessGates::default();
        let light = descriptors(10.0, 0.0, 0.0, 0.0);

        assert!(!gates.pair_will_exceed(light, light));
        assert!(gates.pair_will_exceed(descriptors(600.0, 0.0, 0.0, 0.0), light));
        assert!(gates.pair_will_exceed(descriptors(0.0, 12.0, 0.0, 0.0), light));
        assert!(gates.pair_will_exceed(descriptors(0.0, 0.0, 12.0, 0.0), light));
    }

    #[test]
    fn pair_filter_ignores_the_partition_coefficient() {
        let gates = LikenessGates::default();
        let greasy = descriptors(10.0, 0.0, 0.0, 50.0);

        assert!(!gates.pair_will_exceed(greasy, greasy));
        // The absolute gate still catches it.
        assert!(gates.rejects(estimate(greasy, greasy)));
    }

    #[test]
    fn absolute_gate_checks_all_four_thresholds() {
        let gates = LikenessGates::default();

        assert!(!gates.rejects(descriptors(570.0, 5.0, 10.0, 7.2)));
        assert!(gates.rejects(descriptors(570.1, 0.0, 0.0, 0.0)));
        assert!(gates.rejects(descriptors(0.0, 5.1, 0.0, 0.0)));
        assert!(gates.rejects(descriptors(0.0, 0.0, 10.1, 0.0)));
        assert!(gates.rejects(descriptors(0.0, 0.0, 0.0, 7.3)));
    }
}
