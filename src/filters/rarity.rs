//! Probabilistic rarity filter active at the higher synthesis levels.
//!
//! Six marginal likelihoods are evaluated against fixed reference
//! distributions fitted on known drug-like molecules: molecular weight and
//! rigid-fragment count follow normal densities, linker count, the log
//! linker-to-rigid ratio and both hydrogen-bond counts follow logistic
//! densities. The product of the six densities is compared against a product
//! of six independent uniform draws; the candidate survives only when the
//! density product is larger. This is the sole source of nondeterminism in
//! the result set, so the uniform stream comes from a seeded generator.

use crate::fragment::Descriptors;
use crate::molecule::FragmentCensus;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Parameters of the six reference distributions.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct RarityParams {
    /// Mean of the molecular-weight normal.
    pub mol_wt_mean: f64,
    /// Standard deviation of the molecular-weight normal.
    pub mol_wt_sd: f64,
    /// Mean of the rigid-count normal.
    pub rigids_mean: f64,
    /// Standard deviation of the rigid-count normal.
    pub rigids_sd: f64,
    /// Location of the linker-count logistic.
    pub linkers_loc: f64,
    /// Scale of the linker-count logistic.
    pub linkers_scale: f64,
    /// Location of the log linker-to-rigid ratio logistic.
    pub ratio_loc: f64,
    /// Scale of the log linker-to-rigid ratio logistic.
    pub ratio_scale: f64,
    /// Location of the donor-count logistic.
    pub hbd_loc: f64,
    /// Scale of the donor-count logistic.
    pub hbd_scale: f64,
    /// Location of the acceptor-count logistic.
    pub hba1_loc: f64,
    /// Scale of the acceptor-count logistic.
    pub hba1_scale: f64,
}

impl Default for RarityParams {
    fn default() -> Self {
        Self {
            mol_wt_mean: 428.366_043,
            mol_wt_sd: 91.124_687,
            rigids_mean: 3.209_722,
            rigids_sd: 1.079_512,
            linkers_loc: 3.025_175,
            linkers_scale: 1.369_96,
            ratio_loc: -0.084_292,
            ratio_scale: 0.460_03,
            hbd_loc: 1.937_285,
            hbd_scale: 0.762_586,
            hba1_loc: 6.056_996,
            hba1_scale: 1.312_437,
        }
    }
}

/// Seeded sampler deciding which candidates survive the rarity gate.
#[derive(Clone, Debug)]
pub struct RarityFilter {
    params: RarityParams,
    rng: ChaCha8Rng,
}

impl RarityFilter {
    /// Creates a filter with the given distribution parameters and seed.
    pub fn new(params: RarityParams, seed: u64) -> Self {
        Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Decides whether a candidate survives.
    ///
    /// Always consumes exactly six uniform draws so the random stream stays
    /// aligned with the candidate stream for a given seed.
    pub fn admits(&mut self, descriptors: Descriptors, census: FragmentCensus) -> bool {
        let p = self.density_product(descriptors, census);

        let mut u = 1.0;
        for _ in 0..6 {
            u *= self.rng.gen::<f64>();
        }

        p > u
    }

    fn density_product(&self, descriptors: Descriptors, census: FragmentCensus) -> f64 {
        let params = &self.params;
        let rigids = f64::from(census.rigids);
        let linkers = f64::from(census.linkers);
        let log_ratio = (linkers / rigids).ln();

        normal_pdf(descriptors.mol_wt, params.mol_wt_mean, params.mol_wt_sd)
            * normal_pdf(rigids, params.rigids_mean, params.rigids_sd)
            * logistic_pdf(linkers, params.linkers_loc, params.linkers_scale)
            * logistic_pdf(log_ratio, params.ratio_loc, params.ratio_scale)
            * logistic_pdf(descriptors.hbd, params.hbd_loc, params.hbd_scale)
            * logistic_pdf(descriptors.hba1, params.hba1_loc, params.hba1_scale)
    }
}

fn normal_pdf(x: f64, loc: f64, scale: f64) -> f64 {
    let norm = 1.0 / (scale * (2.0 * std::f64::consts::PI).sqrt());
    let z = (x - loc) / scale;
    norm * (-0.5 * z * z).exp()
}

fn logistic_pdf(x: f64, loc: f64, scale: f64) -> f64 {
    let e = (-(x - loc) / scale).exp();
    e / (scale * (1.0 + e) * (1.0 + e))
}
