//! On-the-fly validation: can the enumerator reach a given molecule?
//!
//! When a validation identity is supplied, every admitted identity is scored
//! against it with a character-level similarity ratio. Exact reproduction
//! scores 1.0; the probe trips as soon as the ratio reaches the configured
//! threshold and the pipeline cancels cleanly. The best match seen is kept
//! for the end-of-run report either way.

use similar::TextDiff;
use tracing::info;

/// Tracks how close the enumeration has come to the validation identity.
#[derive(Clone, Debug)]
pub struct ValidationProbe {
    target: String,
    threshold: f64,
    best_ratio: f64,
    best_identity: Option<String>,
    hit: Option<String>,
}

impl ValidationProbe {
    /// Creates a probe for the target identity.
    ///
    /// # Arguments
    ///
    /// * `target` - Canonical identity the run is trying to reach.
    /// * `threshold` - Similarity ratio that counts as a hit, in `[0, 1]`;
    ///   equality always scores 1.0.
    pub fn new(target: impl Into<String>, threshold: f64) -> Self {
        Self {
            target: target.into(),
            threshold,
            best_ratio: -1.0,
            best_identity: None,
            hit: None,
        }
    }

    /// Scores one admitted identity; returns `true` when the probe trips.
    ///
    /// After the first hit the probe stays tripped and stops scoring.
    pub fn observe(&mut self, identity: &str) -> bool {
        if self.hit.is_some() {
            return true;
        }

        let ratio = f64::from(TextDiff::from_chars(self.target.as_str(), identity).ratio());
        if ratio > self.best_ratio {
            self.best_ratio = ratio;
            self.best_identity = Some(identity.to_string());
        }

        if ratio >= self.threshold {
            info!(target = %self.target, identity, ratio, "validation identity reached");
            self.hit = Some(identity.to_string());
            return true;
        }

        false
    }

    /// The identity that tripped the probe, when one did.
    pub fn hit(&self) -> Option<&str> {
        self.hit.as_deref()
    }

    /// Best-scoring identity seen so far and its ratio.
    pub fn best_match(&self) -> Option<(&str, f64)> {
        self.best_identity
            .as_deref()
            .map(|identity| (identity, self.best_ratio))
    }

    /// The identity this probe is looking for.
    pub fn target(&self) -> &str {
        &self.target
    }
}
