use crate::error::BendError;
use serde::{Deserialize, Serialize};

/// Parameters of the bending algorithm.
///
/// Distances are in the same unit as the morphology coordinates
/// (micrometres in practice), so `decay_constant` is per micrometre.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BendConfig {
    /// Steepness `k` of the logistic curves mapping distance to
    /// probability.
    pub decay_constant: f64,
    /// Number of random rotations tried per corrected point.
    pub n_candidates: usize,
    /// Largest magnitude, in radians, of each sampled Euler angle.
    pub angle_limit: f64,
}

impl Default for BendConfig {
    fn default() -> Self {
        Self {
            decay_constant: 0.1,
            n_candidates: 10,
            angle_limit: 0.2,
        }
    }
}

impl BendConfig {
    pub fn validate(&self) -> Result<(), BendError> {
        if !(self.decay_constant.is_finite() && self.decay_constant > 0.0) {
            return Err(BendError::InvalidConfig(format!(
                "decay_constant must be positive and finite, got {}",
                self.decay_constant
            )));
        }
        if self.n_candidates == 0 {
            return Err(BendError::InvalidConfig(
                "n_candidates must be at least 1".to_owned(),
            ));
        }
        if !(self.angle_limit.is_finite() && self.angle_limit >= 0.0) {
            return Err(BendError::InvalidConfig(format!(
                "angle_limit must be non-negative and finite, got {}",
                self.angle_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = BendConfig::default();

        assert_eq!(cfg.n_candidates, 10);
        assert_eq!(cfg.angle_limit, 0.2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = BendConfig::default();
        cfg.decay_constant = 0.0;
        assert!(matches!(cfg.validate(), Err(BendError::InvalidConfig(_))));

        let mut cfg = BendConfig::default();
        cfg.n_candidates = 0;
        assert!(matches!(cfg.validate(), Err(BendError::InvalidConfig(_))));

        let mut cfg = BendConfig::default();
        cfg.angle_limit = f64::NAN;
        assert!(matches!(cfg.validate(), Err(BendError::InvalidConfig(_))));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: BendConfig =
            serde_json::from_str(r#"{ "decay_constant": 0.5 }"#).expect("valid json");

        assert_eq!(cfg.decay_constant, 0.5);
        assert_eq!(cfg.n_candidates, 10);
    }
}
