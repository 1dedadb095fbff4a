use serde::Serialize;

use crate::models::ClassifiedLevel;

pub const DEFAULT_HYPO_THRESHOLD: i32 = 70;
pub const DEFAULT_TARGET_LOW: i32 = 70;
pub const DEFAULT_TARGET_HIGH: i32 = 140;
pub const DEFAULT_HYPER_THRESHOLD: i32 = 180;

/// Per-user glucose limits in mg/dL.
///
/// `target_low`, `target_high` and `hyper_threshold` drive band
/// classification. `hypo_threshold` and `hyper_threshold` drive alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlucoseThresholds {
    pub hypo_threshold: i32,
    pub target_low: i32,
    pub target_high: i32,
    pub hyper_threshold: i32,
}

impl Default for GlucoseThresholds {
    fn default() -> Self {
        Self {
            hypo_threshold: DEFAULT_HYPO_THRESHOLD,
            target_low: DEFAULT_TARGET_LOW,
            target_high: DEFAULT_TARGET_HIGH,
            hyper_threshold: DEFAULT_HYPER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    #[error("hypo threshold {hypo} must not exceed target low {target_low}")]
    HypoAboveTargetLow { hypo: i32, target_low: i32 },

    #[error("target low {target_low} must be below target high {target_high}")]
    EmptyTargetRange { target_low: i32, target_high: i32 },

    #[error("target high {target_high} must not exceed hyper threshold {hyper}")]
    TargetHighAboveHyper { target_high: i32, hyper: i32 },
}

impl GlucoseThresholds {
    /// Checks `hypo <= target_low < target_high <= hyper`.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if self.hypo_threshold > self.target_low {
            return Err(ThresholdError::HypoAboveTargetLow {
                hypo: self.hypo_threshold,
                target_low: self.target_low,
            });
        }
        if self.target_low >= self.target_high {
            return Err(ThresholdError::EmptyTargetRange {
                target_low: self.target_low,
                target_high: self.target_high,
            });
        }
        if self.target_high > self.hyper_threshold {
            return Err(ThresholdError::TargetHighAboveHyper {
                target_high: self.target_high,
                hyper: self.hyper_threshold,
            });
        }
        Ok(())
    }
}

/// Partially configured thresholds, as stored on a user profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThresholdOverrides {
    pub hypo_threshold: Option<i32>,
    pub target_low: Option<i32>,
    pub target_high: Option<i32>,
    pub hyper_threshold: Option<i32>,
}

impl ThresholdOverrides {
    /// Each missing field falls back to its own default.
    pub fn resolve(&self) -> GlucoseThresholds {
        let defaults = GlucoseThresholds::default();
        GlucoseThresholds {
            hypo_threshold: self.hypo_threshold.unwrap_or(defaults.hypo_threshold),
            target_low: self.target_low.unwrap_or(defaults.target_low),
            target_high: self.target_high.unwrap_or(defaults.target_high),
            hyper_threshold: self.hyper_threshold.unwrap_or(defaults.hyper_threshold),
        }
    }

    /// Layers `self` over `base`, keeping base values for unset fields.
    pub fn apply_to(&self, base: GlucoseThresholds) -> GlucoseThresholds {
        GlucoseThresholds {
            hypo_threshold: self.hypo_threshold.unwrap_or(base.hypo_threshold),
            target_low: self.target_low.unwrap_or(base.target_low),
            target_high: self.target_high.unwrap_or(base.target_high),
            hyper_threshold: self.hyper_threshold.unwrap_or(base.hyper_threshold),
        }
    }
}

/// Maps a glucose value onto one of the four bands. Cut points belong to the
/// less severe band. Non-finite input is not guarded.
pub fn classify(value: f64, thresholds: &GlucoseThresholds) -> ClassifiedLevel {
    if value < f64::from(thresholds.target_low) {
        ClassifiedLevel::Low
    } else if value <= f64::from(thresholds.target_high) {
        ClassifiedLevel::Normal
    } else if value <= f64::from(thresholds.hyper_threshold) {
        ClassifiedLevel::High
    } else {
        ClassifiedLevel::VeryHigh
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlucoseAlert {
    Hypo,
    Hyper,
}

/// Alert check against the hypo/hyper limits, independent of banding.
pub fn alert(value: f64, thresholds: &GlucoseThresholds) -> Option<GlucoseAlert> {
    if value < f64::from(thresholds.hypo_threshold) {
        Some(GlucoseAlert::Hypo)
    } else if value > f64::from(thresholds.hyper_threshold) {
        Some(GlucoseAlert::Hyper)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom() -> GlucoseThresholds {
        GlucoseThresholds {
            hypo_threshold: 60,
            target_low: 80,
            target_high: 160,
            hyper_threshold: 220,
        }
    }

    #[test]
    fn default_cut_points() {
        let t = GlucoseThresholds::default();
        assert_eq!(classify(69.0, &t), ClassifiedLevel::Low);
        assert_eq!(classify(70.0, &t), ClassifiedLevel::Normal);
        assert_eq!(classify(140.0, &t), ClassifiedLevel::Normal);
        assert_eq!(classify(141.0, &t), ClassifiedLevel::High);
        assert_eq!(classify(180.0, &t), ClassifiedLevel::High);
        assert_eq!(classify(181.0, &t), ClassifiedLevel::VeryHigh);
    }

    #[test]
    fn custom_cut_points_stay_on_the_less_severe_side() {
        let t = custom();
        assert_eq!(classify(79.0, &t), ClassifiedLevel::Low);
        assert_eq!(classify(80.0, &t), ClassifiedLevel::Normal);
        assert_eq!(classify(160.0, &t), ClassifiedLevel::Normal);
        assert_eq!(classify(161.0, &t), ClassifiedLevel::High);
        assert_eq!(classify(220.0, &t), ClassifiedLevel::High);
        assert_eq!(classify(221.0, &t), ClassifiedLevel::VeryHigh);
        assert_eq!(classify(160.0001, &t), ClassifiedLevel::High);
    }

    #[test]
    fn hypo_threshold_does_not_affect_banding() {
        let t = custom();
        assert_eq!(classify(65.0, &t), ClassifiedLevel::Low);
        assert_eq!(alert(65.0, &t), None);
        assert_eq!(alert(59.0, &t), Some(GlucoseAlert::Hypo));
    }

    #[test]
    fn implausible_values_still_classify() {
        let t = GlucoseThresholds::default();
        assert_eq!(classify(-20.0, &t), ClassifiedLevel::Low);
        assert_eq!(classify(0.0, &t), ClassifiedLevel::Low);
        assert_eq!(classify(2_000.0, &t), ClassifiedLevel::VeryHigh);
    }

    #[test]
    fn bands_are_monotonic_in_value() {
        let t = custom();
        let mut previous = classify(-100.0, &t);
        let mut value = -100.0;
        while value < 400.0 {
            let level = classify(value, &t);
            assert!(level >= previous, "band went down at {value}");
            previous = level;
            value += 0.5;
        }
    }

    #[test]
    fn alert_limits_are_exclusive() {
        let t = GlucoseThresholds::default();
        assert_eq!(alert(70.0, &t), None);
        assert_eq!(alert(69.9, &t), Some(GlucoseAlert::Hypo));
        assert_eq!(alert(180.0, &t), None);
        assert_eq!(alert(180.5, &t), Some(GlucoseAlert::Hyper));
    }

    #[test]
    fn overrides_default_each_field_independently() {
        let overrides = ThresholdOverrides {
            target_high: Some(150),
            ..ThresholdOverrides::default()
        };
        let resolved = overrides.resolve();
        assert_eq!(resolved.hypo_threshold, 70);
        assert_eq!(resolved.target_low, 70);
        assert_eq!(resolved.target_high, 150);
        assert_eq!(resolved.hyper_threshold, 180);
        assert_eq!(ThresholdOverrides::default().resolve(), GlucoseThresholds::default());
    }

    #[test]
    fn validation_rejects_misordered_limits() {
        assert!(GlucoseThresholds::default().validate().is_ok());
        assert!(custom().validate().is_ok());

        let inverted = GlucoseThresholds {
            target_low: 150,
            target_high: 140,
            ..GlucoseThresholds::default()
        };
        assert_eq!(
            inverted.validate(),
            Err(ThresholdError::EmptyTargetRange {
                target_low: 150,
                target_high: 140
            })
        );

        let hypo_high = GlucoseThresholds {
            hypo_threshold: 75,
            ..GlucoseThresholds::default()
        };
        assert!(matches!(
            hypo_high.validate(),
            Err(ThresholdError::HypoAboveTargetLow { .. })
        ));

        let hyper_low = GlucoseThresholds {
            hyper_threshold: 130,
            ..GlucoseThresholds::default()
        };
        assert!(matches!(
            hyper_low.validate(),
            Err(ThresholdError::TargetHighAboveHyper { .. })
        ));
    }
}
