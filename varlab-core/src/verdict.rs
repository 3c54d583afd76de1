//! Calibration verdicts: coarse reading of an observed violation rate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How an observed violation rate compares to its theoretical target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationVerdict {
    /// Fewer breaches than expected: risk is overestimated.
    Conservative,
    /// Within ±20% of the target rate.
    WellCalibrated,
    /// Up to twice the target rate: risk is underestimated.
    Aggressive,
    /// More than twice the target rate.
    Unreliable,
    /// No usable rate.
    Unknown,
}

impl CalibrationVerdict {
    /// Bands on `rate / alpha`: below 0.8, up to 1.2, up to 2.0, above.
    ///
    /// Raw-rate cut-offs of 0.4, 0.6 and 1.0 around a 0.5 centre are these
    /// same bands; applying them to the ratio puts both levels on one scale.
    pub fn classify(rate: f64, alpha: f64) -> Self {
        if !rate.is_finite() || !(alpha > 0.0) {
            return Self::Unknown;
        }
        let ratio = rate / alpha;
        if ratio < 0.8 {
            Self::Conservative
        } else if ratio <= 1.2 {
            Self::WellCalibrated
        } else if ratio <= 2.0 {
            Self::Aggressive
        } else {
            Self::Unreliable
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative (overestimates downside risk)",
            Self::WellCalibrated => "well calibrated",
            Self::Aggressive => "aggressive (underestimates downside risk)",
            Self::Unreliable => "unreliable (far more breaches than expected)",
            Self::Unknown => "no violation data",
        }
    }
}

impl fmt::Display for CalibrationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_at_five_percent() {
        assert_eq!(CalibrationVerdict::classify(0.01, 0.05), CalibrationVerdict::Conservative);
        assert_eq!(CalibrationVerdict::classify(0.05, 0.05), CalibrationVerdict::WellCalibrated);
        assert_eq!(CalibrationVerdict::classify(0.045, 0.05), CalibrationVerdict::WellCalibrated);
        assert_eq!(CalibrationVerdict::classify(0.08, 0.05), CalibrationVerdict::Aggressive);
        assert_eq!(CalibrationVerdict::classify(0.2, 0.05), CalibrationVerdict::Unreliable);
    }

    #[test]
    fn raw_cut_offs_around_one_half_match_the_ratio_bands() {
        use CalibrationVerdict::*;
        let cases = [
            (0.39, Conservative),
            (0.4, WellCalibrated),
            (0.6, WellCalibrated),
            (0.61, Aggressive),
            (1.0, Aggressive),
            (1.01, Unreliable),
        ];
        for (rate, expected) in cases {
            assert_eq!(CalibrationVerdict::classify(rate, 0.5), expected, "rate {rate}");
        }
    }

    #[test]
    fn nan_rate_is_unknown() {
        assert_eq!(CalibrationVerdict::classify(f64::NAN, 0.05), CalibrationVerdict::Unknown);
        assert_eq!(CalibrationVerdict::classify(0.05, 0.0), CalibrationVerdict::Unknown);
    }
}
