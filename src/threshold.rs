//! Adaptive jerk/snap thresholds.
//!
//! `threshold = max(mean + factor * std_dev, percentile_value)`, with every
//! statistic taken over absolute values since the spike mask compares `|jerk|`
//! and `|snap|`. A larger `factor` makes detection more conservative.

use crate::error::{Error, Result};
use crate::util::{mean, percentile, std_dev};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub mean: f64,
    pub std_dev: f64,
    pub percentile_value: f64,
    pub threshold: f64,
}

impl Calibration {
    /// A caller-supplied threshold with no statistics behind it.
    pub fn fixed(threshold: f64) -> Self {
        Self {
            mean: f64::NAN,
            std_dev: f64::NAN,
            percentile_value: f64::NAN,
            threshold,
        }
    }
}

pub fn calibrate(series: &[f64], factor: f64, pct: f64) -> Result<Calibration> {
    if series.is_empty() {
        return Err(Error::InvalidInput("cannot calibrate a threshold on an empty series".into()));
    }
    if !(0.0..=100.0).contains(&pct) {
        return Err(Error::InvalidConfig(format!(
            "percentile must be within [0, 100], got {}",
            pct
        )));
    }

    let abs: Vec<f64> = series.iter().map(|v| v.abs()).collect();
    let m = mean(&abs);
    let sd = std_dev(&abs);
    let p = percentile(&abs, pct);
    Ok(Calibration {
        mean: m,
        std_dev: sd,
        percentile_value: p,
        threshold: (m + factor * sd).max(p),
    })
}

pub fn set_jerk_threshold(jerk: &[f64], factor: f64, pct: f64) -> Result<Calibration> {
    let c = calibrate(jerk, factor, pct)?;
    debug!(
        "Jerk threshold {:.4e} (mean {:.4e}, sd {:.4e}, p{} {:.4e})",
        c.threshold, c.mean, c.std_dev, pct, c.percentile_value
    );
    Ok(c)
}

pub fn set_snap_threshold(snap: &[f64], factor: f64, pct: f64) -> Result<Calibration> {
    let c = calibrate(snap, factor, pct)?;
    debug!(
        "Snap threshold {:.4e} (mean {:.4e}, sd {:.4e}, p{} {:.4e})",
        c.threshold, c.mean, c.std_dev, pct, c.percentile_value
    );
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_term_wins() {
        // |x| = [1, 1, 1, 5]: mean 2, sd sqrt(3)
        let c = set_jerk_threshold(&[1.0, -1.0, 1.0, -5.0], 2.0, 50.0).unwrap();
        assert_eq!(c.mean, 2.0);
        assert!((c.std_dev - 3f64.sqrt()).abs() < 1e-12);
        assert_eq!(c.percentile_value, 1.0);
        assert!((c.threshold - (2.0 + 2.0 * 3f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_term_wins() {
        let c = set_snap_threshold(&[1.0, -1.0, 1.0, -5.0], 0.0, 100.0).unwrap();
        assert_eq!(c.threshold, 5.0);
        assert_eq!(c.percentile_value, 5.0);
    }

    #[test]
    fn test_larger_factor_is_more_conservative() {
        let series: Vec<f64> = (0..100).map(|i| ((i * 37) % 11) as f64 - 5.0).collect();
        let low = calibrate(&series, 1.0, 0.0).unwrap();
        let high = calibrate(&series, 4.0, 0.0).unwrap();
        assert!(high.threshold > low.threshold);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(matches!(calibrate(&[], 1.0, 50.0), Err(Error::InvalidInput(_))));
        assert!(matches!(calibrate(&[1.0], 1.0, 101.0), Err(Error::InvalidConfig(_))));
        assert!(matches!(calibrate(&[1.0], 1.0, -1.0), Err(Error::InvalidConfig(_))));
    }
}
