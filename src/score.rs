//! Peak accelerations and the recovery score.
//!
//! The score is derived from the failed attempts whenever there is at least
//! one (`sumua`), otherwise from the successful attempt alone (`sa_2axes`).
//! The mapping from magnitude to score is a [`ScoreFormula`].

use crate::config::ScoringConfig;
use crate::detect::Attempts;
use crate::roi::RoiSample;
use log::info;

/// Maximum absolute acceleration per axis within one region.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisPeaks {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AxisPeaks {
    pub fn magnitude_2axes(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBasis {
    FailedAttempts,
    SuccessfulAttempt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub failed_attempts: usize,
    pub peaks: Vec<AxisPeaks>,
    pub sa_2axes: f64,
    pub sa: f64,
    pub sumua: f64,
    pub recovery_score: f64,
    pub basis: ScoreBasis,
}

pub trait ScoreFormula {
    fn from_failed(&self, sumua: f64) -> f64;
    fn from_successful(&self, sa_2axes: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFormula {
    pub failed_slope: f64,
    pub failed_intercept: f64,
    pub successful_slope: f64,
    pub successful_intercept: f64,
}

impl LinearFormula {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            failed_slope: config.failed_slope,
            failed_intercept: config.failed_intercept,
            successful_slope: config.successful_slope,
            successful_intercept: config.successful_intercept,
        }
    }
}

impl Default for LinearFormula {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl ScoreFormula for LinearFormula {
    fn from_failed(&self, sumua: f64) -> f64 {
        self.failed_slope * sumua + self.failed_intercept
    }

    fn from_successful(&self, sa_2axes: f64) -> f64 {
        self.successful_slope * sa_2axes + self.successful_intercept
    }
}

pub fn region_peaks(samples: &[RoiSample], region_count: usize) -> Vec<AxisPeaks> {
    let mut peaks = vec![AxisPeaks::default(); region_count];
    for s in samples {
        let p = &mut peaks[s.region];
        p.x = p.x.max(s.x.abs());
        p.y = p.y.max(s.y.abs());
        p.z = p.z.max(s.z.abs());
    }
    peaks
}

pub fn get_max_accelerations_x(peaks: &[AxisPeaks]) -> Vec<f64> {
    peaks.iter().map(|p| p.x).collect()
}

pub fn get_max_accelerations_y(peaks: &[AxisPeaks]) -> Vec<f64> {
    peaks.iter().map(|p| p.y).collect()
}

pub fn get_max_accelerations_z(peaks: &[AxisPeaks]) -> Vec<f64> {
    peaks.iter().map(|p| p.z).collect()
}

/// X/Y magnitude of the successful (last) attempt.
pub fn get_sa_2axes(peaks: &[AxisPeaks]) -> f64 {
    peaks.last().map_or(0.0, AxisPeaks::magnitude_2axes)
}

/// Three-axis magnitude of the successful (last) attempt.
pub fn get_sa(peaks: &[AxisPeaks]) -> f64 {
    peaks.last().map_or(0.0, AxisPeaks::magnitude)
}

/// Summed three-axis magnitude of every failed attempt.
pub fn get_sumua(peaks: &[AxisPeaks]) -> f64 {
    match peaks.split_last() {
        Some((_, failed)) => failed.iter().map(AxisPeaks::magnitude).sum(),
        None => 0.0,
    }
}

pub fn compute_score(attempts: &Attempts, samples: &[RoiSample], formula: &dyn ScoreFormula) -> ScoreResult {
    let peaks = region_peaks(samples, attempts.len());
    let failed_attempts = attempts.failed_count();
    let sa_2axes = get_sa_2axes(&peaks);
    let sa = get_sa(&peaks);
    let sumua = get_sumua(&peaks);

    let (recovery_score, basis) = if failed_attempts >= 1 {
        (formula.from_failed(sumua), ScoreBasis::FailedAttempts)
    } else {
        (formula.from_successful(sa_2axes), ScoreBasis::SuccessfulAttempt)
    };
    info!(
        "Scored {} failed attempt(s): sa_2axes={:.3}, sumua={:.3}, score={:.3} ({:?})",
        failed_attempts, sa_2axes, sumua, recovery_score, basis
    );

    ScoreResult {
        failed_attempts,
        peaks,
        sa_2axes,
        sa,
        sumua,
        recovery_score,
        basis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Region;

    fn sample(region: usize, x: f64, y: f64, z: f64) -> RoiSample {
        RoiSample {
            region,
            index: 0,
            x,
            y,
            z,
        }
    }

    struct Tagged;

    impl ScoreFormula for Tagged {
        fn from_failed(&self, sumua: f64) -> f64 {
            1000.0 + sumua
        }
        fn from_successful(&self, sa_2axes: f64) -> f64 {
            2000.0 + sa_2axes
        }
    }

    #[test]
    fn test_region_peaks_use_absolute_values() {
        let samples = [
            sample(0, 1.0, -4.0, 9.0),
            sample(0, -3.0, 2.0, -12.0),
            sample(1, 0.5, 0.5, 10.0),
        ];
        let peaks = region_peaks(&samples, 2);
        assert_eq!(peaks[0], AxisPeaks { x: 3.0, y: 4.0, z: 12.0 });
        assert_eq!(get_max_accelerations_z(&peaks), vec![12.0, 10.0]);
        assert_eq!(get_max_accelerations_x(&peaks), vec![3.0, 0.5]);
        assert_eq!(get_max_accelerations_y(&peaks), vec![4.0, 0.5]);
    }

    #[test]
    fn test_magnitudes() {
        let peaks = [
            AxisPeaks { x: 3.0, y: 4.0, z: 12.0 },
            AxisPeaks { x: 1.0, y: 2.0, z: 2.0 },
            AxisPeaks { x: 6.0, y: 8.0, z: 0.0 },
        ];
        assert_eq!(get_sa_2axes(&peaks), 10.0);
        assert_eq!(get_sa(&peaks), 10.0);
        assert_eq!(get_sumua(&peaks), 13.0 + 3.0);
        assert_eq!(get_sumua(&peaks[2..]), 0.0);
    }

    #[test]
    fn test_single_attempt_scores_from_sa_2axes() {
        let attempts = Attempts::new(vec![Region::new(0, 2, 0, 1.0)]).unwrap();
        let samples = [sample(0, 3.0, 4.0, 30.0), sample(0, 1.0, 1.0, 1.0)];
        let result = compute_score(&attempts, &samples, &Tagged);
        assert_eq!(result.failed_attempts, 0);
        assert_eq!(result.basis, ScoreBasis::SuccessfulAttempt);
        assert_eq!(result.sa_2axes, 5.0);
        assert_eq!(result.sumua, 0.0);
        assert_eq!(result.recovery_score, 2005.0);
    }

    #[test]
    fn test_two_attempts_score_from_first_region() {
        let attempts = Attempts::new(vec![Region::new(0, 1, 0, 1.0), Region::new(5, 6, 5, 1.0)]).unwrap();
        let samples = [sample(0, 2.0, 3.0, 6.0), sample(1, 30.0, 40.0, 50.0)];
        let result = compute_score(&attempts, &samples, &Tagged);
        assert_eq!(result.failed_attempts, 1);
        assert_eq!(result.basis, ScoreBasis::FailedAttempts);
        assert_eq!(result.sumua, 7.0);
        assert_eq!(result.sa_2axes, 50.0);
        assert_eq!(result.recovery_score, 1007.0);
    }

    #[test]
    fn test_linear_formula() {
        let formula = LinearFormula {
            failed_slope: 2.0,
            failed_intercept: 1.0,
            successful_slope: -0.5,
            successful_intercept: 10.0,
        };
        assert_eq!(formula.from_failed(3.0), 7.0);
        assert_eq!(formula.from_successful(4.0), 8.0);
        assert_eq!(LinearFormula::default().from_failed(3.5), 3.5);
    }
}
