//! Attempt detection.
//!
//! Two interchangeable strategies locate the regions where the subject tried
//! to stand: a windowed standard deviation over the raw vertical axis
//! ([`WindowSdDetector`]) and jerk/snap spikes over the conditioned vertical
//! axis ([`SpikeDetector`]). Both produce [`Attempts`], whose last region is
//! the successful attempt.

pub mod spike;
pub mod window_sd;

pub use spike::SpikeDetector;
pub use window_sd::{SdPeak, WindowSdDetector};

use crate::config::{AnalysisConfig, DetectionMethod};
use crate::derivative::DerivativeSeries;
use crate::error::{Error, Result};
use crate::filter::ConditionedSignal;
use crate::recording::Recording;
use crate::threshold::Calibration;
use std::ops::Range;

/// Half-open index range `[start, end)` into the filtered recording, plus the
/// sample that best represents it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub peak_index: usize,
    pub peak_value: f64,
}

impl Region {
    pub fn new(start: usize, end: usize, peak_index: usize, peak_value: f64) -> Self {
        assert!(start <= end, "region start {} after end {}", start, end);
        Self {
            start,
            end,
            peak_index,
            peak_value,
        }
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Chronologically ordered, non-empty attempt regions.
///
/// Ordering is established here rather than trusted from the detector, so the
/// last region is always the successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempts(Vec<Region>);

impl Attempts {
    pub fn new(mut regions: Vec<Region>) -> Result<Self> {
        if regions.is_empty() {
            return Err(Error::NoAttemptDetected);
        }
        regions.sort_by_key(|r| (r.start, r.end));
        Ok(Self(regions))
    }

    pub fn regions(&self) -> &[Region] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every region but the last is a failed attempt.
    pub fn failed_count(&self) -> usize {
        self.0.len() - 1
    }

    pub fn successful(&self) -> &Region {
        &self.0[self.0.len() - 1]
    }

    pub fn failed(&self) -> &[Region] {
        &self.0[..self.0.len() - 1]
    }
}

/// Everything a detector may look at.
pub struct DetectionInput<'a> {
    /// Initially filtered, otherwise raw recording.
    pub recording: &'a Recording,
    /// Smoothed signal aligned with `recording`.
    pub signal: &'a ConditionedSignal,
    pub sample_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionDetail {
    WindowSd {
        window_sd: Vec<f64>,
        peaks: Vec<SdPeak>,
    },
    Spike {
        derivatives: DerivativeSeries,
        jerk: Calibration,
        snap: Calibration,
        roi_indices: Vec<usize>,
    },
}

fn describe_calibration(name: &str, c: &Calibration) -> String {
    if c.mean.is_nan() {
        format!("{} threshold {:.4} (fixed)", name, c.threshold)
    } else {
        format!(
            "{} threshold {:.4} (mean {:.4}, sd {:.4}, percentile {:.4})",
            name, c.threshold, c.mean, c.std_dev, c.percentile_value
        )
    }
}

impl DetectionDetail {
    /// One line naming the thresholds and statistics behind a detection.
    pub fn describe(&self) -> String {
        match self {
            DetectionDetail::WindowSd { window_sd, peaks } => {
                let max = window_sd.iter().copied().fold(0.0, f64::max);
                format!(
                    "window sd: {} windows, max sd {:.4}, {} peak(s)",
                    window_sd.len(),
                    max,
                    peaks.len()
                )
            }
            DetectionDetail::Spike {
                jerk,
                snap,
                roi_indices,
                ..
            } => format!(
                "{}; {}; {} ROI samples",
                describe_calibration("jerk", jerk),
                describe_calibration("snap", snap),
                roi_indices.len()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub attempts: Attempts,
    pub detail: DetectionDetail,
}

pub trait AttemptDetector {
    fn name(&self) -> &'static str;
    fn detect(&self, input: &DetectionInput) -> Result<Detection>;
}

pub fn detector_for(config: &AnalysisConfig) -> Box<dyn AttemptDetector> {
    match config.method {
        DetectionMethod::WindowSd => Box::new(WindowSdDetector::new(&config.window_sd)),
        DetectionMethod::Spike => Box::new(SpikeDetector::new(&config.spike)),
    }
}

pub fn get_attempts(attempts: &Attempts) -> usize {
    attempts.failed_count()
}
