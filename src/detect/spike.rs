use super::{AttemptDetector, Attempts, Detection, DetectionDetail, DetectionInput, Region};
use crate::config::{SpikeConfig, SpikeThresholds};
use crate::derivative::{calculate_derivatives, DerivativeSeries};
use crate::error::Result;
use crate::recording::Axis;
use crate::threshold::{set_jerk_threshold, set_snap_threshold, Calibration};
use log::{debug, info};
use std::collections::BTreeSet;

/// Indices where `|jerk| > jerk_threshold` or `|snap| > snap_threshold`.
///
/// Jerk is compared without its last element so both series line up.
pub fn spike_mask(series: &DerivativeSeries, jerk_threshold: f64, snap_threshold: f64) -> Vec<usize> {
    assert_eq!(series.jerk.len(), series.snap.len() + 1, "jerk/snap length mismatch");
    series
        .jerk
        .iter()
        .zip(&series.snap)
        .enumerate()
        .filter(|(_, (j, s))| j.abs() > jerk_threshold || s.abs() > snap_threshold)
        .map(|(i, _)| i)
        .collect()
}

pub fn half_window_samples(seconds: f64, sample_rate: f64) -> usize {
    ((seconds * sample_rate).round() as usize).max(1)
}

/// Index of the largest `|jerk| + |snap|` within `center ± half_window`.
pub fn local_peak(series: &DerivativeSeries, center: usize, half_window: usize) -> usize {
    let last = series.len() - 1;
    let lo = center.saturating_sub(half_window);
    let hi = (center + half_window).min(last);
    let mut best = lo;
    for i in lo..=hi {
        if series.combined(i) > series.combined(best) {
            best = i;
        }
    }
    best
}

/// Re-centres every spike on its local peak and takes `peak ± half_window`.
/// Returns the sorted union of all expanded ranges.
pub fn expand_spikes(series: &DerivativeSeries, mask: &[usize], half_window: usize) -> Vec<usize> {
    if series.is_empty() {
        return Vec::new();
    }
    let last = series.len() - 1;
    let mut roi = BTreeSet::new();
    for &i in mask {
        let peak = local_peak(series, i, half_window);
        let lo = peak.saturating_sub(half_window);
        let hi = (peak + half_window).min(last);
        roi.extend(lo..=hi);
    }
    roi.into_iter().collect()
}

pub fn get_roi_indices(
    series: &DerivativeSeries,
    jerk_threshold: f64,
    snap_threshold: f64,
    half_window: usize,
) -> Vec<usize> {
    let mask = spike_mask(series, jerk_threshold, snap_threshold);
    debug!("{} samples exceed the jerk/snap thresholds", mask.len());
    expand_spikes(series, &mask, half_window)
}

/// Splits a sorted index set into contiguous regions, each represented by its
/// largest `|jerk| + |snap|` sample.
pub fn group_indices(indices: &[usize], series: &DerivativeSeries) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut iter = indices.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        let peak = (start..=end)
            .fold(start, |best, i| if series.combined(i) > series.combined(best) { i } else { best });
        regions.push(Region::new(start, end + 1, peak, series.combined(peak)));
    }
    regions
}

pub struct SpikeDetector {
    pub thresholds: SpikeThresholds,
    pub half_window_seconds: f64,
}

impl SpikeDetector {
    pub fn new(config: &SpikeConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            half_window_seconds: config.half_window_seconds,
        }
    }

    fn thresholds_for(&self, series: &DerivativeSeries) -> Result<(Calibration, Calibration)> {
        match self.thresholds {
            SpikeThresholds::Fixed { jerk, snap } => Ok((Calibration::fixed(jerk), Calibration::fixed(snap))),
            SpikeThresholds::Calibrated { factor, percentile } => {
                let jerk = set_jerk_threshold(&series.jerk, factor, percentile)?;
                // Two samples leave no snap; nothing can exceed an infinite threshold.
                let snap = if series.snap.is_empty() {
                    Calibration::fixed(f64::INFINITY)
                } else {
                    set_snap_threshold(&series.snap, factor, percentile)?
                };
                Ok((jerk, snap))
            }
        }
    }
}

impl AttemptDetector for SpikeDetector {
    fn name(&self) -> &'static str {
        "spike"
    }

    fn detect(&self, input: &DetectionInput) -> Result<Detection> {
        let derivatives = calculate_derivatives(input.signal.axis(Axis::Z), &input.signal.times)?;
        let (jerk, snap) = self.thresholds_for(&derivatives)?;
        let half_window = half_window_samples(self.half_window_seconds, input.sample_rate);
        debug!(
            "Spike thresholds: jerk {:.4e}, snap {:.4e}, half window {} samples",
            jerk.threshold, snap.threshold, half_window
        );

        let roi_indices = get_roi_indices(&derivatives, jerk.threshold, snap.threshold, half_window);
        let attempts = Attempts::new(group_indices(&roi_indices, &derivatives))?;
        info!(
            "Spike detector found {} region(s) covering {} samples",
            attempts.len(),
            roi_indices.len()
        );

        Ok(Detection {
            attempts,
            detail: DetectionDetail::Spike {
                derivatives,
                jerk,
                snap,
                roi_indices,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::filter::ConditionedSignal;
    use crate::recording::{Recording, Sample};

    fn series(jerk: &[f64], snap: &[f64]) -> DerivativeSeries {
        DerivativeSeries {
            jerk: jerk.to_vec(),
            snap: snap.to_vec(),
        }
    }

    #[test]
    fn test_single_spike_expands_to_bounds() {
        let s = series(&[1.0, 2.0, 9.0, 2.0, 1.0], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(spike_mask(&s, 5.0, 100.0), vec![2]);
        assert_eq!(get_roi_indices(&s, 5.0, 100.0, 2), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_snap_mask_and_last_jerk_excluded() {
        let s = series(&[0.0, 0.0, 0.0, 9.0], &[0.0, 7.0, 0.0]);
        // jerk[3] has no snap partner and is never masked on its own.
        assert_eq!(spike_mask(&s, 5.0, 5.0), vec![1]);
    }

    #[test]
    fn test_recentres_on_local_peak() {
        let mut jerk = vec![0.0; 30];
        jerk[10] = 6.0;
        jerk[13] = 20.0;
        let s = series(&jerk, &vec![0.0; 29]);
        assert_eq!(local_peak(&s, 10, 3), 13);
        assert_eq!(get_roi_indices(&s, 5.0, 100.0, 3), (10..=16).collect::<Vec<_>>());
    }

    #[test]
    fn test_groups_become_regions() {
        let mut jerk = vec![0.0; 40];
        jerk[5] = 10.0;
        jerk[30] = 12.0;
        let s = series(&jerk, &vec![0.0; 39]);
        let roi = get_roi_indices(&s, 5.0, 100.0, 2);
        let regions = group_indices(&roi, &s);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].indices(), 3..8);
        assert_eq!(regions[0].peak_index, 5);
        assert_eq!(regions[1].indices(), 28..33);
        assert_eq!(regions[1].peak_value, 12.0);
    }

    #[test]
    fn test_overlapping_spikes_merge() {
        let mut jerk = vec![0.0; 40];
        jerk[10] = 10.0;
        jerk[14] = 10.0;
        let s = series(&jerk, &vec![0.0; 39]);
        let roi = get_roi_indices(&s, 5.0, 100.0, 3);
        assert_eq!(roi, (7..=17).collect::<Vec<_>>());
        assert_eq!(group_indices(&roi, &s).len(), 1);
    }

    #[test]
    fn test_half_window_samples() {
        assert_eq!(half_window_samples(0.5, 200.0), 100);
        assert_eq!(half_window_samples(0.5, 1.0), 1);
        assert_eq!(half_window_samples(0.001, 10.0), 1);
    }

    fn input_for(z: &[f64]) -> (Recording, ConditionedSignal) {
        let samples = z
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(i as f64 * 0.1, 0.0, 0.0, v))
            .collect();
        let rec = Recording::new(samples).unwrap();
        let signal = ConditionedSignal::raw(&rec);
        (rec, signal)
    }

    #[test]
    fn test_detector_with_fixed_thresholds() {
        let mut z = vec![9.8; 60];
        z[15] = 14.0;
        z[45] = 16.0;
        let (rec, signal) = input_for(&z);
        let input = DetectionInput {
            recording: &rec,
            signal: &signal,
            sample_rate: 10.0,
        };
        let detector = SpikeDetector {
            thresholds: SpikeThresholds::Fixed { jerk: 20.0, snap: 1e9 },
            half_window_seconds: 0.2,
        };
        let detection = detector.detect(&input).unwrap();
        assert_eq!(detection.attempts.len(), 2);
        assert_eq!(detection.attempts.failed_count(), 1);
        assert!(detection.attempts.successful().start > 40);
    }

    #[test]
    fn test_detector_without_spikes_fails() {
        let (rec, signal) = input_for(&[9.8; 20]);
        let input = DetectionInput {
            recording: &rec,
            signal: &signal,
            sample_rate: 10.0,
        };
        let detector = SpikeDetector {
            thresholds: SpikeThresholds::Fixed { jerk: 1.0, snap: 1.0 },
            half_window_seconds: 0.5,
        };
        assert!(matches!(detector.detect(&input), Err(Error::NoAttemptDetected)));
    }
}
