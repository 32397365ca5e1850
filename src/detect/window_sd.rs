use super::{AttemptDetector, Attempts, Detection, DetectionDetail, DetectionInput, Region};
use crate::config::WindowSdConfig;
use crate::error::Result;
use crate::recording::Axis;
use crate::util::std_dev;
use log::{debug, info, warn};

/// Representative window of one run of above-threshold windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdPeak {
    pub window: usize,
    pub sd: f64,
}

/// Standard deviation of each `window_size` window, advancing by `step_size`.
pub fn calculate_window_sd(values: &[f64], window_size: usize, step_size: usize) -> Vec<f64> {
    assert!(window_size > 0 && step_size > 0, "window and step must be non-zero");
    if values.len() < window_size {
        return Vec::new();
    }
    (0..=values.len() - window_size)
        .step_by(step_size)
        .map(|start| std_dev(&values[start..start + window_size]))
        .collect()
}

/// Groups consecutive windows whose sd exceeds `threshold` into runs and keeps
/// each run's largest window (first one on ties).
///
/// A single flagged window is a run of its own. When no window is flagged at
/// all this yields `(0, 0.0)`, which downstream reads as a single attempt at
/// the start of the recording.
pub fn detect_roi_sd(window_sd: &[f64], threshold: f64) -> Vec<SdPeak> {
    let mut peaks = Vec::new();
    let mut run: Option<SdPeak> = None;
    let mut last_flagged: Option<usize> = None;

    for (i, &sd) in window_sd.iter().enumerate() {
        if !(sd > threshold) {
            continue;
        }
        let contiguous = last_flagged.map_or(false, |l| l + 1 == i);
        match run.as_mut() {
            Some(current) if contiguous => {
                if sd > current.sd {
                    *current = SdPeak { window: i, sd };
                }
            }
            _ => {
                if let Some(done) = run.take() {
                    peaks.push(done);
                }
                run = Some(SdPeak { window: i, sd });
            }
        }
        last_flagged = Some(i);
    }

    match run {
        Some(done) => peaks.push(done),
        None => {
            warn!(
                "No window exceeded sd threshold {}; emitting zero region at window 0",
                threshold
            );
            peaks.push(SdPeak { window: 0, sd: 0.0 });
        }
    }
    peaks
}

/// Sample range covered by a window, clamped to the recording length.
pub fn peak_region(peak: &SdPeak, window_size: usize, step_size: usize, len: usize) -> Region {
    let start = (peak.window * step_size).min(len);
    let end = (start + window_size).min(len);
    Region::new(start, end, start, peak.sd)
}

pub struct WindowSdDetector {
    pub window_size: usize,
    pub step_size: usize,
    pub threshold: f64,
}

impl WindowSdDetector {
    pub fn new(config: &WindowSdConfig) -> Self {
        Self {
            window_size: config.window_size,
            step_size: config.step_size,
            threshold: config.threshold,
        }
    }
}

impl AttemptDetector for WindowSdDetector {
    fn name(&self) -> &'static str {
        "window-sd"
    }

    fn detect(&self, input: &DetectionInput) -> Result<Detection> {
        let z = input.recording.axis(Axis::Z);
        let window_sd = calculate_window_sd(&z, self.window_size, self.step_size);
        debug!(
            "Computed {} window sds (window {}, step {})",
            window_sd.len(),
            self.window_size,
            self.step_size
        );

        let peaks = detect_roi_sd(&window_sd, self.threshold);
        let regions = peaks
            .iter()
            .map(|p| peak_region(p, self.window_size, self.step_size, z.len()))
            .collect();
        let attempts = Attempts::new(regions)?;
        info!(
            "Window-sd detector found {} region(s) above sd {}",
            attempts.len(),
            self.threshold
        );

        Ok(Detection {
            attempts,
            detail: DetectionDetail::WindowSd { window_sd, peaks },
        })
    }
}
