use crate::config::AnalysisConfig;
use crate::detect::{detector_for, Attempts, DetectionDetail, DetectionInput};
use crate::error::{Error, Result};
use crate::filter::{condition, initial_filter};
use crate::recording::Recording;
use crate::roi::{extract_roi_values, RoiSample};
use crate::score::{compute_score, ScoreFormula, ScoreResult};
use log::{info, warn};

/// Everything one pass over a recording produced.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub score: ScoreResult,
    pub attempts: Attempts,
    pub roi: Vec<RoiSample>,
    pub detail: DetectionDetail,
    /// Rows dropped by the initial orientation filter.
    pub offset: usize,
    pub sample_rate: f64,
}

fn resolve_sample_rate(recording: &Recording, config: &AnalysisConfig) -> Result<f64> {
    if let Some(rate) = config.recording.sample_rate {
        return Ok(rate);
    }
    let rate = recording.estimated_sample_rate().ok_or(Error::InsufficientData {
        required: 2,
        available: recording.len(),
    })?;
    warn!("No sample rate configured; estimated {:.2}Hz from timestamps", rate);
    Ok(rate)
}

/// Runs the full pipeline. Pure in `(recording, config)`: recalibration simply
/// calls this again with a different config.
pub fn analyze(recording: &Recording, config: &AnalysisConfig, formula: &dyn ScoreFormula) -> Result<Analysis> {
    config.validate()?;

    let filtered = initial_filter(recording, config.conditioning.target_value)?;
    info!(
        "Initial filter kept {} of {} samples (offset {})",
        filtered.len(),
        recording.len(),
        filtered.offset()
    );
    if filtered.len() < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            available: filtered.len(),
        });
    }

    let sample_rate = resolve_sample_rate(&filtered, config)?;
    let signal = condition(&filtered, &config.conditioning, sample_rate)?;

    let detector = detector_for(config);
    let input = DetectionInput {
        recording: &filtered,
        signal: &signal,
        sample_rate,
    };
    let detection = detector.detect(&input)?;
    info!(
        "{} detector: {} attempt(s), {} failed",
        detector.name(),
        detection.attempts.len(),
        detection.attempts.failed_count()
    );

    let roi = extract_roi_values(&filtered, &detection.attempts);
    let score = compute_score(&detection.attempts, &roi, formula);

    Ok(Analysis {
        score,
        attempts: detection.attempts,
        roi,
        detail: detection.detail,
        offset: filtered.offset(),
        sample_rate,
    })
}
