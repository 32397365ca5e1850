use crate::error::{Error, Result};
use log::debug;

/// First (jerk) and second (snap) time-derivatives of a signal.
///
/// `jerk.len() == snap.len() + 1` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeSeries {
    pub jerk: Vec<f64>,
    pub snap: Vec<f64>,
}

impl DerivativeSeries {
    /// `|jerk[i]| + |snap[i]|`, with snap taken as zero past its end.
    pub fn combined(&self, i: usize) -> f64 {
        self.jerk[i].abs() + self.snap.get(i).map_or(0.0, |s| s.abs())
    }

    pub fn len(&self) -> usize {
        self.jerk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jerk.is_empty()
    }
}

/// Forward differences over irregular timestamps.
pub fn calculate_derivatives(values: &[f64], times: &[f64]) -> Result<DerivativeSeries> {
    if values.len() != times.len() {
        return Err(Error::InvalidInput(format!(
            "{} values but {} timestamps",
            values.len(),
            times.len()
        )));
    }
    if values.len() < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            available: values.len(),
        });
    }

    let dt: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    if let Some(i) = dt.iter().position(|&d| !(d > 0.0)) {
        return Err(Error::NonMonotonicTimestamp { index: i + 1 });
    }

    let jerk: Vec<f64> = values
        .windows(2)
        .zip(&dt)
        .map(|(w, &d)| (w[1] - w[0]) / d)
        .collect();
    let snap: Vec<f64> = jerk
        .windows(2)
        .zip(&dt[1..])
        .map(|(w, &d)| (w[1] - w[0]) / d)
        .collect();

    assert_eq!(jerk.len(), snap.len() + 1, "jerk/snap length mismatch");
    debug!("Derivatives: jerk length {}, snap length {}", jerk.len(), snap.len());

    Ok(DerivativeSeries { jerk, snap })
}
