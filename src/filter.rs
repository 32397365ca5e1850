//! Signal conditioning applied before attempt detection.
//!
//! Conditioning only feeds the detectors. Peak accelerations for scoring are
//! always read back from the unconditioned recording.

use crate::config::{ConditioningConfig, KalmanConfig, Smoother};
use crate::error::{Error, Result};
use crate::recording::{Axis, Recording};
use biquad::{Biquad, Coefficients, DirectForm1, Type, Q_BUTTERWORTH_F64};
use log::{debug, info};

/// Smoothed per-axis values aligned 1:1 with the recording they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedSignal {
    pub times: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl ConditionedSignal {
    /// The recording's values unchanged.
    pub fn raw(recording: &Recording) -> Self {
        Self {
            times: recording.times(),
            x: recording.axis(Axis::X),
            y: recording.axis(Axis::Y),
            z: recording.axis(Axis::Z),
        }
    }

    fn map_axes<F: FnMut(&[f64]) -> Vec<f64>>(recording: &Recording, mut f: F) -> Self {
        Self {
            times: recording.times(),
            x: f(&recording.axis(Axis::X)),
            y: f(&recording.axis(Axis::Y)),
            z: f(&recording.axis(Axis::Z)),
        }
    }

    pub fn axis(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Drops leading samples until `|z|` first reaches `target_value`, i.e. the
/// subject has settled into sternal recumbency.
pub fn initial_filter(recording: &Recording, target_value: f64) -> Result<Recording> {
    let start = recording
        .samples()
        .iter()
        .position(|s| s.z.abs() >= target_value)
        .ok_or(Error::NoStableOrientation {
            target: target_value,
        })?;
    debug!("Initial filter: dropping {} leading samples", start);
    Ok(recording.suffix(start))
}

/// Trailing moving average. The first `window - 1` outputs average however
/// many samples are available so the output keeps the input length.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        out.push(sum / (i + 1).min(window) as f64);
    }
    out
}

pub fn apply_moving_average(recording: &Recording, window: usize) -> Result<ConditionedSignal> {
    if window == 0 {
        return Err(Error::InvalidConfig("moving-average window must be at least 1".into()));
    }
    Ok(ConditionedSignal::map_axes(recording, |v| moving_average(v, window)))
}

/// Scalar Kalman filter with constant state model and fixed noise.
#[derive(Debug, Clone, Copy)]
pub struct ScalarKalman {
    process_variance: f64,
    measurement_variance: f64,
    estimate: f64,
    error_variance: f64,
}

impl ScalarKalman {
    pub fn new(config: &KalmanConfig, initial: f64) -> Self {
        Self {
            process_variance: config.process_variance,
            measurement_variance: config.measurement_variance,
            estimate: initial,
            error_variance: config.initial_estimate_variance,
        }
    }

    pub fn update(&mut self, measurement: f64) -> f64 {
        // Predict
        let p = self.error_variance + self.process_variance;
        // Update
        let gain = p / (p + self.measurement_variance);
        self.estimate += gain * (measurement - self.estimate);
        self.error_variance = (1.0 - gain) * p;
        self.estimate
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn error_variance(&self) -> f64 {
        self.error_variance
    }
}

pub fn kalman(values: &[f64], config: &KalmanConfig) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let mut filter = ScalarKalman::new(config, first);
    values.iter().map(|&v| filter.update(v)).collect()
}

pub fn apply_kalman_filter(
    recording: &Recording,
    process_variance: f64,
    measurement_variance: f64,
    initial_estimate_variance: f64,
) -> ConditionedSignal {
    let config = KalmanConfig {
        process_variance,
        measurement_variance,
        initial_estimate_variance,
    };
    ConditionedSignal::map_axes(recording, |v| kalman(v, &config))
}

/// Zero-phase filtering: one forward and one reverse pass.
///
/// Each pass runs relative to its first sample so the filter does not start
/// from a step against the ~9.8 m/s² gravity offset.
pub fn forward_backward_filter<F: Biquad<f64>>(signal: &mut [f64], filter: &mut F) {
    run_pass(signal, filter);
    signal.reverse();
    run_pass(signal, filter);
    signal.reverse();
}

fn run_pass<F: Biquad<f64>>(signal: &mut [f64], filter: &mut F) {
    let Some(&base) = signal.first() else {
        return;
    };
    signal.iter_mut().for_each(|x| *x = filter.run(*x - base) + base);
    filter.reset_state();
}

/// Coefficients for a corner at `freq` Hz. `freq` must lie strictly inside
/// `(0, fs / 2)`.
pub fn make_coefficients(f_type: Type<f64>, fs: f64, freq: f64, q: f64) -> Result<Coefficients<f64>> {
    if !(freq > 0.0 && freq < fs / 2.0) {
        return Err(Error::InvalidConfig(format!(
            "filter frequency {}Hz must be between 0 and Nyquist ({}Hz)",
            freq,
            fs / 2.0
        )));
    }
    Coefficients::<f64>::from_normalized_params(f_type, 2.0 * freq / fs, q).map_err(|_| {
        Error::InvalidConfig(format!(
            "cannot build filter at {}Hz for sample rate {}Hz",
            freq, fs
        ))
    })
}

pub fn apply_lowpass(recording: &Recording, sample_rate: f64, cutoff_hz: f64) -> Result<ConditionedSignal> {
    let coeffs = make_coefficients(Type::LowPass, sample_rate, cutoff_hz, Q_BUTTERWORTH_F64)?;
    let mut lpf = DirectForm1::<f64>::new(coeffs);
    Ok(ConditionedSignal::map_axes(recording, |v| {
        let mut out = v.to_vec();
        forward_backward_filter(&mut out, &mut lpf);
        out
    }))
}

/// Runs the configured smoother over an initially filtered recording.
pub fn condition(
    recording: &Recording,
    config: &ConditioningConfig,
    sample_rate: f64,
) -> Result<ConditionedSignal> {
    let signal = match config.smoother {
        Smoother::MovingAverage => apply_moving_average(recording, config.moving_average)?,
        Smoother::Kalman => apply_kalman_filter(
            recording,
            config.kalman.process_variance,
            config.kalman.measurement_variance,
            config.kalman.initial_estimate_variance,
        ),
        Smoother::Lowpass => apply_lowpass(recording, sample_rate, config.lowpass_cutoff)?,
        Smoother::None => ConditionedSignal::raw(recording),
    };
    info!("Applied {:?} smoothing to {} samples", config.smoother, signal.len());
    Ok(signal)
}
