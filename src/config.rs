//! Analysis configuration.
//!
//! Every pipeline stage receives an [`AnalysisConfig`]; nothing is read from
//! module-level state. A KDL file can override any subset of the defaults:
//!
//! ```kdl
//! recording time-scale=0.001
//! conditioning target-value=9.0 smoother="kalman"
//! windowing window-size=10000 step-size=2000 threshold=1.5
//! spike factor=3.0 percentile=99.0
//! ```

use crate::error::Error;
use knuffel::Decode;
use log::debug;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoother {
    MovingAverage,
    Kalman,
    Lowpass,
    None,
}

impl FromStr for Smoother {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moving-average" | "moving_average" | "ma" => Ok(Smoother::MovingAverage),
            "kalman" => Ok(Smoother::Kalman),
            "lowpass" | "low-pass" => Ok(Smoother::Lowpass),
            "none" | "raw" => Ok(Smoother::None),
            other => Err(Error::InvalidConfig(format!("unknown smoother '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    WindowSd,
    Spike,
}

impl FromStr for DetectionMethod {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "window-sd" | "window_sd" | "sd" => Ok(DetectionMethod::WindowSd),
            "spike" | "derivative" | "jerk" => Ok(DetectionMethod::Spike),
            other => Err(Error::InvalidConfig(format!("unknown detection method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    pub time: String,
    pub x: String,
    pub y: String,
    pub z: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            time: "timeStamp".to_string(),
            x: "Acc_X".to_string(),
            y: "Acc_Y".to_string(),
            z: "Acc_Z".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfig {
    /// Multiplier converting stored timestamps to seconds.
    pub time_scale: f64,
    /// Estimated from the timestamps when absent.
    pub sample_rate: Option<f64>,
    pub columns: Columns,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            sample_rate: None,
            columns: Columns::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanConfig {
    pub process_variance: f64,
    pub measurement_variance: f64,
    pub initial_estimate_variance: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_variance: 1e-5,
            measurement_variance: 1e-1,
            initial_estimate_variance: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditioningConfig {
    /// Vertical acceleration marking sternal recumbency.
    pub target_value: f64,
    pub smoother: Smoother,
    pub moving_average: usize,
    pub lowpass_cutoff: f64,
    pub kalman: KalmanConfig,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            target_value: 9.0,
            smoother: Smoother::MovingAverage,
            moving_average: 4,
            lowpass_cutoff: 5.0,
            kalman: KalmanConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSdConfig {
    pub window_size: usize,
    pub step_size: usize,
    pub threshold: f64,
}

impl Default for WindowSdConfig {
    fn default() -> Self {
        // 10000 samples is 2 s and 2000 is 0.4 s at 5 ms per sample.
        Self {
            window_size: 10000,
            step_size: 2000,
            threshold: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpikeThresholds {
    Fixed { jerk: f64, snap: f64 },
    Calibrated { factor: f64, percentile: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeConfig {
    pub thresholds: SpikeThresholds,
    pub half_window_seconds: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            thresholds: SpikeThresholds::Calibrated {
                factor: 3.0,
                percentile: 99.0,
            },
            half_window_seconds: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub failed_slope: f64,
    pub failed_intercept: f64,
    pub successful_slope: f64,
    pub successful_intercept: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            failed_slope: 1.0,
            failed_intercept: 0.0,
            successful_slope: 1.0,
            successful_intercept: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisConfig {
    pub recording: RecordingConfig,
    pub conditioning: ConditioningConfig,
    pub method: DetectionMethod,
    pub window_sd: WindowSdConfig,
    pub spike: SpikeConfig,
    pub scoring: ScoringConfig,
}

impl Default for DetectionMethod {
    fn default() -> Self {
        DetectionMethod::WindowSd
    }
}

impl AnalysisConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.kdl".to_string());
        Self::from_kdl(&name, &content)
    }

    pub fn from_kdl(file_name: &str, content: &str) -> crate::Result<Self> {
        let file: ConfigFile = knuffel::parse(file_name, content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", file_name, e)))?;
        let config = file.into_config()?;
        config.validate()?;
        debug!("Loaded configuration from {}: {:?}", file_name, config);
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !(self.recording.time_scale > 0.0) {
            return Err(Error::InvalidConfig("time-scale must be positive".into()));
        }
        if let Some(rate) = self.recording.sample_rate {
            if !(rate > 0.0) {
                return Err(Error::InvalidConfig("sample-rate must be positive".into()));
            }
        }
        if self.conditioning.moving_average == 0 {
            return Err(Error::InvalidConfig("moving-average window must be at least 1".into()));
        }
        if !(self.conditioning.lowpass_cutoff > 0.0) {
            return Err(Error::InvalidConfig("lowpass-cutoff must be positive".into()));
        }
        if self.window_sd.window_size == 0 || self.window_sd.step_size == 0 {
            return Err(Error::InvalidConfig("window-size and step-size must be at least 1".into()));
        }
        if !(self.spike.half_window_seconds > 0.0) {
            return Err(Error::InvalidConfig("half-window-seconds must be positive".into()));
        }
        if let SpikeThresholds::Calibrated { percentile, .. } = self.spike.thresholds {
            if !(0.0..=100.0).contains(&percentile) {
                return Err(Error::InvalidConfig(format!(
                    "percentile must be within [0, 100], got {}",
                    percentile
                )));
            }
        }
        Ok(())
    }

    /// The scalar that interactive recalibration replaces for the active method.
    pub fn sensitivity(&self) -> f64 {
        match self.method {
            DetectionMethod::WindowSd => self.window_sd.threshold,
            DetectionMethod::Spike => match self.spike.thresholds {
                SpikeThresholds::Fixed { jerk, .. } => jerk,
                SpikeThresholds::Calibrated { factor, .. } => factor,
            },
        }
    }

    pub fn with_sensitivity(&self, value: f64) -> Self {
        let mut next = self.clone();
        match next.method {
            DetectionMethod::WindowSd => next.window_sd.threshold = value,
            DetectionMethod::Spike => match &mut next.spike.thresholds {
                SpikeThresholds::Fixed { jerk, .. } => *jerk = value,
                SpikeThresholds::Calibrated { factor, .. } => *factor = value,
            },
        }
        next
    }
}

#[derive(Decode, Debug)]
struct ConfigFile {
    #[knuffel(child)]
    recording: Option<RecordingNode>,
    #[knuffel(child)]
    columns: Option<ColumnsNode>,
    #[knuffel(child)]
    conditioning: Option<ConditioningNode>,
    #[knuffel(child)]
    kalman: Option<KalmanNode>,
    #[knuffel(child)]
    detector: Option<DetectorNode>,
    #[knuffel(child)]
    windowing: Option<WindowingNode>,
    #[knuffel(child)]
    spike: Option<SpikeNode>,
    #[knuffel(child)]
    scoring: Option<ScoringNode>,
}

#[derive(Decode, Debug)]
struct RecordingNode {
    #[knuffel(property(name = "time-scale"))]
    time_scale: Option<f64>,
    #[knuffel(property(name = "sample-rate"))]
    sample_rate: Option<f64>,
}

#[derive(Decode, Debug)]
struct ColumnsNode {
    #[knuffel(property)]
    time: Option<String>,
    #[knuffel(property)]
    x: Option<String>,
    #[knuffel(property)]
    y: Option<String>,
    #[knuffel(property)]
    z: Option<String>,
}

#[derive(Decode, Debug)]
struct ConditioningNode {
    #[knuffel(property(name = "target-value"))]
    target_value: Option<f64>,
    #[knuffel(property)]
    smoother: Option<String>,
    #[knuffel(property(name = "moving-average"))]
    moving_average: Option<u64>,
    #[knuffel(property(name = "lowpass-cutoff"))]
    lowpass_cutoff: Option<f64>,
}

#[derive(Decode, Debug)]
struct KalmanNode {
    #[knuffel(property(name = "process-variance"))]
    process_variance: Option<f64>,
    #[knuffel(property(name = "measurement-variance"))]
    measurement_variance: Option<f64>,
    #[knuffel(property(name = "initial-estimate-variance"))]
    initial_estimate_variance: Option<f64>,
}

#[derive(Decode, Debug)]
struct DetectorNode {
    #[knuffel(property)]
    method: Option<String>,
}

#[derive(Decode, Debug)]
struct WindowingNode {
    #[knuffel(property(name = "window-size"))]
    window_size: Option<u64>,
    #[knuffel(property(name = "step-size"))]
    step_size: Option<u64>,
    #[knuffel(property)]
    threshold: Option<f64>,
}

#[derive(Decode, Debug)]
struct SpikeNode {
    #[knuffel(property(name = "jerk-threshold"))]
    jerk_threshold: Option<f64>,
    #[knuffel(property(name = "snap-threshold"))]
    snap_threshold: Option<f64>,
    #[knuffel(property)]
    factor: Option<f64>,
    #[knuffel(property)]
    percentile: Option<f64>,
    #[knuffel(property(name = "half-window-seconds"))]
    half_window_seconds: Option<f64>,
}

#[derive(Decode, Debug)]
struct ScoringNode {
    #[knuffel(property(name = "failed-slope"))]
    failed_slope: Option<f64>,
    #[knuffel(property(name = "failed-intercept"))]
    failed_intercept: Option<f64>,
    #[knuffel(property(name = "successful-slope"))]
    successful_slope: Option<f64>,
    #[knuffel(property(name = "successful-intercept"))]
    successful_intercept: Option<f64>,
}

impl ConfigFile {
    fn into_config(self) -> crate::Result<AnalysisConfig> {
        let mut config = AnalysisConfig::default();

        if let Some(node) = self.recording {
            if let Some(v) = node.time_scale {
                config.recording.time_scale = v;
            }
            if let Some(v) = node.sample_rate {
                config.recording.sample_rate = Some(v);
            }
        }
        if let Some(node) = self.columns {
            let columns = &mut config.recording.columns;
            if let Some(v) = node.time {
                columns.time = v;
            }
            if let Some(v) = node.x {
                columns.x = v;
            }
            if let Some(v) = node.y {
                columns.y = v;
            }
            if let Some(v) = node.z {
                columns.z = v;
            }
        }
        if let Some(node) = self.conditioning {
            let conditioning = &mut config.conditioning;
            if let Some(v) = node.target_value {
                conditioning.target_value = v;
            }
            if let Some(v) = node.smoother {
                conditioning.smoother = v.parse()?;
            }
            if let Some(v) = node.moving_average {
                conditioning.moving_average = v as usize;
            }
            if let Some(v) = node.lowpass_cutoff {
                conditioning.lowpass_cutoff = v;
            }
        }
        if let Some(node) = self.kalman {
            let kalman = &mut config.conditioning.kalman;
            if let Some(v) = node.process_variance {
                kalman.process_variance = v;
            }
            if let Some(v) = node.measurement_variance {
                kalman.measurement_variance = v;
            }
            if let Some(v) = node.initial_estimate_variance {
                kalman.initial_estimate_variance = v;
            }
        }
        if let Some(method) = self.detector.and_then(|n| n.method) {
            config.method = method.parse()?;
        }
        if let Some(node) = self.windowing {
            if let Some(v) = node.window_size {
                config.window_sd.window_size = v as usize;
            }
            if let Some(v) = node.step_size {
                config.window_sd.step_size = v as usize;
            }
            if let Some(v) = node.threshold {
                config.window_sd.threshold = v;
            }
        }
        if let Some(node) = self.spike {
            config.spike.thresholds = match (node.jerk_threshold, node.snap_threshold) {
                (Some(jerk), Some(snap)) => SpikeThresholds::Fixed { jerk, snap },
                (None, None) => {
                    let (mut factor, mut percentile) = (3.0, 99.0);
                    if let Some(v) = node.factor {
                        factor = v;
                    }
                    if let Some(v) = node.percentile {
                        percentile = v;
                    }
                    SpikeThresholds::Calibrated { factor, percentile }
                }
                _ => {
                    return Err(Error::InvalidConfig(
                        "jerk-threshold and snap-threshold must be given together".into(),
                    ))
                }
            };
            if let Some(v) = node.half_window_seconds {
                config.spike.half_window_seconds = v;
            }
        }
        if let Some(node) = self.scoring {
            let scoring = &mut config.scoring;
            if let Some(v) = node.failed_slope {
                scoring.failed_slope = v;
            }
            if let Some(v) = node.failed_intercept {
                scoring.failed_intercept = v;
            }
            if let Some(v) = node.successful_slope {
                scoring.successful_slope = v;
            }
            if let Some(v) = node.successful_intercept {
                scoring.successful_intercept = v;
            }
        }

        Ok(config)
    }
}
