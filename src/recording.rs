use crate::config::RecordingConfig;
use crate::error::{Error, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One accelerometer reading. Time in seconds, acceleration in m/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(time: f64, x: f64, y: f64, z: f64) -> Self {
        Self { time, x, y, z }
    }

    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// A validated, time-ordered recording.
///
/// `offset` is the row of the first sample in the recording as loaded, so
/// samples stay traceable after leading rows are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    samples: Vec<Sample>,
    offset: usize,
}

impl Recording {
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::EmptyRecording);
        }
        for (i, s) in samples.iter().enumerate() {
            if !(s.time.is_finite() && s.x.is_finite() && s.y.is_finite() && s.z.is_finite()) {
                return Err(Error::InvalidInput(format!("non-finite value in sample {}", i)));
            }
        }
        if let Some(i) = samples.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(Error::NonMonotonicTimestamp { index: i + 1 });
        }
        Ok(Self { samples, offset: 0 })
    }

    /// Samples from `start` onwards. `start` must leave at least one sample.
    pub(crate) fn suffix(&self, start: usize) -> Recording {
        assert!(start < self.samples.len(), "suffix start {} out of bounds", start);
        Recording {
            samples: self.samples[start..].to_vec(),
            offset: self.offset + start,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn axis(&self, axis: Axis) -> Vec<f64> {
        self.samples.iter().map(|s| s.axis(axis)).collect()
    }

    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => 0.0,
        }
    }

    /// `1 / mean(dt)`; `None` for a single sample.
    pub fn estimated_sample_rate(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let mean_dt = self.duration() / (self.samples.len() - 1) as f64;
        Some(1.0 / mean_dt)
    }
}

pub fn load_recording<P: AsRef<Path>>(path: P, config: &RecordingConfig) -> Result<Recording> {
    let path = path.as_ref();
    info!("Loading recording from {}", path.display());
    let file = File::open(path)?;
    let recording = read_recording(BufReader::new(file), config)?;
    info!(
        "Loaded {} samples spanning {:.2}s",
        recording.len(),
        recording.duration()
    );
    Ok(recording)
}

pub fn read_recording<R: Read>(reader: R, config: &RecordingConfig) -> Result<Recording> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let columns = &config.columns;

    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };
    let idx = [find(&columns.time)?, find(&columns.x)?, find(&columns.y)?, find(&columns.z)?];
    debug!("Column positions (time, x, y, z): {:?}", idx);

    let mut samples = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = row + 2;
        let time = parse_field(&record, idx[0], &columns.time, line)?;
        samples.push(Sample {
            time: time * config.time_scale,
            x: parse_field(&record, idx[1], &columns.x, line)?,
            y: parse_field(&record, idx[2], &columns.y, line)?,
            z: parse_field(&record, idx[3], &columns.z, line)?,
        });
    }

    Recording::new(samples)
}

fn parse_field(record: &StringRecord, idx: usize, name: &str, line: usize) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| Error::InvalidInput(format!("line {}: missing value for '{}'", line, name)))?;
    raw.parse::<f64>().map_err(|e| {
        Error::InvalidInput(format!("line {}: invalid value '{}' for '{}': {}", line, raw, name, e))
    })
}
