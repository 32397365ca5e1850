//! Interactive accept/recalibrate loop around [`analyze`].
//!
//! The session owns the only mutable state of a run: the current
//! configuration. Each recalibration swaps in a config with a new sensitivity
//! and recomputes the whole pipeline.

use crate::analysis::{analyze, Analysis};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::recording::Recording;
use crate::score::ScoreFormula;
use log::{info, warn};
use std::io::{BufRead, Write};
use std::str::FromStr;

const DECISION_PROMPT: &str = "continue or re calculate with different threshold? (C/R) ";
const THRESHOLD_PROMPT: &str = "Enter new threshold ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Recalibrate,
}

impl FromStr for Decision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" => Ok(Decision::Accept),
            "r" => Ok(Decision::Recalibrate),
            other => Err(Error::InvalidInput(format!("unknown option '{}'", other))),
        }
    }
}

enum State {
    /// Recompute; on a detection failure fall back to the carried config.
    Compute(AnalysisConfig),
    Prompt,
    Recalibrate,
}

pub struct Session<I, O> {
    input: I,
    output: O,
    config: AnalysisConfig,
    auto_accept: bool,
}

impl<I: BufRead, O: Write> Session<I, O> {
    pub fn new(input: I, output: O, config: AnalysisConfig) -> Self {
        Self {
            input,
            output,
            config,
            auto_accept: false,
        }
    }

    /// Accept the first analysis without prompting.
    pub fn auto_accept(mut self, yes: bool) -> Self {
        self.auto_accept = yes;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&mut self, recording: &Recording, formula: &dyn ScoreFormula) -> Result<Analysis> {
        let mut current = self.compute(recording, formula)?;
        if self.auto_accept {
            return Ok(current);
        }

        let mut state = State::Prompt;
        loop {
            state = match state {
                State::Compute(previous) => {
                    match self.compute(recording, formula) {
                        Ok(analysis) => current = analysis,
                        Err(e @ (Error::NoAttemptDetected | Error::InsufficientData { .. })) => {
                            warn!("Recalibrated analysis failed: {}", e);
                            writeln!(self.output, "{}; keeping the previous result", e)?;
                            self.config = previous;
                        }
                        Err(e) => return Err(e),
                    }
                    State::Prompt
                }
                State::Prompt => {
                    let line = self.read_line(DECISION_PROMPT)?;
                    match line.parse::<Decision>() {
                        Ok(Decision::Accept) => return Ok(current),
                        Ok(Decision::Recalibrate) => State::Recalibrate,
                        Err(_) => {
                            writeln!(
                                self.output,
                                "invalid option. Enter either \"c\" to continue or \"r\" to recalculate"
                            )?;
                            State::Prompt
                        }
                    }
                }
                State::Recalibrate => {
                    let line = self.read_line(THRESHOLD_PROMPT)?;
                    match line.trim().parse::<f64>() {
                        Ok(value) if value.is_finite() => {
                            let next = self.config.with_sensitivity(value);
                            let previous = std::mem::replace(&mut self.config, next);
                            writeln!(self.output, "Threshold recalibrated to {}", value)?;
                            info!("Recalibrating with sensitivity {}", value);
                            State::Compute(previous)
                        }
                        _ => {
                            writeln!(self.output, "invalid entry. Enter a float value")?;
                            State::Prompt
                        }
                    }
                }
            };
        }
    }

    fn compute(&mut self, recording: &Recording, formula: &dyn ScoreFormula) -> Result<Analysis> {
        let analysis = analyze(recording, &self.config, formula)?;
        writeln!(
            self.output,
            "Threshold {}: {} attempt(s) detected, {} failed",
            self.config.sensitivity(),
            analysis.attempts.len(),
            analysis.score.failed_attempts
        )?;
        writeln!(self.output, "{}", analysis.detail.describe())?;
        Ok(analysis)
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::InvalidInput("input closed before a decision was made".into()));
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectionMethod, Smoother, SpikeThresholds};
    use crate::recording::Sample;
    use crate::score::LinearFormula;
    use std::io::Cursor;

    fn recording() -> Recording {
        let samples = (0..400)
            .map(|i| {
                let t = i as f64 * 0.01;
                let amp = match i {
                    100..=119 => 3.0,
                    300..=319 => 4.0,
                    _ => 0.0,
                };
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                Sample::new(t, amp * sign, 0.5 * amp, 9.8 + sign * amp)
            })
            .collect();
        Recording::new(samples).unwrap()
    }

    fn config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.window_sd.window_size = 20;
        config.window_sd.step_size = 10;
        config.window_sd.threshold = 1.0;
        config
    }

    fn run(input: &str, config: AnalysisConfig) -> (Result<Analysis>, String, AnalysisConfig) {
        let mut out = Vec::new();
        let mut session = Session::new(Cursor::new(input.as_bytes()), &mut out, config);
        let result = session.run(&recording(), &LinearFormula::default());
        let final_config = session.config().clone();
        drop(session);
        (result, String::from_utf8(out).unwrap(), final_config)
    }

    #[test]
    fn test_decision_parsing() {
        assert_eq!("c".parse::<Decision>().unwrap(), Decision::Accept);
        assert_eq!(" C\n".parse::<Decision>().unwrap(), Decision::Accept);
        assert_eq!("R".parse::<Decision>().unwrap(), Decision::Recalibrate);
        assert!("x".parse::<Decision>().is_err());
        assert!("".parse::<Decision>().is_err());
    }

    #[test]
    fn test_accept_first_result() {
        let (result, out, _) = run("c\n", config());
        assert_eq!(result.unwrap().score.failed_attempts, 1);
        assert_eq!(out.matches(DECISION_PROMPT).count(), 1);
    }

    #[test]
    fn test_recalibrate_then_accept() {
        let (result, out, final_config) = run("r\n3.5\nc\n", config());
        assert_eq!(result.unwrap().score.failed_attempts, 0);
        assert_eq!(final_config.window_sd.threshold, 3.5);
        assert!(out.contains("Threshold recalibrated to 3.5"));
        assert_eq!(out.matches("window sd: ").count(), 2);
        let before_prompt = &out[..out.find(DECISION_PROMPT).unwrap()];
        assert!(before_prompt.contains("max sd 4.0000"));
        assert_eq!(out.matches(DECISION_PROMPT).count(), 2);
    }

    #[test]
    fn test_invalid_entries_reprompt() {
        let (result, out, final_config) = run("maybe\nr\nlots\nc\n", config());
        assert_eq!(result.unwrap().score.failed_attempts, 1);
        assert!(out.contains("invalid option"));
        assert!(out.contains("invalid entry. Enter a float value"));
        assert_eq!(final_config.window_sd.threshold, 1.0);
        assert_eq!(out.matches(DECISION_PROMPT).count(), 3);
    }

    #[test]
    fn test_auto_accept_skips_prompt() {
        let mut out = Vec::new();
        let mut session = Session::new(Cursor::new(&b""[..]), &mut out, config()).auto_accept(true);
        assert!(session.run(&recording(), &LinearFormula::default()).is_ok());
        drop(session);
        assert!(!String::from_utf8(out).unwrap().contains(DECISION_PROMPT));
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let (result, _, _) = run("", config());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_failed_recalibration_keeps_previous_config() {
        let mut spike = config();
        spike.method = DetectionMethod::Spike;
        spike.conditioning.smoother = Smoother::None;
        spike.spike.thresholds = SpikeThresholds::Fixed { jerk: 200.0, snap: 1e9 };
        spike.spike.half_window_seconds = 0.1;
        let (result, out, final_config) = run("r\n1e12\nc\n", spike);
        assert_eq!(result.unwrap().attempts.len(), 2);
        assert!(out.contains("keeping the previous result"));
        assert!(out.contains("jerk threshold 200.0000 (fixed)"));
        assert_eq!(final_config.sensitivity(), 200.0);
    }
}
