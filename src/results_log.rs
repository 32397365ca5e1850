use crate::error::Result;
use crate::score::{ScoreBasis, ScoreResult};
use chrono::{DateTime, Local};
use csv::WriterBuilder;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE: &str = "RS_output.csv";
pub const HEADER: [&str; 6] = [
    "Date",
    "Case_Number",
    "Number_Failed_Attempts",
    "sa_2axes_py",
    "sumua_py",
    "rs_2axes_py",
];
const DATE_FORMAT: &str = "%Y-%m-%d_%H.%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Case_Number")]
    pub case_number: String,
    #[serde(rename = "Number_Failed_Attempts")]
    pub failed_attempts: usize,
    #[serde(rename = "sa_2axes_py")]
    pub sa_2axes: f64,
    /// Empty when the successful attempt was the only one.
    #[serde(rename = "sumua_py")]
    pub sumua: Option<f64>,
    #[serde(rename = "rs_2axes_py")]
    pub recovery_score: f64,
}

impl LogEntry {
    pub fn new(case_number: &str, score: &ScoreResult, when: DateTime<Local>) -> Self {
        Self {
            date: when.format(DATE_FORMAT).to_string(),
            case_number: case_number.to_string(),
            failed_attempts: score.failed_attempts,
            sa_2axes: score.sa_2axes,
            sumua: match score.basis {
                ScoreBasis::FailedAttempts => Some(score.sumua),
                ScoreBasis::SuccessfulAttempt => None,
            },
            recovery_score: score.recovery_score,
        }
    }
}

/// Append-only CSV of one row per processed recording.
pub struct ResultsLog {
    path: PathBuf,
}

impl ResultsLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let log = Self {
            path: path.as_ref().to_path_buf(),
        };
        log.init()?;
        Ok(log)
    }

    fn init(&self) -> Result<()> {
        let is_empty = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if is_empty {
            info!("Creating results log at {}", self.path.display());
            let mut wtr = csv::Writer::from_path(&self.path)?;
            wtr.write_record(HEADER)?;
            wtr.flush()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
        wtr.serialize(entry)?;
        wtr.flush()?;
        info!("Logged results for {} to {}", entry.case_number, self.path.display());
        Ok(())
    }

    pub fn record(&self, case_number: &str, score: &ScoreResult) -> Result<LogEntry> {
        let entry = LogEntry::new(case_number, score, Local::now());
        self.append(&entry)?;
        Ok(entry)
    }

    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let mut rdr = csv::Reader::from_path(&self.path)?;
        let mut entries = Vec::new();
        for row in rdr.deserialize() {
            entries.push(row?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn score(failed: usize, basis: ScoreBasis) -> ScoreResult {
        ScoreResult {
            failed_attempts: failed,
            peaks: Vec::new(),
            sa_2axes: 5.5,
            sa: 11.0,
            sumua: 21.25,
            recovery_score: 42.0,
            basis,
        }
    }

    #[test]
    fn test_creates_header_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("RS_output.csv");
        let log = ResultsLog::open(&path).unwrap();
        assert_eq!(log.path(), path.as_path());
        log.record("case7", &score(2, ScoreBasis::FailedAttempts)).unwrap();
        log.record("case8", &score(0, ScoreBasis::SuccessfulAttempt)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Case_Number,Number_Failed_Attempts,sa_2axes_py,sumua_py,rs_2axes_py"
        );
        assert!(lines.next().unwrap().ends_with(",case7,2,5.5,21.25,42.0"));
        assert!(lines.next().unwrap().ends_with(",case8,0,5.5,,42.0"));

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sumua, Some(21.25));
        assert_eq!(entries[1].sumua, None);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        ResultsLog::open(&path)
            .unwrap()
            .record("a", &score(1, ScoreBasis::FailedAttempts))
            .unwrap();
        let log = ResultsLog::open(&path).unwrap();
        log.record("b", &score(1, ScoreBasis::FailedAttempts)).unwrap();
        let cases: Vec<String> = log.entries().unwrap().into_iter().map(|e| e.case_number).collect();
        assert_eq!(cases, vec!["a", "b"]);
    }

    #[test]
    fn test_date_format() {
        let when = Local.with_ymd_and_hms(2024, 12, 3, 9, 5, 0).unwrap();
        let entry = LogEntry::new("c", &score(0, ScoreBasis::SuccessfulAttempt), when);
        assert_eq!(entry.date, "2024-12-03_09.05");
    }
}
