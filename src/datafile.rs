use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use oddball_core::{Category, TrialRecord};
use serde::Serialize;

use crate::settings::{Participant, Settings};

/// `<data_dir>/<prefix>_<participant>_<exp_name>_<date>`, extension left to the caller.
pub fn data_stem(settings: &Settings, participant: &Participant, now: DateTime<Local>) -> PathBuf {
    let date = now.format("%Y_%b_%d_%H%M");
    settings.data_dir.join(format!(
        "{}_{}_{}_{}",
        settings.file_prefix, participant.label, settings.exp_name, date
    ))
}

pub fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Serialize)]
struct ConditionRow<'a> {
    trial: usize,
    block: &'a str,
    stim: &'a str,
    cat: Category,
    isi: f64,
    trigger: u16,
}

impl<'a> ConditionRow<'a> {
    fn new(index: usize, trial: &'a TrialRecord) -> Self {
        Self {
            trial: index + 1,
            block: &trial.block,
            stim: &trial.stim,
            cat: trial.cat,
            isi: trial.isi,
            trigger: trial.trigger,
        }
    }
}

/// Writes the planned trial list as CSV.
pub fn write_conditions<W: Write>(writer: W, trials: &[TrialRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for (index, trial) in trials.iter().enumerate() {
        csv.serialize(ConditionRow::new(index, trial))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn save_conditions(path: &Path, trials: &[TrialRecord]) -> Result<()> {
    let file = create_file(path)?;
    write_conditions(file, trials)
        .with_context(|| format!("failed to write conditions {}", path.display()))
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    }
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

// csv cannot serialize flattened structs, so the condition columns repeat here.
#[derive(Debug, Serialize)]
struct SessionRow<'a> {
    trial: usize,
    block: &'a str,
    stim: &'a str,
    cat: Category,
    isi: f64,
    trigger: u16,
    participant: &'a str,
    session: &'a str,
    onset_s: f64,
    duration_s: f64,
}

/// Per-trial record of what was presented, flushed after every row so an
/// aborted session keeps everything played so far.
pub struct SessionLog<W: Write> {
    writer: csv::Writer<W>,
    participant: String,
    session: String,
    rows: usize,
}

impl SessionLog<File> {
    pub fn create(path: &Path, participant: &Participant, session: &str) -> Result<Self> {
        Ok(Self::from_writer(create_file(path)?, participant, session))
    }
}

impl<W: Write> SessionLog<W> {
    pub fn from_writer(writer: W, participant: &Participant, session: &str) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            participant: participant.label.clone(),
            session: session.to_string(),
            rows: 0,
        }
    }

    pub fn record(
        &mut self,
        index: usize,
        trial: &TrialRecord,
        onset_s: f64,
        duration_s: f64,
    ) -> Result<()> {
        self.writer.serialize(SessionRow {
            trial: index + 1,
            block: &trial.block,
            stim: &trial.stim,
            cat: trial.cat,
            isi: trial.isi,
            trigger: trial.trigger,
            participant: &self.participant,
            session: &self.session,
            onset_s,
            duration_s,
        })?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush session log: {}", e.error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trial(stim: &str, cat: Category, trigger: u16) -> TrialRecord {
        TrialRecord {
            stim: stim.into(),
            cat,
            isi: 0.65,
            trigger,
            block: "A".into(),
        }
    }

    #[test]
    fn stem_follows_naming_scheme() {
        let settings = Settings {
            data_dir: "data".into(),
            ..Default::default()
        };
        let participant: Participant = "0007".parse().unwrap();
        let now = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 0).unwrap();
        let stem = data_stem(&settings, &participant, now);
        assert_eq!(stem, PathBuf::from("data/CUE2024_0007_F0_2024_Mar_05_0907"));
        assert_eq!(
            with_suffix(&stem, ".csv"),
            PathBuf::from("data/CUE2024_0007_F0_2024_Mar_05_0907.csv")
        );
    }

    #[test]
    fn conditions_csv_has_header_and_rows() {
        let trials = [trial("s1", Category::Standard, 11), trial("d1", Category::Deviant, 121)];
        let mut buf = Vec::new();
        write_conditions(&mut buf, &trials).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "trial,block,stim,cat,isi,trigger");
        assert_eq!(lines[1], "1,A,s1,standard,0.65,11");
        assert_eq!(lines[2], "2,A,d1,deviant,0.65,121");
    }

    #[test]
    fn session_log_appends_timing_columns() {
        let participant: Participant = "12".parse().unwrap();
        let mut log = SessionLog::from_writer(Vec::new(), &participant, "01");
        log.record(0, &trial("s1", Category::Standard, 11), 0.65, 0.25)
            .unwrap();
        assert_eq!(log.rows(), 1);
        let text = String::from_utf8(log.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "trial,block,stim,cat,isi,trigger,participant,session,onset_s,duration_s"
        );
        assert_eq!(lines[1], "1,A,s1,standard,0.65,11,12,01,0.65,0.25");
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/run_conditions.csv");
        save_conditions(&path, &[trial("s1", Category::Standard, 1)]).unwrap();
        assert!(path.exists());
    }
}
