use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use oddball_sequence::SequenceConfig;
use serde::{Deserialize, Serialize};

/// Upper bound on the post-stimulus tail, in seconds.
const MAX_TAIL_S: f64 = 60.0;

/// Experiment settings, read from a JSON file.
///
/// Relative paths are resolved against the directory holding the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub exp_name: String,
    pub file_prefix: String,
    pub blocks_file: PathBuf,
    pub trigger_file: PathBuf,
    pub stimulus_dir: PathBuf,
    pub data_dir: PathBuf,
    #[serde(flatten)]
    pub sequence: SequenceConfig,
    /// Silence kept after each stimulus before the trigger line is cleared.
    pub stimulus_tail_s: f64,
    pub pause_code: u8,
    pub resume_code: u8,
    pub volume: f32,
    pub port_device: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exp_name: "F0".into(),
            file_prefix: "CUE2024".into(),
            blocks_file: "blocks.txt".into(),
            trigger_file: "trigger_codes.txt".into(),
            stimulus_dir: "stimuli".into(),
            data_dir: "data".into(),
            sequence: SequenceConfig::default(),
            stimulus_tail_s: 0.1,
            pause_code: 222,
            resume_code: 223,
            volume: 0.8,
            port_device: None,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or defaults relative to the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read settings {}", path.display()))?;
                let mut settings: Settings = serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse settings {}", path.display()))?;
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                settings.resolve_paths(base);
                settings
            }
            None => Settings::default(),
        };
        settings.validate()?;
        settings.volume = settings.volume.clamp(0.0, 1.0);
        Ok(settings)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.blocks_file,
            &mut self.trigger_file,
            &mut self.stimulus_dir,
            &mut self.data_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(device) = self.port_device.as_mut().filter(|d| d.is_relative()) {
            *device = base.join(&*device);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.sequence.validate()?;
        if !(0.0..=MAX_TAIL_S).contains(&self.stimulus_tail_s) {
            bail!("stimulus_tail_s must be between 0 and {MAX_TAIL_S} seconds");
        }
        if self.exp_name.is_empty() {
            bail!("exp_name must not be empty");
        }
        Ok(())
    }
}

/// Participant identifier as typed by the operator ("0001").
///
/// The label is kept verbatim for file names; the number selects the block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub label: String,
    pub number: u32,
}

impl FromStr for Participant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let number = label
            .parse()
            .map_err(|_| format!("participant id '{label}' is not a non-negative integer"))?;
        Ok(Self {
            label: label.to_string(),
            number,
        })
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_keeps_leading_zeros() {
        let p: Participant = "0005".parse().unwrap();
        assert_eq!(p.label, "0005");
        assert_eq!(p.number, 5);
        assert!("abc".parse::<Participant>().is_err());
        assert!("-1".parse::<Participant>().is_err());
    }

    #[test]
    fn partial_file_overrides_defaults_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oddball.json");
        fs::write(
            &path,
            r#"{ "exp_name": "pilot", "num_reps": 10, "interdeviant_range": [3, 6], "data_dir": "/tmp/out" }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.exp_name, "pilot");
        assert_eq!(settings.sequence.num_reps, 10);
        assert_eq!(settings.sequence.interdeviant_range, (3, 6));
        assert_eq!(settings.sequence.isi_range_s, (0.7, 0.95));
        assert_eq!(settings.blocks_file, dir.path().join("blocks.txt"));
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/out"));
        assert_eq!(settings.pause_code, 222);
    }

    #[test]
    fn invalid_ranges_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{ "isi_range_s": [1.0, 0.5] }"#).unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }

    #[test]
    fn oversized_tail_is_rejected() {
        let settings = Settings {
            stimulus_tail_s: 1e12,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("stimulus_tail_s"));

        let settings = Settings {
            stimulus_tail_s: f64::NAN,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
