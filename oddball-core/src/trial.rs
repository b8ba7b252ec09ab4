use serde::{Deserialize, Serialize};

use crate::stimulus::Category;

/// Playback state of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Isi,
    Stimulus,
    Complete,
}

/// One row of the generated sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub stim: String,
    pub cat: Category,
    /// Seconds of silence before stimulus onset.
    pub isi: f64,
    pub trigger: u16,
    pub block: String,
}

impl TrialRecord {
    pub fn is_deviant(&self) -> bool {
        self.cat.is_deviant()
    }
}
