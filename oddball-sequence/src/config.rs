use serde::{Deserialize, Serialize};

use crate::error::SequenceError;

/// Numeric parameters of the sequence generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Deviant-terminated runs per block.
    pub num_reps: usize,
    /// Inclusive bounds on the number of standards before each deviant.
    pub interdeviant_range: (usize, usize),
    /// ISI is drawn from `[min, max)` seconds.
    pub isi_range_s: (f64, f64),
    /// Subtracted from every drawn ISI to absorb the post-stimulus tail.
    pub isi_offset_s: f64,
    /// Added to a deviant's table code.
    pub deviant_trigger_offset: u16,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            num_reps: 70,
            interdeviant_range: (5, 11),
            isi_range_s: (0.7, 0.95),
            isi_offset_s: 0.1,
            deviant_trigger_offset: 100,
        }
    }
}

impl SequenceConfig {
    pub fn validate(&self) -> Result<(), SequenceError> {
        let (lo, hi) = self.interdeviant_range;
        if lo > hi {
            return Err(SequenceError::InvalidRange {
                name: "inter-deviant",
                min: lo.to_string(),
                max: hi.to_string(),
            });
        }
        let (lo, hi) = self.isi_range_s;
        if !lo.is_finite() || !hi.is_finite() || lo > hi || !self.isi_offset_s.is_finite() {
            return Err(SequenceError::InvalidRange {
                name: "ISI",
                min: lo.to_string(),
                max: hi.to_string(),
            });
        }
        Ok(())
    }
}
