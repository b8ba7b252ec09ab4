use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SequenceError {
    #[error("stimulus '{stimulus}' in block '{block}' has no trigger code")]
    UnknownStimulus { stimulus: String, block: String },

    #[error("block ordering is defined for {expected} blocks, got {found}")]
    BlockCountMismatch { expected: usize, found: usize },

    #[error("block '{block}' has no {category} stimuli")]
    EmptyStimulusSet { block: String, category: &'static str },

    #[error("invalid {name} range [{min}, {max}]")]
    InvalidRange {
        name: &'static str,
        min: String,
        max: String,
    },

    #[error("trigger code {code} for '{stimulus}' overflows when offset by {offset}")]
    TriggerOverflow {
        stimulus: String,
        code: u16,
        offset: u16,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected '<name> <standards> <deviants>', got '{content}'")]
    MalformedBlockLine { line: usize, content: String },

    #[error("line {line}: empty stimulus id in '{content}'")]
    EmptyStimulusId { line: usize, content: String },

    #[error("line {line}: expected '<stimulus>\\t<code>', got '{content}'")]
    MalformedTriggerLine { line: usize, content: String },

    #[error("line {line}: duplicate trigger entry for '{stimulus}'")]
    DuplicateTrigger { line: usize, stimulus: String },
}
