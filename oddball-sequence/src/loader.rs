use std::fs;
use std::path::Path;

use oddball_core::{BlockDefinition, TriggerTable};

use crate::error::LoadError;

/// Parses block definitions, one per line:
/// `<name> <standard,standard,...> <deviant,deviant,...>`.
pub fn parse_blocks(text: &str) -> Result<Vec<BlockDefinition>, LoadError> {
    let mut blocks = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let &[name, standards, deviants] = fields.as_slice() else {
            return Err(LoadError::MalformedBlockLine {
                line: idx + 1,
                content: line.to_string(),
            });
        };
        blocks.push(BlockDefinition {
            name: name.to_string(),
            standards: split_ids(standards, idx + 1, line)?,
            deviants: split_ids(deviants, idx + 1, line)?,
        });
    }
    Ok(blocks)
}

fn split_ids(field: &str, line: usize, content: &str) -> Result<Vec<String>, LoadError> {
    field
        .split(',')
        .map(|id| {
            if id.is_empty() {
                Err(LoadError::EmptyStimulusId {
                    line,
                    content: content.to_string(),
                })
            } else {
                Ok(id.to_string())
            }
        })
        .collect()
}

/// Parses `<stimulus>\t<code>` lines into a trigger table.
pub fn parse_trigger_table(text: &str) -> Result<TriggerTable, LoadError> {
    let mut table = TriggerTable::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = || LoadError::MalformedTriggerLine {
            line: idx + 1,
            content: line.to_string(),
        };
        let (stimulus, code) = line.split_once('\t').ok_or_else(malformed)?;
        let stimulus = stimulus.trim();
        if stimulus.is_empty() {
            return Err(malformed());
        }
        let code: u16 = code.trim().parse().map_err(|_| malformed())?;
        if table.insert(stimulus, code).is_some() {
            return Err(LoadError::DuplicateTrigger {
                line: idx + 1,
                stimulus: stimulus.to_string(),
            });
        }
    }
    Ok(table)
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_blocks<P: AsRef<Path>>(path: P) -> Result<Vec<BlockDefinition>, LoadError> {
    parse_blocks(&read(path.as_ref())?)
}

pub fn load_trigger_table<P: AsRef<Path>>(path: P) -> Result<TriggerTable, LoadError> {
    parse_trigger_table(&read(path.as_ref())?)
}
