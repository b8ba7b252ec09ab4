use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stimulus category within the oddball paradigm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Standard,
    Deviant,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Standard => "standard",
            Category::Deviant => "deviant",
        }
    }

    pub fn is_deviant(&self) -> bool {
        matches!(self, Category::Deviant)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stimulus id -> EEG trigger code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerTable {
    codes: BTreeMap<String, u16>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a code, returning the previous one for this id if any.
    pub fn insert(&mut self, stimulus: impl Into<String>, code: u16) -> Option<u16> {
        self.codes.insert(stimulus.into(), code)
    }

    pub fn get(&self, stimulus: &str) -> Option<u16> {
        self.codes.get(stimulus).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u16)> for TriggerTable {
    fn from_iter<I: IntoIterator<Item = (S, u16)>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
