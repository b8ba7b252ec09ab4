use serde::{Deserialize, Serialize};

/// One experimental block: its name plus the stimulus pools it draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub name: String,
    pub standards: Vec<String>,
    pub deviants: Vec<String>,
}

impl BlockDefinition {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        standards: impl IntoIterator<Item = S>,
        deviants: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            standards: standards.into_iter().map(Into::into).collect(),
            deviants: deviants.into_iter().map(Into::into).collect(),
        }
    }

    /// Every stimulus id the block can emit, standards first.
    pub fn stimuli(&self) -> impl Iterator<Item = &str> {
        self.standards
            .iter()
            .chain(self.deviants.iter())
            .map(String::as_str)
    }
}
