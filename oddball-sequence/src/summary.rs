use std::collections::BTreeMap;
use std::fmt;

use oddball_core::TrialRecord;

/// Per-block counts of a generated sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummary {
    pub name: String,
    pub standards: usize,
    pub deviants: usize,
    pub deviant_counts: BTreeMap<String, usize>,
    /// Standards preceding each deviant, in order.
    pub run_lengths: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceSummary {
    pub blocks: Vec<BlockSummary>,
}

impl SequenceSummary {
    /// Groups consecutive trials by block name.
    pub fn of(trials: &[TrialRecord]) -> Self {
        let mut blocks: Vec<BlockSummary> = Vec::new();
        let mut run = 0;
        for trial in trials {
            if blocks.last().is_none_or(|b| b.name != trial.block) {
                blocks.push(BlockSummary {
                    name: trial.block.clone(),
                    standards: 0,
                    deviants: 0,
                    deviant_counts: BTreeMap::new(),
                    run_lengths: Vec::new(),
                });
                run = 0;
            }
            let Some(current) = blocks.last_mut() else {
                continue;
            };
            if trial.is_deviant() {
                current.deviants += 1;
                *current.deviant_counts.entry(trial.stim.clone()).or_default() += 1;
                current.run_lengths.push(run);
                run = 0;
            } else {
                current.standards += 1;
                run += 1;
            }
        }
        Self { blocks }
    }

    pub fn total_trials(&self) -> usize {
        self.blocks.iter().map(|b| b.standards + b.deviants).sum()
    }
}

impl fmt::Display for SequenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(
                f,
                "{}: {} standards, {} deviants (",
                block.name, block.standards, block.deviants
            )?;
            for (i, (id, n)) in block.deviant_counts.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{id}×{n}")?;
            }
            writeln!(f, ")")?;
        }
        write!(f, "total: {} trials", self.total_trials())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oddball_core::Category;

    fn trial(stim: &str, cat: Category, block: &str) -> TrialRecord {
        TrialRecord {
            stim: stim.into(),
            cat,
            isi: 0.7,
            trigger: 1,
            block: block.into(),
        }
    }

    #[test]
    fn counts_runs_per_block() {
        use Category::*;
        let trials = [
            trial("s1", Standard, "A"),
            trial("s1", Standard, "A"),
            trial("d1", Deviant, "A"),
            trial("d2", Deviant, "A"),
            trial("s2", Standard, "B"),
            trial("d1", Deviant, "B"),
        ];
        let summary = SequenceSummary::of(&trials);
        assert_eq!(summary.blocks.len(), 2);
        assert_eq!(summary.blocks[0].run_lengths, [2, 0]);
        assert_eq!(summary.blocks[0].deviant_counts["d2"], 1);
        assert_eq!(summary.blocks[1].standards, 1);
        assert_eq!(summary.total_trials(), 6);
        assert!(summary.to_string().ends_with("total: 6 trials"));
    }
}
