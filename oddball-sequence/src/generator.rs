use log::{debug, info};
use oddball_core::{BlockDefinition, Category, TrialRecord, TriggerTable};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::SequenceConfig;
use crate::error::SequenceError;
use crate::order::block_order;

/// Builds a participant's trial list from block definitions.
///
/// Generation is pure apart from the random source: every input is checked
/// before the first trial is drawn, so a failure never leaves a partial list.
pub struct SequenceGenerator<'a> {
    config: &'a SequenceConfig,
    triggers: &'a TriggerTable,
}

impl<'a> SequenceGenerator<'a> {
    pub fn new(config: &'a SequenceConfig, triggers: &'a TriggerTable) -> Self {
        Self { config, triggers }
    }

    /// Full trial list for `participant`, blocks in the counterbalanced order.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        blocks: &[BlockDefinition],
        participant: u32,
        rng: &mut R,
    ) -> Result<Vec<TrialRecord>, SequenceError> {
        let order = block_order(participant, blocks.len())?;
        info!(
            "participant {} block order: {:?}",
            participant,
            order.iter().map(|&i| blocks[i].name.as_str()).collect::<Vec<_>>()
        );
        self.generate_blocks(order.iter().map(|&i| &blocks[i]), rng)
    }

    /// Trial list for blocks already in presentation order.
    pub fn generate_blocks<'b, R, I>(
        &self,
        blocks: I,
        rng: &mut R,
    ) -> Result<Vec<TrialRecord>, SequenceError>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = &'b BlockDefinition>,
    {
        self.config.validate()?;
        let blocks: Vec<&BlockDefinition> = blocks.into_iter().collect();
        for block in &blocks {
            self.check_block(block)?;
        }

        let mut trials = Vec::new();
        for block in blocks {
            let before = trials.len();
            self.push_block(block, rng, &mut trials)?;
            debug!("block '{}': {} trials", block.name, trials.len() - before);
        }
        Ok(trials)
    }

    fn check_block(&self, block: &BlockDefinition) -> Result<(), SequenceError> {
        if block.standards.is_empty() {
            return Err(SequenceError::EmptyStimulusSet {
                block: block.name.clone(),
                category: Category::Standard.as_str(),
            });
        }
        if block.deviants.is_empty() {
            return Err(SequenceError::EmptyStimulusSet {
                block: block.name.clone(),
                category: Category::Deviant.as_str(),
            });
        }
        for stimulus in block.stimuli() {
            self.code_for(block, stimulus)?;
        }
        for deviant in &block.deviants {
            self.deviant_code(block, deviant)?;
        }
        Ok(())
    }

    fn push_block<R: Rng + ?Sized>(
        &self,
        block: &BlockDefinition,
        rng: &mut R,
        out: &mut Vec<TrialRecord>,
    ) -> Result<(), SequenceError> {
        let mut deviants: Vec<&str> = (0..self.config.num_reps)
            .map(|_| block.deviants[rng.random_range(0..block.deviants.len())].as_str())
            .collect();
        deviants.shuffle(rng);

        let (run_min, run_max) = self.config.interdeviant_range;
        for deviant in deviants {
            let run_length = rng.random_range(run_min..=run_max);
            for _ in 0..run_length {
                let standard = &block.standards[rng.random_range(0..block.standards.len())];
                out.push(TrialRecord {
                    stim: standard.clone(),
                    cat: Category::Standard,
                    isi: self.sample_isi(rng),
                    trigger: self.code_for(block, standard)?,
                    block: block.name.clone(),
                });
            }
            out.push(TrialRecord {
                stim: deviant.to_string(),
                cat: Category::Deviant,
                isi: self.sample_isi(rng),
                trigger: self.deviant_code(block, deviant)?,
                block: block.name.clone(),
            });
        }
        Ok(())
    }

    /// Uniform draw from `[min, max)`; a degenerate range yields `min`.
    fn sample_isi<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (lo, hi) = self.config.isi_range_s;
        lo + (hi - lo) * rng.random::<f64>() - self.config.isi_offset_s
    }

    fn code_for(&self, block: &BlockDefinition, stimulus: &str) -> Result<u16, SequenceError> {
        self.triggers
            .get(stimulus)
            .ok_or_else(|| SequenceError::UnknownStimulus {
                stimulus: stimulus.to_string(),
                block: block.name.clone(),
            })
    }

    fn deviant_code(&self, block: &BlockDefinition, stimulus: &str) -> Result<u16, SequenceError> {
        let code = self.code_for(block, stimulus)?;
        let offset = self.config.deviant_trigger_offset;
        code.checked_add(offset)
            .ok_or_else(|| SequenceError::TriggerOverflow {
                stimulus: stimulus.to_string(),
                code,
                offset,
            })
    }
}
