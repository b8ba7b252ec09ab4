use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use oddball_core::{SessionPhase, TrialRecord, TrialState};
use oddball_timing::Timer;

use crate::audio::{stimulus_path, AudioSink};
use crate::datafile::SessionLog;
use crate::operator::{Operator, OperatorCommand};
use crate::settings::Settings;
use crate::trigger::{trigger_byte, TriggerPort};

const WELCOME: &str = "Please wait for the experimenter to begin the experiment.";
const PAUSED: &str = "Paused. Press SPACE to continue.";
const BREAK: &str = "BREAK!\nPlease wait for the experimenter.";
const DEBRIEF: &str = "Thank you!\nThat's the end of the experiment. Please wait for the experimenter.";

/// Session parameters that do not vary per trial.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub stimulus_dir: PathBuf,
    pub stimulus_tail: Duration,
    pub pause_code: u8,
    pub resume_code: u8,
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            stimulus_dir: settings.stimulus_dir.clone(),
            stimulus_tail: Duration::from_secs_f64(settings.stimulus_tail_s),
            pause_code: settings.pause_code,
            resume_code: settings.resume_code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed { trials: usize },
    Aborted { after_trials: usize },
}

/// Presents a generated trial list.
///
/// Every trial is an ISI of silence, then the stimulus with its trigger code
/// raised at onset, then a short tail after which the trigger line is cleared.
pub struct Session<T, P, A, O, W>
where
    T: Timer,
    P: TriggerPort,
    A: AudioSink,
    O: Operator,
    W: Write,
{
    pub phase: SessionPhase,
    pub timer: T,
    pub port: P,
    pub audio: A,
    pub operator: O,
    pub log: SessionLog<W>,
    pub config: SessionConfig,
    pub state: Option<TrialState>,
    pub trial_number: usize,
    pub deviants_seen: usize,
}

impl<T, P, A, O, W> Session<T, P, A, O, W>
where
    T: Timer,
    P: TriggerPort,
    A: AudioSink,
    O: Operator,
    W: Write,
{
    pub fn new(
        config: SessionConfig,
        timer: T,
        port: P,
        audio: A,
        operator: O,
        log: SessionLog<W>,
    ) -> Self {
        Self {
            phase: SessionPhase::default(),
            timer,
            port,
            audio,
            operator,
            log,
            config,
            state: None,
            trial_number: 0,
            deviants_seen: 0,
        }
    }

    pub fn run(&mut self, trials: &[TrialRecord]) -> Result<SessionOutcome> {
        let codes = port_codes(trials)?;
        info!(
            "session start: {} trials, trigger port {}",
            trials.len(),
            self.port.describe()
        );
        self.operator.wait_for_continue(WELCOME)?;
        self.advance_phase();

        for (index, (trial, &code)) in trials.iter().zip(&codes).enumerate() {
            if let Err(err) = self.present_trial(index, trial, code) {
                self.release_outputs();
                return Err(err.context(format!("trial {} ({})", index + 1, trial.stim)));
            }
            self.trial_number += 1;

            if self.handle_operator()? {
                warn!("session aborted by operator after {} trials", self.trial_number);
                return Ok(SessionOutcome::Aborted {
                    after_trials: self.trial_number,
                });
            }

            let next_block = trials.get(index + 1).map(|t| t.block.as_str());
            if next_block.is_some_and(|next| next != trial.block) {
                self.take_break(&trial.block)?;
            }
        }

        self.phase = SessionPhase::Debrief;
        self.operator.wait_for_continue(DEBRIEF)?;
        info!(
            "session complete: {} trials, {} deviants",
            self.trial_number, self.deviants_seen
        );
        Ok(SessionOutcome::Completed {
            trials: self.trial_number,
        })
    }

    fn advance_phase(&mut self) {
        if let Some(next) = self.phase.next() {
            debug!("phase {} -> {}", self.phase.label(), next.label());
            self.phase = next;
        }
    }

    fn present_trial(&mut self, index: usize, trial: &TrialRecord, code: u8) -> Result<()> {
        if !self.phase.allows_playback() {
            bail!("cannot present a stimulus in phase {}", self.phase.label());
        }
        let path = stimulus_path(&self.config.stimulus_dir, &trial.stim);
        let start = self.timer.now();

        self.state = Some(TrialState::Isi);
        let duration = self.audio.load(&path)?;
        self.timer.sleep_until(start.saturating_add(seconds_to_ns(trial.isi)));

        self.port.set_data(code)?;
        self.audio.play()?;
        let onset = self.timer.now();
        self.state = Some(TrialState::Stimulus);

        let tail = duration.saturating_add(self.config.stimulus_tail);
        let tail_ns = u64::try_from(tail.as_nanos()).unwrap_or(u64::MAX);
        self.timer.sleep_until(onset.saturating_add(tail_ns));
        self.audio.stop();
        self.port.set_data(0)?;
        self.state = Some(TrialState::Complete);

        if trial.is_deviant() {
            self.deviants_seen += 1;
        }
        debug!(
            "trial {} {} {} trigger {} onset {:.4}s",
            index + 1,
            trial.cat,
            trial.stim,
            code,
            onset as f64 / 1e9
        );
        self.log
            .record(index, trial, onset as f64 / 1e9, duration.as_secs_f64())
            .context("failed to write session log")
    }

    /// Handles pending operator commands; returns true when the session must stop.
    fn handle_operator(&mut self) -> Result<bool> {
        match self.operator.poll() {
            Some(OperatorCommand::Abort) => Ok(true),
            Some(OperatorCommand::Pause) => {
                self.phase = SessionPhase::Paused;
                self.port.set_data(self.config.pause_code)?;
                self.operator.wait_for_continue(PAUSED)?;
                self.port.set_data(self.config.resume_code)?;
                self.advance_phase();
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn take_break(&mut self, finished_block: &str) -> Result<()> {
        info!(
            "block '{}' finished after {} trials, {} deviants so far",
            finished_block, self.trial_number, self.deviants_seen
        );
        self.phase = SessionPhase::Break;
        self.operator.wait_for_continue(BREAK)?;
        self.advance_phase();
        Ok(())
    }

    fn release_outputs(&mut self) {
        if self.state == Some(TrialState::Stimulus) {
            self.audio.stop();
        }
        if let Err(err) = self.port.set_data(0) {
            warn!("failed to clear trigger port: {err:#}");
        }
    }
}

/// Port bytes for every trial, checked before anything is presented.
pub fn port_codes(trials: &[TrialRecord]) -> Result<Vec<u8>> {
    trials
        .iter()
        .enumerate()
        .map(|(index, trial)| {
            trigger_byte(trial.trigger)
                .with_context(|| format!("trial {} ({})", index + 1, trial.stim))
        })
        .collect()
}

/// Negative intervals collapse to zero; huge ones saturate.
fn seconds_to_ns(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1e9).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Participant;
    use oddball_core::Category;
    use oddball_timing::SimulatedTimer;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingPort {
        timer: Option<Rc<SimulatedTimer>>,
        writes: Vec<(u64, u8)>,
    }

    impl TriggerPort for RecordingPort {
        fn set_data(&mut self, code: u8) -> Result<()> {
            let at = self.timer.as_ref().map_or(0, |t| t.now());
            self.writes.push((at, code));
            Ok(())
        }
        fn describe(&self) -> String {
            "recording".into()
        }
    }

    struct FixedAudio {
        duration: Duration,
        loaded: Vec<PathBuf>,
        plays: usize,
        stops: usize,
    }

    impl FixedAudio {
        fn new(ms: u64) -> Self {
            Self {
                duration: Duration::from_millis(ms),
                loaded: Vec::new(),
                plays: 0,
                stops: 0,
            }
        }
    }

    impl AudioSink for FixedAudio {
        fn load(&mut self, path: &Path) -> Result<Duration> {
            self.loaded.push(path.to_path_buf());
            Ok(self.duration)
        }
        fn play(&mut self) -> Result<()> {
            self.plays += 1;
            Ok(())
        }
        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    #[derive(Default)]
    struct ScriptedOperator {
        polls: VecDeque<Option<OperatorCommand>>,
        prompts: Vec<String>,
    }

    impl Operator for ScriptedOperator {
        fn wait_for_continue(&mut self, message: &str) -> Result<()> {
            self.prompts.push(message.to_string());
            Ok(())
        }
        fn poll(&mut self) -> Option<OperatorCommand> {
            self.polls.pop_front().flatten()
        }
    }

    type TestSession =
        Session<Rc<SimulatedTimer>, RecordingPort, FixedAudio, ScriptedOperator, Vec<u8>>;

    fn session(operator: ScriptedOperator) -> TestSession {
        let timer = Rc::new(SimulatedTimer::new());
        let port = RecordingPort {
            timer: Some(timer.clone()),
            writes: Vec::new(),
        };
        let participant: Participant = "1".parse().unwrap();
        let config = SessionConfig {
            stimulus_dir: PathBuf::from("stimuli"),
            stimulus_tail: Duration::from_millis(100),
            pause_code: 222,
            resume_code: 223,
        };
        Session::new(
            config,
            timer,
            port,
            FixedAudio::new(200),
            operator,
            SessionLog::from_writer(Vec::new(), &participant, "01"),
        )
    }

    fn trial(stim: &str, cat: Category, trigger: u16, block: &str) -> TrialRecord {
        TrialRecord {
            stim: stim.into(),
            cat,
            isi: 0.6,
            trigger,
            block: block.into(),
        }
    }

    fn two_blocks() -> Vec<TrialRecord> {
        vec![
            trial("s1", Category::Standard, 11, "A"),
            trial("d1", Category::Deviant, 121, "A"),
            trial("s2", Category::Standard, 12, "B"),
            trial("d2", Category::Deviant, 122, "B"),
        ]
    }

    #[test]
    fn trigger_raised_after_isi_and_cleared_after_tail() {
        let mut s = session(ScriptedOperator::default());
        let trials = [trial("s1", Category::Standard, 11, "A")];
        let outcome = s.run(&trials).unwrap();

        assert_eq!(outcome, SessionOutcome::Completed { trials: 1 });
        assert_eq!(s.port.writes, [(600_000_000, 11), (900_000_000, 0)]);
        assert_eq!(s.audio.loaded, [PathBuf::from("stimuli/s1.wav")]);
        assert_eq!((s.audio.plays, s.audio.stops), (1, 1));
        assert_eq!(s.state, Some(TrialState::Complete));
        assert_eq!(s.phase, SessionPhase::Debrief);
    }

    #[test]
    fn break_between_blocks_only() {
        let mut s = session(ScriptedOperator::default());
        s.run(&two_blocks()).unwrap();

        assert_eq!(s.operator.prompts, [WELCOME, BREAK, DEBRIEF]);
        assert_eq!(s.deviants_seen, 2);
        let codes: Vec<u8> = s.port.writes.iter().map(|&(_, c)| c).collect();
        assert_eq!(codes, [11, 0, 121, 0, 12, 0, 122, 0]);
    }

    #[test]
    fn pause_sends_pause_and_resume_codes() {
        let operator = ScriptedOperator {
            polls: VecDeque::from([Some(OperatorCommand::Pause)]),
            ..Default::default()
        };
        let mut s = session(operator);
        s.run(&[
            trial("s1", Category::Standard, 11, "A"),
            trial("d1", Category::Deviant, 121, "A"),
        ])
        .unwrap();

        let codes: Vec<u8> = s.port.writes.iter().map(|&(_, c)| c).collect();
        assert_eq!(codes, [11, 0, 222, 223, 121, 0]);
        assert_eq!(s.operator.prompts, [WELCOME, PAUSED, DEBRIEF]);
    }

    #[test]
    fn abort_stops_and_keeps_log() {
        let operator = ScriptedOperator {
            polls: VecDeque::from([None, Some(OperatorCommand::Abort)]),
            ..Default::default()
        };
        let mut s = session(operator);
        let outcome = s.run(&two_blocks()).unwrap();

        assert_eq!(outcome, SessionOutcome::Aborted { after_trials: 2 });
        assert_eq!(s.log.rows(), 2);
        assert!(!s.operator.prompts.iter().any(|p| p == DEBRIEF));
    }

    #[test]
    fn onsets_follow_schedule() {
        let mut s = session(ScriptedOperator::default());
        let trials = [
            trial("s1", Category::Standard, 11, "A"),
            trial("s1", Category::Standard, 11, "A"),
        ];
        s.run(&trials).unwrap();
        let TestSession { log, .. } = s;
        let text = String::from_utf8(log.finish().unwrap()).unwrap();
        let onsets: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').nth(8).unwrap())
            .collect();
        // 0.6 ISI, 0.2 stimulus, 0.1 tail: second onset at 0.9 + 0.6.
        assert_eq!(onsets, ["0.6", "1.5"]);
    }

    #[test]
    fn oversized_trigger_fails_before_welcome() {
        let mut s = session(ScriptedOperator::default());
        let err = s
            .run(&[trial("s1", Category::Deviant, 300, "A")])
            .unwrap_err();
        assert!(format!("{err:#}").contains("does not fit"));
        assert!(s.port.writes.is_empty());
        assert!(s.operator.prompts.is_empty());
        assert_eq!(s.audio.plays, 0);
    }

    #[test]
    fn late_oversized_trigger_presents_nothing() {
        let mut s = session(ScriptedOperator::default());
        let err = s
            .run(&[
                trial("s1", Category::Standard, 11, "A"),
                trial("s1", Category::Standard, 11, "A"),
                trial("d1", Category::Deviant, 300, "A"),
            ])
            .unwrap_err();

        assert_eq!(
            format!("{err:#}"),
            "trial 3 (d1): trigger code 300 does not fit an 8-bit port"
        );
        assert_eq!(s.log.rows(), 0);
        assert_eq!(s.audio.plays, 0);
        assert!(s.audio.loaded.is_empty());
        assert_eq!(s.phase, SessionPhase::Welcome);
    }

    #[test]
    fn port_codes_narrow_each_trigger() {
        let codes = port_codes(&two_blocks()).unwrap();
        assert_eq!(codes, [11, 121, 12, 122]);
    }

    #[test]
    fn huge_isi_saturates_the_schedule() {
        let mut s = session(ScriptedOperator::default());
        let mut late = trial("s2", Category::Standard, 12, "A");
        late.isi = 1e11;
        let outcome = s
            .run(&[trial("s1", Category::Standard, 11, "A"), late])
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Completed { trials: 2 });
        assert_eq!(s.log.rows(), 2);
        assert_eq!(s.port.writes.last(), Some(&(u64::MAX, 0)));
    }

    #[test]
    fn playback_outside_running_is_refused() {
        let mut s = session(ScriptedOperator::default());
        let err = s
            .present_trial(0, &trial("s1", Category::Standard, 11, "A"), 11)
            .unwrap_err();
        assert!(err.to_string().contains("welcome"));
        assert_eq!(s.audio.plays, 0);
    }
}
