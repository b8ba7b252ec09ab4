use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use oddball_core::{BlockDefinition, TrialRecord, TriggerTable};
use oddball_sequence::{load_blocks, load_trigger_table, SequenceGenerator, SequenceSummary};
use oddball_timing::{HighPrecisionTimer, SimulatedTimer, Timer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

mod audio;
mod datafile;
mod operator;
mod session;
mod settings;
mod trigger;

use audio::{missing_stimuli, AudioSink, SilentSink};
use datafile::{data_stem, save_conditions, with_suffix, SessionLog};
use operator::{AutoOperator, ConsoleOperator, Operator};
use session::{port_codes, Session, SessionConfig, SessionOutcome};
use settings::{Participant, Settings};
use trigger::{DevicePort, NullPort, TriggerPort};

#[derive(Parser)]
#[command(
    name = "oddball",
    version,
    about = "Auditory oddball ERP sequence generator and session runner"
)]
struct Cli {
    /// JSON settings file; paths inside it are relative to the file.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log every trial.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a participant's trial list and write it as CSV.
    Generate(GenerateArgs),
    /// Generate a trial list and present it.
    Run(RunArgs),
    /// Validate settings, block definitions, trigger codes and stimulus files.
    Check,
}

#[derive(Args)]
struct SessionArgs {
    /// Participant id; id mod 4 selects the block order.
    #[arg(long, short)]
    participant: Participant,

    #[arg(long, short, default_value = "01")]
    session: String,

    /// Seed for the trial randomization; drawn at random when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct GenerateArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Output file; defaults to `<data stem>_conditions.csv`.
    #[arg(long, short)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Trigger device, overriding `port_device` from the settings.
    #[arg(long, conflicts_with = "no_port")]
    port: Option<PathBuf>,

    /// Do not send trigger codes.
    #[arg(long)]
    no_port: bool,

    /// Run on a simulated clock with silent playback and no operator prompts.
    #[arg(long, alias = "simulate")]
    dry_run: bool,
}

struct Inputs {
    settings: Settings,
    blocks: Vec<BlockDefinition>,
    triggers: TriggerTable,
}

impl Inputs {
    fn load(config: Option<&std::path::Path>) -> Result<Self> {
        let settings = Settings::load(config)?;
        let blocks = load_blocks(&settings.blocks_file)?;
        let triggers = load_trigger_table(&settings.trigger_file)?;
        info!(
            "loaded {} blocks ({}) and {} trigger codes",
            blocks.len(),
            blocks
                .iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            triggers.len()
        );
        Ok(Self {
            settings,
            blocks,
            triggers,
        })
    }

    fn generate(&self, participant: &Participant, seed: Option<u64>) -> Result<Vec<TrialRecord>> {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        info!("participant {participant}: randomization seed {seed}");
        let mut rng = StdRng::seed_from_u64(seed);
        let trials = SequenceGenerator::new(&self.settings.sequence, &self.triggers)
            .generate(&self.blocks, participant.number, &mut rng)
            .with_context(|| format!("failed to generate trials for participant {participant}"))?;
        info!("generated sequence\n{}", SequenceSummary::of(&trials));
        Ok(trials)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    match cli.command {
        Command::Generate(args) => generate(cli.config, args),
        Command::Run(args) => run(cli.config, args),
        Command::Check => check(cli.config),
    }
}

fn generate(config: Option<PathBuf>, args: GenerateArgs) -> Result<()> {
    let inputs = Inputs::load(config.as_deref())?;
    let trials = inputs.generate(&args.session.participant, args.session.seed)?;
    let out = args.out.unwrap_or_else(|| {
        let stem = data_stem(&inputs.settings, &args.session.participant, Local::now());
        with_suffix(&stem, "_conditions.csv")
    });
    save_conditions(&out, &trials)?;
    println!("{} trials written to {}", trials.len(), out.display());
    Ok(())
}

fn check(config: Option<PathBuf>) -> Result<()> {
    let inputs = Inputs::load(config.as_deref())?;
    let participant: Participant = "0".parse().map_err(anyhow::Error::msg)?;
    let trials = inputs.generate(&participant, Some(0))?;
    port_codes(&trials)?;

    let missing = missing_stimuli(&inputs.settings.stimulus_dir, &inputs.blocks);
    for path in &missing {
        warn!("missing stimulus file {}", path.display());
    }
    println!("{}", SequenceSummary::of(&trials));
    if !missing.is_empty() {
        bail!("{} stimulus files are missing", missing.len());
    }
    println!("configuration OK");
    Ok(())
}

fn run(config: Option<PathBuf>, args: RunArgs) -> Result<()> {
    let inputs = Inputs::load(config.as_deref())?;
    let settings = &inputs.settings;

    let missing = missing_stimuli(&settings.stimulus_dir, &inputs.blocks);
    if let Some(first) = missing.first() {
        bail!(
            "{} stimulus files are missing, first: {}",
            missing.len(),
            first.display()
        );
    }

    let participant = &args.session.participant;
    let trials = inputs.generate(participant, args.session.seed)?;
    port_codes(&trials)?;
    let stem = data_stem(settings, participant, Local::now());
    save_conditions(&with_suffix(&stem, "_conditions.csv"), &trials)?;
    let log_path = with_suffix(&stem, ".csv");
    let log = SessionLog::create(&log_path, participant, &args.session.session)?;

    let device = if args.no_port {
        None
    } else {
        args.port.clone().or_else(|| settings.port_device.clone())
    };
    let port: Box<dyn TriggerPort> = match device {
        Some(path) => Box::new(DevicePort::open(&path)?),
        None => Box::new(NullPort),
    };
    let config = SessionConfig::from(settings);

    println!("=== AUDITORY ODDBALL: {} ===", settings.exp_name);
    println!("Participant {participant}, session {}", args.session.session);
    println!("Enter 'p' (or 1-4) to pause after the current trial, 'q' to abort.\n");

    let outcome = if args.dry_run {
        present(
            &trials,
            config,
            SimulatedTimer::new(),
            port,
            Box::new(SilentSink::default()),
            AutoOperator::default(),
            log,
        )?
    } else {
        present(
            &trials,
            config,
            HighPrecisionTimer::new(),
            port,
            open_audio(settings)?,
            ConsoleOperator::spawn(),
            log,
        )?
    };

    match outcome {
        SessionOutcome::Completed { trials } => {
            println!("Session complete: {trials} trials logged to {}", log_path.display())
        }
        SessionOutcome::Aborted { after_trials } => println!(
            "Session aborted after {after_trials} trials; log kept at {}",
            log_path.display()
        ),
    }
    Ok(())
}

fn present<T: Timer, O: Operator>(
    trials: &[TrialRecord],
    config: SessionConfig,
    timer: T,
    port: Box<dyn TriggerPort>,
    audio: Box<dyn AudioSink>,
    operator: O,
    log: SessionLog<std::fs::File>,
) -> Result<SessionOutcome> {
    let mut session = Session::new(config, timer, port, audio, operator, log);
    let outcome = session.run(trials);
    info!("{} trials written to the session log", session.log.rows());
    session.log.finish()?;
    outcome
}

#[cfg(feature = "audio")]
fn open_audio(settings: &Settings) -> Result<Box<dyn AudioSink>> {
    Ok(Box::new(audio::RodioSink::new(settings.volume)?))
}

#[cfg(not(feature = "audio"))]
fn open_audio(_settings: &Settings) -> Result<Box<dyn AudioSink>> {
    warn!("built without the `audio` feature: stimuli are timed but not played");
    Ok(Box::new(SilentSink::default()))
}
