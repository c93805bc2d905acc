mod app;
mod dialog;
mod stimuli;

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use visex_experiment::{CsvLogger, ExperimentConfig, ExperimentStateMachine, StimulusSet};
use visex_timing::HighPrecisionTimer;

use app::App;

/// Circular visual search task runner.
#[derive(Parser, Debug)]
#[command(name = "visex", version, about)]
struct Cli {
    /// Subject identifier (prompted for if omitted)
    #[arg(long)]
    subject: Option<String>,

    /// Subject age (prompted for if omitted)
    #[arg(long)]
    age: Option<u32>,

    /// Subject gender (prompted for if omitted)
    #[arg(long)]
    gender: Option<String>,

    /// Run number for this subject
    #[arg(long, default_value_t = 1)]
    run: u32,

    /// Stimulus folder holding target/ and distractor/ subfolders
    #[arg(long, default_value = "stimuli")]
    stimuli: PathBuf,

    /// CSV file trial rows are appended to
    #[arg(long, default_value = "data.csv")]
    data: PathBuf,

    /// Optional JSON file overriding the built-in block design
    #[arg(long)]
    config: Option<PathBuf>,

    /// TTF/OTF font used for instruction and feedback text
    #[arg(long, default_value = "assets/DejaVuSans.ttf")]
    font: PathBuf,

    /// Run in a window instead of borderless fullscreen
    #[arg(long)]
    windowed: bool,

    /// Seed the trial randomization for a reproducible sequence
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config = match &cli.config {
        Some(path) => ExperimentConfig::from_json_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => ExperimentConfig::default(),
    };
    config.validate().context("invalid experiment config")?;

    let session = dialog::collect(dialog::ParticipantFields {
        subject: cli.subject,
        age: cli.age,
        gender: cli.gender,
        run: cli.run,
    })?;
    info!(subject = %session.subject, run = session.run, "session identity collected");

    let stimulus_set = StimulusSet::scan(&cli.stimuli)
        .with_context(|| format!("failed to scan stimuli in '{}'", cli.stimuli.display()))?;
    info!(
        targets = stimulus_set.targets().len(),
        distractors = stimulus_set.distractors().len(),
        "stimulus catalogue loaded"
    );

    let font_bytes = std::fs::read(&cli.font)
        .with_context(|| format!("failed to read font '{}'", cli.font.display()))?;
    let font = FontArc::try_from_vec(font_bytes).context("failed to parse font")?;

    let edge_px = (config.stimulus_size * config.px_per_unit).round() as u32;
    let decoded = stimuli::decode_stimuli(&stimulus_set, edge_px.max(1))?;

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let timer = HighPrecisionTimer::new();
    let experiment = ExperimentStateMachine::new(config.clone(), session, stimulus_set, timer, rng);
    info!(
        trials = config.total_trials(),
        blocks = config.blocks.len(),
        "experiment schedule built"
    );

    let logger = CsvLogger::new(&cli.data);
    App::new(experiment, logger, config, font, decoded, cli.windowed).run()
}
