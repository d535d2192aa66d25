// Markov MIDI generator: CLI entry point.
//
// Trains a variable-order Markov chain on the given MIDI files and writes one
// generated piece. Settings come from an optional JSON config file, then
// command-line flags override individual fields.
//
// Usage:
//   markov-midi [INPUT.mid ...] [--config FILE] [-o OUTPUT.mid] [--order N]
//     [--resolution N] [--velocity-rounding N] [--duration-rounding N]
//     [--tempo-rounding N] [--default-tempo N] [--channel PROGRAM ...]
//     [--seed N] [--max-notes N] [--load-model FILE] [--save-model FILE]
//
// Log verbosity follows RUST_LOG (default: info).

use anyhow::{Context, Result};
use clap::Parser;
use markov_midi::chain::ChainModel;
use markov_midi::config::Config;
use markov_midi::pipeline::run;
use markov_midi_prng::SampleRng;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate a MIDI file from a Markov chain trained on MIDI files"
)]
struct Args {
    /// MIDI files to learn from (replaces `input_files` from the config)
    inputs: Vec<PathBuf>,
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output MIDI path
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Chain order (context length)
    #[arg(long)]
    order: Option<usize>,
    /// Grid ticks per second
    #[arg(long)]
    resolution: Option<u32>,
    #[arg(long)]
    velocity_rounding: Option<u64>,
    #[arg(long)]
    duration_rounding: Option<u64>,
    #[arg(long)]
    tempo_rounding: Option<u64>,
    /// Tempo (microseconds per quarter) for files without tempo events
    #[arg(long)]
    default_tempo: Option<u64>,
    /// Instrument program to keep; repeat for several, omit for all
    #[arg(long = "channel")]
    channels: Vec<u8>,
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many generated notes
    #[arg(long)]
    max_notes: Option<usize>,
    /// Start from a saved model instead of an empty one
    #[arg(long)]
    load_model: Option<PathBuf>,
    /// Save the trained model as JSON
    #[arg(long)]
    save_model: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if !self.inputs.is_empty() {
            config.input_files = self.inputs.clone();
        }
        if !self.channels.is_empty() {
            config.target_channels = self.channels.iter().copied().collect();
        }
        if let Some(output) = &self.output {
            config.output_file = output.clone();
        }
        config.order = self.order.unwrap_or(config.order);
        config.resolution = self.resolution.unwrap_or(config.resolution);
        config.velocity_rounding = self.velocity_rounding.unwrap_or(config.velocity_rounding);
        config.duration_rounding = self.duration_rounding.unwrap_or(config.duration_rounding);
        config.tempo_rounding = self.tempo_rounding.unwrap_or(config.tempo_rounding);
        config.default_tempo = self.default_tempo.unwrap_or(config.default_tempo);
        config.seed = self.seed.or(config.seed);
        config.max_notes = self.max_notes.or(config.max_notes);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let seed = config.seed.unwrap_or_else(clock_seed);
    info!(seed, "seeding generator");
    let mut rng = SampleRng::new(seed);

    let base = match &args.load_model {
        Some(path) => {
            let model = ChainModel::load(path)?;
            println!(
                "Loaded model from {} ({} mappings)",
                path.display(),
                model.context_count()
            );
            Some(model)
        }
        None => None,
    };

    let outcome = run(&config, base, &mut rng)?;

    println!(
        "{} notes converted from {} file(s), {} skipped",
        outcome.corpus.notes, outcome.corpus.files_read, outcome.corpus.files_skipped
    );
    println!(
        "{} mappings made (order {})",
        outcome.model.context_count(),
        outcome.model.order()
    );
    println!(
        "{} notes generated ({:?})",
        outcome.generation.notes.len(),
        outcome.generation.termination
    );
    println!("Wrote {} (seed {seed})", config.output_file.display());

    if let Some(path) = &args.save_model {
        outcome
            .model
            .save(path)
            .with_context(|| format!("saving model to {}", path.display()))?;
        println!("Saved model to {}", path.display());
    }

    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
