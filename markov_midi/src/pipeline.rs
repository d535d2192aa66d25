// End-to-end run: corpus files -> model -> generated notes -> MIDI file.
//
// Mirrors the CLI's steps so tests can drive a whole run without a process.
// A run may start from a previously saved model; corpus files then add to its
// counts, so the model's order and rounding must match the configuration.

use crate::chain::ChainModel;
use crate::config::Config;
use crate::corpus::{LoadSettings, load_corpus};
use crate::error::{ConfigError, GenerateError, ModelFileError, RenderError};
use crate::generate::{Generation, Generator};
use crate::render::write_midi;
use markov_midi_prng::SampleRng;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    ModelFile(#[from] ModelFileError),
}

/// Per-batch corpus counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub files_read: usize,
    pub files_skipped: usize,
    pub notes: usize,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub model: ChainModel,
    pub corpus: CorpusStats,
    pub generation: Generation,
}

/// Load `paths` and train each readable file into `model` as its own
/// sequence. Unreadable files are logged by the loader and counted here.
pub fn train_corpus<P: AsRef<Path>>(
    model: &mut ChainModel,
    paths: &[P],
    settings: &LoadSettings,
) -> CorpusStats {
    let report = load_corpus(paths, settings);
    let mut stats = CorpusStats {
        files_read: report.files.len(),
        files_skipped: report.warning_count(),
        notes: 0,
    };
    for file in report.files {
        stats.notes += model.train(file.notes).notes;
    }
    stats
}

/// Start from `base` when given (checking it matches `config`), otherwise
/// from an empty model.
pub fn prepare_model(config: &Config, base: Option<ChainModel>) -> Result<ChainModel, ConfigError> {
    config.validate()?;
    let quantizer = config.quantizer()?;
    match base {
        Some(model) => {
            if model.order() != config.order {
                return Err(ConfigError::OrderMismatch {
                    expected: config.order,
                    found: model.order(),
                });
            }
            if *model.quantizer() != quantizer {
                return Err(ConfigError::QuantizerMismatch);
            }
            Ok(model)
        }
        None => ChainModel::new(config.order, quantizer),
    }
}

pub fn run(
    config: &Config,
    base: Option<ChainModel>,
    rng: &mut SampleRng,
) -> Result<RunOutcome, PipelineError> {
    if base.is_none() && config.input_files.is_empty() {
        return Err(ConfigError::NoInputs.into());
    }
    let mut model = prepare_model(config, base)?;

    let corpus = train_corpus(&mut model, config.input_files.as_slice(), &config.load_settings());
    info!(
        files = corpus.files_read,
        skipped = corpus.files_skipped,
        notes = corpus.notes,
        "corpus trained"
    );
    info!(
        contexts = model.context_count(),
        order = model.order(),
        "model ready"
    );

    let generation = Generator::new(&model, config.order)?
        .with_max_notes(config.max_notes)
        .generate(rng)?;
    info!(
        notes = generation.notes.len(),
        termination = ?generation.termination,
        "generated"
    );

    write_midi(&generation.notes, &config.output_file, config.resolution)?;
    info!(path = %config.output_file.display(), "wrote output");

    Ok(RunOutcome {
        model,
        corpus,
        generation,
    })
}
