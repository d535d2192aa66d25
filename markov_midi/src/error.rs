// Error taxonomy for training, generation, and the MIDI adapters.
//
// Configuration problems are fatal and surface before any training starts.
// Corpus read failures are per-file: `corpus::load_corpus` logs them, skips
// the file, and returns them in its report. An empty model is fatal to one
// generation call only. Running off the end of the chain (dead end or an
// explicit END draw) is not an error at all; see `generate::Termination`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive integer")]
    ZeroGranularity { field: &'static str },
    #[error("chain order must be at least 1")]
    ZeroOrder,
    #[error("generation order {requested} exceeds model order {model}")]
    OrderAboveModel { requested: usize, model: usize },
    #[error("model was trained with order {found}, expected {expected}")]
    OrderMismatch { expected: usize, found: usize },
    #[error("model quantizer does not match the configured rounding")]
    QuantizerMismatch,
    #[error("no input files configured")]
    NoInputs,
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One corpus file that could not be turned into notes.
#[derive(Debug, Error)]
pub enum CorpusReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse MIDI in {path}: {source}")]
    Midi {
        path: PathBuf,
        #[source]
        source: midly::Error,
    },
}

impl CorpusReadError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            CorpusReadError::Io { path, .. } | CorpusReadError::Midi { path, .. } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model has no context of length {order} to start from")]
    EmptyModel { order: usize },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode MIDI: {0}")]
    Encode(#[source] std::io::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ModelFileError {
    #[error("failed to access model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
