// Run configuration.
//
// Every tunable lives in `Config`, loadable from a JSON file where missing
// fields take the defaults below, and overridable field by field from the
// command line (see main.rs). `validate` runs before any file is read so a
// bad rounding value or zero order never reaches training.
//
// Time values inside the model are integer grid ticks: the corpus loader
// multiplies seconds by `resolution`, the renderer divides by it.

use crate::corpus::LoadSettings;
use crate::error::ConfigError;
use crate::quantize::Quantizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum context length (chain order).
    pub order: usize,
    /// Grid ticks per second of source audio time.
    pub resolution: u32,
    pub velocity_rounding: u64,
    /// Applies to note durations and inter-note delays, in grid ticks. The
    /// loader already rounds times to `1 / resolution` s; 1 keeps that grid.
    pub duration_rounding: u64,
    pub tempo_rounding: u64,
    /// Tempo (microseconds per quarter) assumed when a file sets none.
    pub default_tempo: u64,
    /// Instrument programs to keep. Empty keeps all.
    pub target_channels: BTreeSet<u8>,
    pub input_files: Vec<PathBuf>,
    pub output_file: PathBuf,
    /// RNG seed; drawn from the clock when absent.
    pub seed: Option<u64>,
    /// Cap on generated notes; unlimited when absent.
    pub max_notes: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            order: 3,
            resolution: 500,
            velocity_rounding: 40,
            duration_rounding: 1,
            tempo_rounding: 1_000_000_000,
            default_tempo: 500_001,
            target_channels: BTreeSet::new(),
            input_files: Vec::new(),
            output_file: PathBuf::from("output.mid"),
            seed: None,
            max_notes: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order == 0 {
            return Err(ConfigError::ZeroOrder);
        }
        if self.resolution == 0 {
            return Err(ConfigError::ZeroGranularity { field: "resolution" });
        }
        self.quantizer().map(|_| ())
    }

    pub fn quantizer(&self) -> Result<Quantizer, ConfigError> {
        Quantizer::new(
            self.velocity_rounding,
            self.duration_rounding,
            self.tempo_rounding,
        )
    }

    pub fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            resolution: self.resolution,
            default_tempo: self.default_tempo,
            target_instruments: self.target_channels.clone(),
        }
    }
}
