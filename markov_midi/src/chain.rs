// Variable-order Markov chain over quantized notes.
//
// For every window of 1..=order consecutive notes seen in training, the model
// stores how often each symbol followed it: another note, or `End` when the
// window closed its source sequence. Windows are keyed by `NoteKey`s, so
// timestamps never affect which context a window lands in.
//
// Contexts live in a `BTreeMap` so iteration order depends only on the data,
// never on hasher state. Generation draws its seed context by index into that
// order, which keeps a seeded run reproducible. Each `Distribution` keeps its
// transitions in first-seen order (the weighted picker walks them in that
// order) plus an `FxHashMap` index for O(1) counting.
//
// Training accumulates: several `train` calls (one per corpus file) add their
// counts into the same model. Persisted models are JSON via `save`/`load`.

use crate::error::{ConfigError, ModelFileError};
use crate::note::{Note, NoteKey, prepare_sequence};
use crate::quantize::Quantizer;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// What follows a context: a note, or the end of the source sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NextSymbol {
    Note(NoteKey),
    End,
}

/// An ordered window of 1..=order note identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Context(Vec<NoteKey>);

impl Context {
    pub fn keys(&self) -> &[NoteKey] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[NoteKey]> for Context {
    fn borrow(&self) -> &[NoteKey] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub symbol: NextSymbol,
    pub count: u64,
}

/// Observed successors of one context with positive integer weights.
///
/// Equality compares counts per symbol and ignores first-seen order, so two
/// models trained on the same files in a different order compare equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Transition>", into = "Vec<Transition>")]
pub struct Distribution {
    transitions: Vec<Transition>,
    index: FxHashMap<NextSymbol, usize>,
    total: u64,
}

impl Distribution {
    /// Add `count` observations of `symbol`. A zero count is ignored so no
    /// zero-weight entry can ever be stored.
    pub fn add(&mut self, symbol: NextSymbol, count: u64) {
        if count == 0 {
            return;
        }
        match self.index.get(&symbol) {
            Some(&i) => self.transitions[i].count += count,
            None => {
                self.index.insert(symbol, self.transitions.len());
                self.transitions.push(Transition { symbol, count });
            }
        }
        self.total += count;
    }

    pub fn count(&self, symbol: &NextSymbol) -> u64 {
        self.index
            .get(symbol)
            .map_or(0, |&i| self.transitions[i].count)
    }

    /// Transitions in first-seen order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.total == other.total
            && self.len() == other.len()
            && self
                .transitions
                .iter()
                .all(|t| other.count(&t.symbol) == t.count)
    }
}

impl Eq for Distribution {}

impl From<Vec<Transition>> for Distribution {
    fn from(transitions: Vec<Transition>) -> Self {
        let mut dist = Distribution::default();
        for t in transitions {
            dist.add(t.symbol, t.count);
        }
        dist
    }
}

impl From<Distribution> for Vec<Transition> {
    fn from(dist: Distribution) -> Self {
        dist.transitions
    }
}

/// Counts from one `train` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSummary {
    pub notes: usize,
    pub contexts_added: usize,
}

/// The trained chain: order, rounding grid, and context table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ModelFile", into = "ModelFile")]
pub struct ChainModel {
    order: usize,
    quantizer: Quantizer,
    contexts: BTreeMap<Context, Distribution>,
}

impl ChainModel {
    pub fn new(order: usize, quantizer: Quantizer) -> Result<Self, ConfigError> {
        if order == 0 {
            return Err(ConfigError::ZeroOrder);
        }
        Ok(Self {
            order,
            quantizer,
            contexts: BTreeMap::new(),
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Learn from one source sequence.
    ///
    /// The sequence is sorted by onset, delays are back-filled, every note is
    /// quantized, and then each window ending at each position records its
    /// successor (or `End` after the last note).
    pub fn train(&mut self, mut notes: Vec<Note>) -> TrainingSummary {
        prepare_sequence(&mut notes);
        let keys: Vec<NoteKey> = notes
            .iter()
            .map(|n| self.quantizer.quantize(n).identity())
            .collect();

        let before = self.contexts.len();
        for i in 0..keys.len() {
            let next = keys.get(i + 1).copied().map_or(NextSymbol::End, NextSymbol::Note);
            for len in 1..=self.order.min(i + 1) {
                self.observe(&keys[i + 1 - len..=i], next, 1);
            }
        }

        let summary = TrainingSummary {
            notes: keys.len(),
            contexts_added: self.contexts.len() - before,
        };
        debug!(
            notes = summary.notes,
            contexts_added = summary.contexts_added,
            "trained sequence"
        );
        summary
    }

    fn observe(&mut self, window: &[NoteKey], next: NextSymbol, count: u64) {
        match self.contexts.get_mut(window) {
            Some(dist) => dist.add(next, count),
            None => {
                let mut dist = Distribution::default();
                dist.add(next, count);
                self.contexts.insert(Context(window.to_vec()), dist);
            }
        }
    }

    /// Add every count of `other` into this model. Both must share order and
    /// rounding, otherwise their symbols would live on different grids.
    pub fn merge(&mut self, other: &ChainModel) -> Result<(), ConfigError> {
        if other.order != self.order {
            return Err(ConfigError::OrderMismatch {
                expected: self.order,
                found: other.order,
            });
        }
        if other.quantizer != self.quantizer {
            return Err(ConfigError::QuantizerMismatch);
        }
        for (context, dist) in &other.contexts {
            for t in dist.transitions() {
                self.observe(context.keys(), t.symbol, t.count);
            }
        }
        Ok(())
    }

    pub fn distribution(&self, context: &[NoteKey]) -> Option<&Distribution> {
        self.contexts.get(context)
    }

    pub fn contexts(&self) -> impl Iterator<Item = (&Context, &Distribution)> {
        self.contexts.iter()
    }

    /// Stored contexts of exactly `len` notes, in map order.
    pub fn contexts_of_len(&self, len: usize) -> impl Iterator<Item = &Context> {
        self.contexts.keys().filter(move |c| c.len() == len)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelFileError> {
        let json = serde_json::to_string(self).map_err(|source| ModelFileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ModelFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelFileError> {
        let data = std::fs::read_to_string(path).map_err(|source| ModelFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ModelFileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// On-disk form of a model. JSON object keys must be strings, so the context
/// table is written as a list of entries.
#[derive(Serialize, Deserialize)]
struct ModelFile {
    order: usize,
    quantizer: Quantizer,
    contexts: Vec<ContextEntry>,
}

#[derive(Serialize, Deserialize)]
struct ContextEntry {
    context: Context,
    next: Distribution,
}

impl From<ChainModel> for ModelFile {
    fn from(model: ChainModel) -> Self {
        ModelFile {
            order: model.order,
            quantizer: model.quantizer,
            contexts: model
                .contexts
                .into_iter()
                .map(|(context, next)| ContextEntry { context, next })
                .collect(),
        }
    }
}

impl TryFrom<ModelFile> for ChainModel {
    type Error = ConfigError;

    fn try_from(file: ModelFile) -> Result<Self, Self::Error> {
        let mut model = ChainModel::new(file.order, file.quantizer)?;
        for entry in file.contexts {
            if entry.context.is_empty() || entry.context.len() > model.order {
                return Err(ConfigError::InvalidModel(format!(
                    "context of length {} in an order-{} model",
                    entry.context.len(),
                    model.order
                )));
            }
            if entry.next.is_empty() {
                return Err(ConfigError::InvalidModel(
                    "context with no recorded successors".into(),
                ));
            }
            for t in entry.next.transitions() {
                model.observe(entry.context.keys(), t.symbol, t.count);
            }
        }
        Ok(model)
    }
}
