// Walking a trained chain to produce a new note stream.
//
// A walk starts from a context of exactly `order` notes chosen uniformly
// among the stored ones, then repeatedly looks up the last `order` notes and
// draws a successor with `sampling::pick`. It stops when:
// - the draw is `End` (the context closed a training sequence),
// - the current window was never seen in training (a dead end; the model is
//   sparse by construction, so this is an expected outcome, not an error),
// - the optional note cap is reached.
//
// Symbols carry no absolute time. Onsets are laid out from the generated
// sequence itself: the first note sits at 0 and each following onset is the
// previous one plus the previous note's `next_note_delay`.

use crate::chain::{ChainModel, Context, NextSymbol};
use crate::error::{ConfigError, GenerateError};
use crate::note::{Note, NoteKey};
use crate::sampling::pick;
use markov_midi_prng::SampleRng;
use tracing::debug;

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Drew the end-of-sequence symbol.
    End,
    /// The current window has no entry in the model.
    DeadEnd,
    /// Hit the configured note cap.
    LengthLimit,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub notes: Vec<Note>,
    pub termination: Termination,
}

/// Walk parameters bound to one model.
#[derive(Debug, Clone, Copy)]
pub struct Generator<'a> {
    model: &'a ChainModel,
    order: usize,
    max_notes: Option<usize>,
}

impl<'a> Generator<'a> {
    /// `order` must be between 1 and the model's own order.
    pub fn new(model: &'a ChainModel, order: usize) -> Result<Self, ConfigError> {
        if order == 0 {
            return Err(ConfigError::ZeroOrder);
        }
        if order > model.order() {
            return Err(ConfigError::OrderAboveModel {
                requested: order,
                model: model.order(),
            });
        }
        Ok(Self {
            model,
            order,
            max_notes: None,
        })
    }

    /// Stop once the output holds `max_notes` notes. The seed context is
    /// never truncated, so output is still at least `order` notes long.
    pub fn with_max_notes(mut self, max_notes: Option<usize>) -> Self {
        self.max_notes = max_notes;
        self
    }

    /// Pick a seed uniformly among contexts of exactly `order` notes.
    fn choose_seed(&self, rng: &mut SampleRng) -> Result<&'a Context, GenerateError> {
        let count = self.model.contexts_of_len(self.order).count();
        if count == 0 {
            return Err(GenerateError::EmptyModel { order: self.order });
        }
        let index = rng.range_usize(0, count);
        self.model
            .contexts_of_len(self.order)
            .nth(index)
            .ok_or(GenerateError::EmptyModel { order: self.order })
    }

    pub fn generate(&self, rng: &mut SampleRng) -> Result<Generation, GenerateError> {
        let seed = self.choose_seed(rng)?;
        debug!(order = self.order, "seeded walk");
        let (keys, termination) = self.walk(seed.keys().to_vec(), rng);
        Ok(Generation {
            notes: lay_out(&keys),
            termination,
        })
    }

    /// Extend `keys` (at least `order` long) until the walk terminates.
    fn walk(&self, mut keys: Vec<NoteKey>, rng: &mut SampleRng) -> (Vec<NoteKey>, Termination) {
        let termination = loop {
            if self.max_notes.is_some_and(|cap| keys.len() >= cap) {
                break Termination::LengthLimit;
            }
            let window = &keys[keys.len() - self.order..];
            let Some(dist) = self.model.distribution(window) else {
                debug!(length = keys.len(), "walk reached a context absent from the model");
                break Termination::DeadEnd;
            };
            match pick(dist, rng) {
                Some(NextSymbol::Note(key)) => keys.push(*key),
                Some(NextSymbol::End) => break Termination::End,
                None => break Termination::DeadEnd,
            }
        };
        (keys, termination)
    }
}

/// Walk `model` with windows of `order` notes until it terminates.
pub fn generate(
    model: &ChainModel,
    order: usize,
    rng: &mut SampleRng,
) -> Result<Generation, GenerateError> {
    Generator::new(model, order)?.generate(rng)
}

/// Materialize symbols as notes, first onset at 0.
fn lay_out(keys: &[NoteKey]) -> Vec<Note> {
    let mut clock = 0u64;
    keys.iter()
        .map(|key| {
            let note = key.at(clock);
            clock = clock.saturating_add(key.next_note_delay);
            note
        })
        .collect()
}
