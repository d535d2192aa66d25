// Floor-to-multiple rounding of a note's continuous-valued fields.
//
// Rounding collapses near-duplicate training events into one symbol. The
// velocity granularity applies to both velocities, the duration granularity
// to `note_duration` and `next_note_delay`, the tempo granularity to `tempo`.
// Pitch, instrument, and timestamp pass through untouched.

use crate::error::ConfigError;
use crate::note::Note;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantizer {
    velocity: NonZeroU64,
    duration: NonZeroU64,
    tempo: NonZeroU64,
}

impl Quantizer {
    /// Rejects a zero granularity for any field.
    pub fn new(velocity: u64, duration: u64, tempo: u64) -> Result<Self, ConfigError> {
        let nz = |value, field| NonZeroU64::new(value).ok_or(ConfigError::ZeroGranularity { field });
        Ok(Self {
            velocity: nz(velocity, "velocity_rounding")?,
            duration: nz(duration, "duration_rounding")?,
            tempo: nz(tempo, "tempo_rounding")?,
        })
    }

    /// Granularity 1 on every field: quantizing is the identity.
    pub fn identity() -> Self {
        Self {
            velocity: NonZeroU64::MIN,
            duration: NonZeroU64::MIN,
            tempo: NonZeroU64::MIN,
        }
    }

    pub fn quantize(&self, note: &Note) -> Note {
        // Rounding a u8 down never leaves the u8 range.
        let velocity = |v: u8| floor_to(u64::from(v), self.velocity) as u8;
        Note {
            start_velocity: velocity(note.start_velocity),
            end_velocity: velocity(note.end_velocity),
            note_duration: floor_to(note.note_duration, self.duration),
            next_note_delay: floor_to(note.next_note_delay, self.duration),
            tempo: floor_to(note.tempo, self.tempo),
            ..*note
        }
    }
}

fn floor_to(value: u64, step: NonZeroU64) -> u64 {
    value - value % step
}
