// The Note entity and its identity key.
//
// A `Note` is one musical event on the quantized time grid. Its identity for
// every Markov purpose (context keys, transition counting) is the `NoteKey`:
// all fields except `timestamp`. Two events that differ only in when they
// happen are the same symbol, which is what lets a corpus collapse into
// reusable contexts. `Note`'s own `PartialEq`/`Hash` delegate to the key so a
// timestamp can never leak into a comparison by accident.
//
// Timestamps only carry ordering: `prepare_sequence` sorts a freshly loaded
// sequence and back-fills each note's `next_note_delay` from its successor.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One musical event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch (0-127 in practice, not enforced).
    pub key: u8,
    pub start_velocity: u8,
    pub end_velocity: u8,
    /// Sounding length in grid ticks.
    pub note_duration: u64,
    /// Grid ticks until the next note of the source sequence, 0 if none.
    pub next_note_delay: u64,
    /// Tempo at onset, microseconds per quarter note.
    pub tempo: u64,
    /// General MIDI program number.
    pub instrument: u8,
    /// Onset on the grid. Not part of identity.
    pub timestamp: u64,
}

/// Identity of a note: everything except `timestamp`.
///
/// Ordered so contexts can live in a `BTreeMap`, which keeps seed-context
/// selection reproducible for a given RNG seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteKey {
    pub key: u8,
    pub start_velocity: u8,
    pub end_velocity: u8,
    pub note_duration: u64,
    pub next_note_delay: u64,
    pub tempo: u64,
    pub instrument: u8,
}

impl Note {
    pub fn identity(&self) -> NoteKey {
        NoteKey {
            key: self.key,
            start_velocity: self.start_velocity,
            end_velocity: self.end_velocity,
            note_duration: self.note_duration,
            next_note_delay: self.next_note_delay,
            tempo: self.tempo,
            instrument: self.instrument,
        }
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Note {}

impl Hash for Note {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl NoteKey {
    /// Materialize this symbol as a note sounding at `timestamp`.
    pub fn at(self, timestamp: u64) -> Note {
        Note {
            key: self.key,
            start_velocity: self.start_velocity,
            end_velocity: self.end_velocity,
            note_duration: self.note_duration,
            next_note_delay: self.next_note_delay,
            tempo: self.tempo,
            instrument: self.instrument,
            timestamp,
        }
    }
}

/// Sort by onset (stable, so simultaneous notes keep arrival order) and set
/// each note's `next_note_delay` to the gap before its successor. The last
/// note keeps whatever delay it already had.
pub fn prepare_sequence(notes: &mut [Note]) {
    notes.sort_by_key(|n| n.timestamp);
    for i in 1..notes.len() {
        let gap = notes[i].timestamp - notes[i - 1].timestamp;
        notes[i - 1].next_note_delay = gap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::collections::hash_map::DefaultHasher;

    fn note(key: u8, timestamp: u64) -> Note {
        Note {
            key,
            start_velocity: 80,
            end_velocity: 80,
            note_duration: 100,
            next_note_delay: 0,
            tempo: 500_000,
            instrument: 0,
            timestamp,
        }
    }

    fn hash_of(n: &Note) -> u64 {
        let mut h = DefaultHasher::new();
        n.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equality_ignores_timestamp() {
        let a = note(60, 0);
        let b = note(60, 9_999);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn every_identity_field_distinguishes() {
        let base = note(60, 0);
        let variants = [
            Note { key: 61, ..base },
            Note { start_velocity: 81, ..base },
            Note { end_velocity: 81, ..base },
            Note { note_duration: 101, ..base },
            Note { next_note_delay: 1, ..base },
            Note { tempo: 500_001, ..base },
            Note { instrument: 1, ..base },
        ];
        for v in &variants {
            assert_ne!(*v, base, "{v:?} should differ from base");
        }
        let set: HashSet<Note> = variants.iter().copied().chain([base]).collect();
        assert_eq!(set.len(), variants.len() + 1);
    }

    #[test]
    fn key_roundtrips_through_at() {
        let n = note(64, 1234);
        assert_eq!(n.identity().at(1234).timestamp, 1234);
        assert_eq!(n.identity().at(0), n);
    }

    #[test]
    fn prepare_sorts_and_backfills_delays() {
        let mut notes = vec![note(64, 300), note(60, 0), note(62, 100)];
        prepare_sequence(&mut notes);
        let keys: Vec<u8> = notes.iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![60, 62, 64]);
        let delays: Vec<u64> = notes.iter().map(|n| n.next_note_delay).collect();
        assert_eq!(delays, vec![100, 200, 0]);
    }

    #[test]
    fn prepare_is_stable_for_simultaneous_notes() {
        let mut notes = vec![note(67, 50), note(60, 0), note(64, 0)];
        prepare_sequence(&mut notes);
        let keys: Vec<u8> = notes.iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![60, 64, 67]);
        assert_eq!(notes[0].next_note_delay, 0);
        assert_eq!(notes[1].next_note_delay, 50);
    }

    #[test]
    fn prepare_handles_empty_and_single() {
        let mut empty: Vec<Note> = Vec::new();
        prepare_sequence(&mut empty);
        let mut one = vec![Note { next_note_delay: 7, ..note(60, 5) }];
        prepare_sequence(&mut one);
        assert_eq!(one[0].next_note_delay, 7);
    }
}
