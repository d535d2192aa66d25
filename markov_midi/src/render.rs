// MIDI output from generated note sequences.
//
// Writes an SMF Format 1 file: track 0 carries the tempo, then one track per
// distinct instrument in first-seen order, each opening with a program change
// on its own channel. Channels are handed out in order and skip channel 10
// (percussion), wrapping after fifteen instruments.
//
// Grid ticks map back to MIDI ticks through seconds: the file runs at a fixed
// 120 BPM and the ticks-per-quarter is chosen so one second holds at least
// `resolution` MIDI ticks, which lets the corpus loader recover every grid
// value exactly.
//
// Uses the `midly` crate for MIDI writing.

use crate::error::RenderError;
use crate::note::Note;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Minimum ticks per quarter note in MIDI output.
const MIN_TICKS_PER_QUARTER: u16 = 480;

/// Largest ticks-per-quarter a metrical SMF header can hold (15 bits).
const MAX_TICKS_PER_QUARTER: u16 = 0x7FFF;

/// Tempo of the written file: 120 BPM, two quarters per second.
const OUTPUT_TEMPO: u32 = 500_000;

/// Largest absolute tick written, so every delta fits in 28 bits.
const MAX_TICK: u32 = 0x0FFF_FFFF;

/// Render `notes` and write them to `path`.
pub fn write_midi(notes: &[Note], path: &Path, resolution: u32) -> Result<(), RenderError> {
    let smf = notes_to_smf(notes, resolution);
    let mut buf = Vec::new();
    smf.write_std(&mut buf).map_err(RenderError::Encode)?;
    std::fs::write(path, &buf).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Ticks per quarter such that two quarters (one second) cover `resolution`.
fn ticks_per_quarter(resolution: u32) -> u16 {
    let needed = resolution.div_ceil(2);
    needed.clamp(u32::from(MIN_TICKS_PER_QUARTER), u32::from(MAX_TICKS_PER_QUARTER)) as u16
}

/// Build an in-memory SMF from a note sequence on a `resolution` grid.
pub fn notes_to_smf(notes: &[Note], resolution: u32) -> Smf<'static> {
    let tpq = ticks_per_quarter(resolution);
    let midi_ticks_per_second = 2 * u64::from(tpq);
    let resolution = u64::from(resolution.max(1));
    // Round to nearest MIDI tick; times past the last encodable tick pile up there.
    let to_midi = |grid: u64| -> u32 {
        let ticks = grid
            .saturating_mul(midi_ticks_per_second)
            .saturating_add(resolution / 2)
            / resolution;
        u32::try_from(ticks).map_or(MAX_TICK, |t| t.min(MAX_TICK))
    };

    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(tpq))));

    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(OUTPUT_TEMPO))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]);

    let mut instruments: Vec<u8> = Vec::new();
    for note in notes {
        if !instruments.contains(&note.instrument) {
            instruments.push(note.instrument);
        }
    }

    for (i, &instrument) in instruments.iter().enumerate() {
        let channel = channel_for(i);
        let mut events: Vec<(u32, u8, MidiMessage)> = Vec::new();
        for note in notes.iter().filter(|n| n.instrument == instrument) {
            let key = u7::new(note.key.min(127));
            let start = to_midi(note.timestamp);
            let end = to_midi(note.timestamp.saturating_add(note.note_duration));
            // A velocity-0 note-on would read back as a note-off.
            let vel = u7::new(note.start_velocity.clamp(1, 127));
            events.push((start, 1, MidiMessage::NoteOn { key, vel }));
            // Releases of earlier notes go before attacks at the same tick;
            // zero-length notes release after their own attack.
            let release_rank = if end == start { 2 } else { 0 };
            events.push((end, release_rank, MidiMessage::NoteOff { key, vel: u7::new(0) }));
        }
        events.sort_by_key(|&(tick, rank, _)| (tick, rank));

        let mut track: Track<'static> = Vec::with_capacity(events.len() + 2);
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(instrument.min(127)),
                },
            },
        });
        let mut last_tick = 0u32;
        for (tick, _, message) in events {
            track.push(TrackEvent {
                delta: u28::new(tick - last_tick),
                kind: TrackEventKind::Midi { channel, message },
            });
            last_tick = tick;
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    smf
}

/// The `index`-th melodic channel, skipping percussion (index 9).
fn channel_for(index: usize) -> u4 {
    let slot = (index % 15) as u8;
    u4::new(if slot >= 9 { slot + 1 } else { slot })
}
