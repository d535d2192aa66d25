// Corpus loading: Standard MIDI Files into note sequences.
//
// Each file becomes one flat sequence with every track merged: note-on and
// note-off events are paired per (channel, key) in FIFO order (a note-on with
// velocity 0 counts as a note-off), the tempo map converts ticks to seconds,
// and seconds are scaled by `resolution` onto the integer time grid. Notes are
// kept in onset order, then sorted and given their inter-note delays by
// `note::prepare_sequence`.
//
// The tempo map only drives tick-to-seconds conversion. Every note records
// the configured `default_tempo`, so a rendered file reloads to the same
// symbols whatever tempo events it carries.
//
// Instrument is the program in effect on the note's channel. Channel 10
// (index 9) is always dropped, before and independent of `target_instruments`
// filtering: its programs name drum kits, not pitched instruments, so a drum
// kit on program 0 would otherwise pass as a piano. `target_instruments` keeps
// only the listed programs when non-empty.
//
// A file that fails to read or parse never aborts a batch: `load_corpus` logs
// it, skips it, and reports it alongside the sequences that did load.
//
// Uses the `midly` crate for SMF parsing.

use crate::error::CorpusReadError;
use crate::note::{Note, prepare_sequence};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use rustc_hash::FxHashMap;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// MIDI's implied tempo (120 BPM) before any tempo event.
const DEFAULT_MIDI_TEMPO: u32 = 500_000;

const PERCUSSION_CHANNEL: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSettings {
    /// Grid ticks per second.
    pub resolution: u32,
    /// Tempo recorded on every note.
    pub default_tempo: u64,
    pub target_instruments: BTreeSet<u8>,
}

#[derive(Debug)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub notes: Vec<Note>,
}

/// Result of loading a batch of files.
#[derive(Debug, Default)]
pub struct CorpusReport {
    pub files: Vec<CorpusFile>,
    pub failures: Vec<CorpusReadError>,
}

impl CorpusReport {
    pub fn warning_count(&self) -> usize {
        self.failures.len()
    }

    pub fn note_count(&self) -> usize {
        self.files.iter().map(|f| f.notes.len()).sum()
    }
}

/// Read every file in `paths`, skipping (and recording) the ones that fail.
pub fn load_corpus<P: AsRef<Path>>(paths: &[P], settings: &LoadSettings) -> CorpusReport {
    let mut report = CorpusReport::default();
    for path in paths {
        let path = path.as_ref();
        match read_notes(path, settings) {
            Ok(notes) => {
                info!(path = %path.display(), notes = notes.len(), "converted corpus file");
                report.files.push(CorpusFile {
                    path: path.to_path_buf(),
                    notes,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping corpus file");
                report.failures.push(e);
            }
        }
    }
    report
}

pub fn read_notes(path: &Path, settings: &LoadSettings) -> Result<Vec<Note>, CorpusReadError> {
    let data = std::fs::read(path).map_err(|source| CorpusReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_notes(&data, settings).map_err(|source| CorpusReadError::Midi {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an in-memory SMF into a prepared note sequence.
pub fn parse_notes(data: &[u8], settings: &LoadSettings) -> Result<Vec<Note>, midly::Error> {
    let smf = Smf::parse(data)?;
    Ok(smf_to_notes(&smf, settings))
}

/// One paired note-on/note-off, in source ticks.
struct RawNote {
    key: u8,
    velocity: u8,
    program: u8,
    start_tick: u64,
    end_tick: Option<u64>,
}

fn smf_to_notes(smf: &Smf<'_>, settings: &LoadSettings) -> Vec<Note> {
    let clock = TempoMap::from_smf(smf);
    let mut raw: Vec<RawNote> = Vec::new();

    for track in &smf.tracks {
        let mut tick: u64 = 0;
        let mut programs = [0u8; 16];
        // (channel, key) -> indices into `raw` still waiting for a note-off
        let mut sounding: FxHashMap<(u8, u8), VecDeque<usize>> = FxHashMap::default();

        for event in track {
            tick += u64::from(event.delta.as_int());
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();
            match message {
                MidiMessage::ProgramChange { program } => {
                    programs[usize::from(channel)] = program.as_int();
                }
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    if channel == PERCUSSION_CHANNEL {
                        continue;
                    }
                    sounding
                        .entry((channel, key.as_int()))
                        .or_default()
                        .push_back(raw.len());
                    raw.push(RawNote {
                        key: key.as_int(),
                        velocity: vel.as_int(),
                        program: programs[usize::from(channel)],
                        start_tick: tick,
                        end_tick: None,
                    });
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    if let Some(i) = sounding
                        .get_mut(&(channel, key.as_int()))
                        .and_then(|queue| queue.pop_front())
                    {
                        raw[i].end_tick = Some(tick);
                    }
                }
                _ => {}
            }
        }
    }

    let resolution = f64::from(settings.resolution);
    let to_grid = |tick: u64| (clock.seconds_at(tick) * resolution).round() as u64;

    let mut notes: Vec<Note> = raw
        .into_iter()
        .filter(|r| {
            settings.target_instruments.is_empty()
                || settings.target_instruments.contains(&r.program)
        })
        .filter_map(|r| {
            // Notes still sounding at end of track are dropped.
            let end_tick = r.end_tick?;
            let timestamp = to_grid(r.start_tick);
            Some(Note {
                key: r.key,
                start_velocity: r.velocity,
                end_velocity: r.velocity,
                note_duration: to_grid(end_tick).saturating_sub(timestamp),
                next_note_delay: 0,
                tempo: settings.default_tempo,
                instrument: r.program,
                timestamp,
            })
        })
        .collect();

    prepare_sequence(&mut notes);
    notes
}

/// Tick-to-seconds conversion for one file.
struct TempoMap {
    base: TimeBase,
    /// (tick, microseconds per quarter), sorted by tick.
    changes: Vec<(u64, u32)>,
}

enum TimeBase {
    Metrical { ticks_per_quarter: f64 },
    Timecode { ticks_per_second: f64 },
}

impl TempoMap {
    fn from_smf(smf: &Smf<'_>) -> Self {
        let base = match smf.header.timing {
            Timing::Metrical(tpq) => TimeBase::Metrical {
                ticks_per_quarter: f64::from(tpq.as_int().max(1)),
            },
            Timing::Timecode(fps, subframes) => TimeBase::Timecode {
                ticks_per_second: (f64::from(fps.as_f32()) * f64::from(subframes)).max(1.0),
            },
        };

        let mut changes = Vec::new();
        for track in &smf.tracks {
            let mut tick: u64 = 0;
            for event in track {
                tick += u64::from(event.delta.as_int());
                if let TrackEventKind::Meta(MetaMessage::Tempo(t)) = event.kind {
                    changes.push((tick, t.as_int()));
                }
            }
        }
        changes.sort_by_key(|&(tick, _)| tick);

        Self { base, changes }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let ticks_per_quarter = match self.base {
            TimeBase::Timecode { ticks_per_second } => return tick as f64 / ticks_per_second,
            TimeBase::Metrical { ticks_per_quarter } => ticks_per_quarter,
        };

        let mut seconds = 0.0;
        let mut last_tick = 0u64;
        let mut usec_per_quarter = f64::from(DEFAULT_MIDI_TEMPO);
        for &(change_tick, tempo) in &self.changes {
            if change_tick > tick {
                break;
            }
            seconds += (change_tick - last_tick) as f64 / ticks_per_quarter * usec_per_quarter
                / 1_000_000.0;
            last_tick = change_tick;
            usec_per_quarter = f64::from(tempo);
        }
        seconds + (tick - last_tick) as f64 / ticks_per_quarter * usec_per_quarter / 1_000_000.0
    }
}
