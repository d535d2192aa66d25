// End-to-end tests for the corpus -> model -> generation -> MIDI pipeline.
//
// Corpus files are real SMF files written with the renderer into a temp
// directory, so the loader, trainer, generator, and renderer are all exercised
// through the same paths the CLI uses.

use markov_midi::chain::ChainModel;
use markov_midi::config::Config;
use markov_midi::corpus::read_notes;
use markov_midi::generate::Termination;
use markov_midi::note::Note;
use markov_midi::pipeline::{CorpusStats, prepare_model, run, train_corpus};
use markov_midi::render::write_midi;
use markov_midi_prng::SampleRng;
use std::path::{Path, PathBuf};

const RESOLUTION: u32 = 500;

fn note(key: u8, velocity: u8, timestamp: u64, duration: u64) -> Note {
    Note {
        key,
        start_velocity: velocity,
        end_velocity: velocity,
        note_duration: duration,
        next_note_delay: 0,
        tempo: 0,
        instrument: 0,
        timestamp,
    }
}

/// A melody on a 100-tick grid: (pitch, velocity, duration) per beat.
fn melody(steps: &[(u8, u8, u64)]) -> Vec<Note> {
    steps
        .iter()
        .enumerate()
        .map(|(i, &(key, vel, dur))| note(key, vel, i as u64 * 100, dur))
        .collect()
}

fn write_file(dir: &Path, name: &str, notes: &[Note]) -> PathBuf {
    let path = dir.join(name);
    write_midi(notes, &path, RESOLUTION).unwrap();
    path
}

/// Rounding that keeps the test melodies' values intact.
fn config(dir: &Path, inputs: Vec<PathBuf>) -> Config {
    Config {
        order: 2,
        resolution: RESOLUTION,
        velocity_rounding: 40,
        duration_rounding: 100,
        tempo_rounding: 1,
        input_files: inputs,
        output_file: dir.join("out.mid"),
        seed: Some(7),
        max_notes: Some(64),
        ..Config::default()
    }
}

fn corpus(dir: &Path) -> Vec<PathBuf> {
    let a = melody(&[
        (60, 80, 100),
        (62, 80, 100),
        (64, 120, 200),
        (62, 80, 100),
        (60, 80, 100),
        (64, 120, 200),
        (67, 120, 300),
    ]);
    let b = melody(&[
        (67, 80, 100),
        (65, 80, 100),
        (64, 80, 100),
        (62, 120, 100),
        (60, 80, 300),
    ]);
    vec![write_file(dir, "a.mid", &a), write_file(dir, "b.mid", &b)]
}

#[test]
fn generated_file_reloads_to_same_notes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), corpus(dir.path()));
    let outcome = run(&config, None, &mut SampleRng::new(7)).unwrap();

    assert_eq!(
        outcome.corpus,
        CorpusStats {
            files_read: 2,
            files_skipped: 0,
            notes: 12
        }
    );
    let generated = outcome.generation.notes;
    assert!(generated.len() >= config.order);

    let quantizer = config.quantizer().unwrap();
    let reloaded: Vec<Note> = read_notes(&config.output_file, &config.load_settings())
        .unwrap()
        .iter()
        .map(|n| quantizer.quantize(n))
        .collect();
    assert_eq!(reloaded.len(), generated.len());

    let last = generated.len() - 1;
    for (i, (got, want)) in reloaded.iter().zip(&generated).enumerate() {
        assert_eq!(got.timestamp, want.timestamp, "onset of note {i}");
        // The file has no successor after the last note, so its delay reads back as 0.
        let want = if i == last {
            Note { next_note_delay: 0, ..*want }
        } else {
            *want
        };
        assert_eq!(*got, want, "note {i}");
    }
}

#[test]
fn same_seed_same_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = corpus(dir.path());

    let first = config(dir.path(), inputs.clone());
    run(&first, None, &mut SampleRng::new(99)).unwrap();
    let second = Config {
        output_file: dir.path().join("again.mid"),
        ..first.clone()
    };
    run(&second, None, &mut SampleRng::new(99)).unwrap();

    let a = std::fs::read(&first.output_file).unwrap();
    let b = std::fs::read(&second.output_file).unwrap();
    assert_eq!(a, b);
}

#[test]
fn file_order_does_not_change_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = corpus(dir.path());
    let config = config(dir.path(), Vec::new());
    let settings = config.load_settings();

    let mut forward = prepare_model(&config, None).unwrap();
    train_corpus(&mut forward, &inputs, &settings);

    let reversed_inputs: Vec<PathBuf> = inputs.iter().rev().cloned().collect();
    let mut reversed = prepare_model(&config, None).unwrap();
    train_corpus(&mut reversed, &reversed_inputs, &settings);

    assert!(!forward.is_empty());
    assert_eq!(forward, reversed);
}

#[test]
fn unreadable_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut inputs = corpus(dir.path());
    let junk = dir.path().join("junk.mid");
    std::fs::write(&junk, b"definitely not midi").unwrap();
    inputs.insert(1, junk);
    inputs.push(dir.path().join("missing.mid"));

    let outcome = run(&config(dir.path(), inputs), None, &mut SampleRng::new(1)).unwrap();
    assert_eq!(outcome.corpus.files_read, 2);
    assert_eq!(outcome.corpus.files_skipped, 2);
    assert!(dir.path().join("out.mid").exists());
}

#[test]
fn saved_model_keeps_accumulating() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = corpus(dir.path());
    let config = config(dir.path(), Vec::new());
    let settings = config.load_settings();

    let mut partial = prepare_model(&config, None).unwrap();
    train_corpus(&mut partial, &inputs[..1], &settings);
    let saved = dir.path().join("model.json");
    partial.save(&saved).unwrap();

    let mut resumed = prepare_model(&config, Some(ChainModel::load(&saved).unwrap())).unwrap();
    train_corpus(&mut resumed, &inputs[1..], &settings);

    let mut all_at_once = prepare_model(&config, None).unwrap();
    train_corpus(&mut all_at_once, &inputs, &settings);
    assert_eq!(resumed, all_at_once);
}

#[test]
fn run_from_saved_model_without_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), corpus(dir.path()));
    let outcome = run(&config, None, &mut SampleRng::new(5)).unwrap();

    let no_inputs = Config {
        input_files: Vec::new(),
        output_file: dir.path().join("from_model.mid"),
        ..config
    };
    let again = run(&no_inputs, Some(outcome.model.clone()), &mut SampleRng::new(5)).unwrap();
    assert_eq!(again.model, outcome.model);
    assert_eq!(again.generation.notes, outcome.generation.notes);
    assert_eq!(again.corpus, CorpusStats::default());
}

#[test]
fn single_phrase_order_two_walk() {
    // Three distinct notes, order 2: seeds are [A, B] -> C -> END or [B, C] -> END.
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "abc.mid",
        &melody(&[(60, 80, 100), (64, 80, 100), (67, 80, 100)]),
    );
    let config = config(dir.path(), vec![path]);
    for seed in 0..16 {
        let outcome = run(&config, None, &mut SampleRng::new(seed)).unwrap();
        assert_eq!(outcome.generation.termination, Termination::End);
        let keys: Vec<u8> = outcome.generation.notes.iter().map(|n| n.key).collect();
        assert!(keys == [60, 64, 67] || keys == [64, 67], "seed {seed}: {keys:?}");
    }
}
