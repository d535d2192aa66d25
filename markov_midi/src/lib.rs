// Markov MIDI: learn note sequences from MIDI files, generate new ones.
//
// A variable-order Markov chain records, for every run of up to N consecutive
// notes in a corpus, how often each note (or the end of the piece) followed
// it. Generation walks that table with weighted random draws from a seeded
// PRNG, so a run is reproducible from its seed.
//
// Architecture:
// - note.rs: Note entity, its timestamp-free identity key, delay back-fill
// - quantize.rs: floor-to-multiple rounding of velocities, durations, tempo
// - chain.rs: the context table (training, merging, JSON persistence)
// - sampling.rs: weighted next-symbol choice
// - generate.rs: seeded walk, termination, onset layout
// - corpus.rs: MIDI files -> note sequences (midly)
// - render.rs: note sequence -> MIDI file (midly)
// - config.rs: run configuration and validation
// - pipeline.rs: load -> train -> generate -> write, as used by the CLI
// - error.rs: error types

pub mod chain;
pub mod config;
pub mod corpus;
pub mod error;
pub mod generate;
pub mod note;
pub mod pipeline;
pub mod quantize;
pub mod render;
pub mod sampling;
