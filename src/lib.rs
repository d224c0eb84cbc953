//! Groovebox: an offline music engine.
//!
//! MML patterns in, audio and MIDI out: a pattern parser, drum / 303 bass /
//! 80s synth voices, a song composer and mixer, a threaded step sequencer,
//! and Standard MIDI File and WAV exporters.

pub mod beat;
pub mod config;
pub mod export;
pub mod instrument;
pub mod mml;
pub mod sequencer;
pub mod song;
