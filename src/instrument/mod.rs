//! Instruments: 808 drum kit, 303 bass and 80s polysynth voices, plus the
//! oscillator, envelope, filter and chorus building blocks they share.
//!
//! Every voice renders mono `f32` buffers at a fixed sample rate. Voice
//! instances own their oscillator and filter state, so one instance renders
//! one thing at a time; use separate instances to render in parallel.

pub mod bass;
pub mod chorus;
pub mod drum;
pub mod envelope;
pub mod filter;
pub mod oscillator;
pub mod synth;

pub use bass::{BassPattern, BassStep, BassVoice, BassWaveform};
pub use drum::{DrumKit, DrumSound};
pub use envelope::{Adsr, AdsrEnvelope, DecayEnvelope};
pub use synth::{SynthAlgorithm, SynthNote, SynthPatch, SynthVoice};

/// Peak absolute sample value of a buffer.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |max, s| max.max(s.abs()))
}

/// Add `source` scaled by `gain` into `target` starting at `offset`,
/// cutting whatever runs past the end of `target`.
pub fn mix_into(target: &mut [f32], source: &[f32], offset: usize, gain: f32) {
    let Some(window) = target.get_mut(offset..) else {
        return;
    };
    for (dst, src) in window.iter_mut().zip(source) {
        *dst += src * gain;
    }
}
