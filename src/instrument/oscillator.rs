//! Oscillator primitives: waveform generation and the sine LFO.

use std::f64::consts::PI;

/// Available waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    /// Pulse with the given duty cycle in (0, 1).
    Pulse(f64),
}

/// Generate a single sample for the given waveform at the specified phase.
///
/// `phase` is in the range [0.0, 1.0), representing one full cycle.
/// Returns a value in [-1.0, 1.0].
pub fn oscillator(waveform: Waveform, phase: f64) -> f64 {
    match waveform {
        Waveform::Sine => (phase * 2.0 * PI).sin(),
        Waveform::Saw => 2.0 * phase - 1.0,
        Waveform::Square => oscillator(Waveform::Pulse(0.5), phase),
        Waveform::Pulse(width) => {
            if phase < width {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Advance a normalized phase by one sample of `freq`, wrapping into [0, 1).
pub fn advance_phase(phase: f64, freq: f64, sample_rate: u32) -> f64 {
    let next = phase + freq / sample_rate as f64;
    if next >= 1.0 {
        next - 1.0
    } else {
        next
    }
}

/// Convert a MIDI note number to frequency in Hz.
///
/// Standard tuning: A4 (MIDI 69) = 440 Hz.
pub fn midi_to_freq(note: u8) -> f64 {
    440.0 * 2.0f64.powf((note as f64 - 69.0) / 12.0)
}

/// Frequency ratio for a detune in cents.
pub fn cents_ratio(cents: f64) -> f64 {
    2.0f64.powf(cents / 1200.0)
}

/// Sine low-frequency oscillator. Each call to [`Lfo::next_sample`] advances
/// the phase first, so the first value is slightly past zero.
#[derive(Debug, Clone)]
pub struct Lfo {
    pub rate: f64,
    sample_rate: u32,
    phase: f64,
}

impl Lfo {
    pub fn new(rate: f64, sample_rate: u32) -> Self {
        Self {
            rate,
            sample_rate,
            phase: 0.0,
        }
    }

    /// Next LFO value in [-1, 1].
    pub fn next_sample(&mut self) -> f64 {
        self.phase = advance_phase(self.phase, self.rate, self.sample_rate);
        oscillator(Waveform::Sine, self.phase)
    }
}
