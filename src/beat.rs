//! Musical time in integer ticks.
//!
//! Every renderer, the sequencer and the MIDI writer share one resolution:
//! 480 ticks per quarter note, four quarter notes per bar. Conversion to
//! seconds or sample counts happens only at the rendering boundary.

/// Ticks per quarter note (beat). Also the PPQ written into MIDI headers.
pub const TICKS_PER_BEAT: u64 = 480;

/// Default time signature: 4 beats per bar.
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Ticks in one 4/4 bar.
pub const TICKS_PER_BAR: u64 = TICKS_PER_BEAT * DEFAULT_BEATS_PER_BAR as u64;

/// Steps per bar on a 16th-note grid.
pub const STEPS_PER_BAR: u32 = 16;

/// Output sample rate for every engine in the crate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Tempo range accepted anywhere a BPM is stored.
pub const MIN_TEMPO: u32 = 40;
pub const MAX_TEMPO: u32 = 300;

/// Clamp a tempo into `[MIN_TEMPO, MAX_TEMPO]`.
pub fn clamp_tempo(bpm: u32) -> u32 {
    bpm.clamp(MIN_TEMPO, MAX_TEMPO)
}

/// Ticks elapsed per wall-clock second at `bpm`.
pub fn ticks_per_second(bpm: f64) -> f64 {
    bpm / 60.0 * TICKS_PER_BEAT as f64
}

/// Convert a tick count to seconds at `bpm`.
pub fn ticks_to_seconds(ticks: u64, bpm: f64) -> f64 {
    ticks as f64 / ticks_per_second(bpm)
}

/// Duration of one 16th-note step in seconds.
pub fn step_seconds(bpm: f64) -> f64 {
    60.0 / bpm / 4.0
}

/// Whole samples in one 16th-note step, rounded to the nearest sample.
pub fn samples_per_step(bpm: f64, sample_rate: u32) -> usize {
    (sample_rate as f64 * step_seconds(bpm)).round() as usize
}

/// Bar index and beat-within-bar for a tick position.
pub fn bar_and_beat(tick: u64, beats_per_bar: u32) -> (u64, u64) {
    let ticks_per_bar = TICKS_PER_BEAT * beats_per_bar.max(1) as u64;
    let bar = tick / ticks_per_bar;
    let beat = (tick % ticks_per_bar) / TICKS_PER_BEAT;
    (bar, beat)
}
