//! Transport state and playhead math.

use std::fmt;
use std::time::Instant;

use crate::beat::{self, TICKS_PER_BEAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportState::Stopped => "stopped",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
        })
    }
}

/// Playhead location. `bar` and `beat` are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub tick: u64,
    pub bar: u64,
    pub beat: u64,
}

/// Tempo, meter and loop settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    tempo: u32,
    beats_per_bar: u32,
    pub loop_enabled: bool,
    loop_bars: u32,
}

impl Transport {
    pub fn new(tempo: u32, beats_per_bar: u32, loop_enabled: bool, loop_bars: u32) -> Self {
        Self {
            tempo: beat::clamp_tempo(tempo),
            beats_per_bar: beats_per_bar.max(1),
            loop_enabled,
            loop_bars: loop_bars.max(1),
        }
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = beat::clamp_tempo(bpm);
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn loop_bars(&self) -> u32 {
        self.loop_bars
    }

    pub fn set_loop(&mut self, enabled: bool, bars: u32) {
        self.loop_enabled = enabled;
        self.loop_bars = bars.max(1);
    }

    pub fn ticks_per_second(&self) -> f64 {
        beat::ticks_per_second(self.tempo as f64)
    }

    pub fn ticks_per_bar(&self) -> u64 {
        TICKS_PER_BEAT * self.beats_per_bar as u64
    }

    /// Loop length in ticks, or `None` when looping is off.
    pub fn loop_ticks(&self) -> Option<u64> {
        self.loop_enabled.then(|| self.loop_bars as u64 * self.ticks_per_bar())
    }

    /// Fold `tick` into the loop. The flag is set when the tick had run past
    /// the loop end.
    pub fn wrap(&self, tick: u64) -> (u64, bool) {
        match self.loop_ticks() {
            Some(length) if tick >= length => (tick % length, true),
            _ => (tick, false),
        }
    }

    pub fn position(&self, tick: u64) -> Position {
        let (bar, beat) = beat::bar_and_beat(tick, self.beats_per_bar);
        Position { tick, bar, beat }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(120, beat::DEFAULT_BEATS_PER_BAR, true, 4)
    }
}

/// Maps wall-clock time to ticks from an anchor. Rebasing moves the anchor
/// so the tick count stays continuous across loop wraps, tempo changes and
/// resumes.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    anchor: Instant,
    anchor_tick: u64,
}

impl Clock {
    pub fn new(anchor: Instant, anchor_tick: u64) -> Self {
        Self { anchor, anchor_tick }
    }

    pub fn tick_at(&self, now: Instant, ticks_per_second: f64) -> u64 {
        let elapsed = now.saturating_duration_since(self.anchor).as_secs_f64();
        self.anchor_tick + (elapsed * ticks_per_second) as u64
    }

    pub fn rebase(&mut self, now: Instant, tick: u64) {
        self.anchor = now;
        self.anchor_tick = tick;
    }
}
