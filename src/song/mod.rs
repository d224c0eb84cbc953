//! Song composer: a sectioned text format that combines one drum grid, one
//! bass line and one synth chord track into a single mixed buffer.
//!
//! ```text
//! #SONG "Night Drive"
//! #TEMPO 124
//! #BARS 1
//!
//! #DRUMS
//! x-x-x-x-|x-x-x-x-     ; closed hat
//! ----x---|----x---     ; snare
//! X-------|X-------     ; kick
//!
//! #BASS <acid>
//! c2* c c~ e* g g~ c3* c r c e~ g* g c~ c* r
//!
//! #SYNTH <juno-pad>
//! [c4 e4 g4]2 [a3 c4 e4]2
//! ```

pub mod parser;
pub mod render;

pub use parser::parse;
pub use render::{render, SongRenderer};

use serde::{Deserialize, Serialize};

use crate::beat;
use crate::config::EngineConfig;
use crate::instrument::bass::BassPattern;
use crate::instrument::drum::DrumSound;
use crate::instrument::synth::{self, SynthNote, SynthPatch};

pub const DEFAULT_SONG_NAME: &str = "Untitled";
pub const DEFAULT_SONG_TEMPO: u32 = 120;
pub const DEFAULT_SONG_BARS: u32 = 4;
/// Upper bound on `#BARS`; about 30 minutes at the slowest tempo.
pub const MAX_SONG_BARS: u32 = 999;

/// Voice driven by each drum grid line, in line order.
pub const DRUM_LINE_VOICES: [DrumSound; 8] = [
    DrumSound::ClosedHat,
    DrumSound::Snare,
    DrumSound::Kick,
    DrumSound::OpenHat,
    DrumSound::Clap,
    DrumSound::Cowbell,
    DrumSound::LowTom,
    DrumSound::MidTom,
];

/// Per-track gains applied when the tracks are summed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixLevels {
    pub drums: f32,
    pub bass: f32,
    pub synth: f32,
}

impl Default for MixLevels {
    fn default() -> Self {
        Self {
            drums: 0.8,
            bass: 0.7,
            synth: 0.6,
        }
    }
}

/// One grid line: a voice and a velocity (0-1) per 16th step. Zero is a rest.
#[derive(Debug, Clone, PartialEq)]
pub struct DrumLane {
    pub sound: DrumSound,
    pub steps: Vec<f32>,
}

impl DrumLane {
    pub fn hits(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, velocity)| **velocity > 0.0)
            .map(|(step, velocity)| (step, *velocity))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrumTrack {
    pub lanes: Vec<DrumLane>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BassTrack {
    pub pattern: BassPattern,
    /// Preset the tone settings came from.
    pub preset: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthTrack {
    pub notes: Vec<SynthNote>,
    pub patch: SynthPatch,
    pub preset: String,
}

impl SynthTrack {
    /// Notes grouped by shared start time and duration, in time order.
    pub fn chords(&self) -> Vec<(f64, f64, Vec<u8>)> {
        let mut chords: Vec<(f64, f64, Vec<u8>)> = Vec::new();
        for note in &self.notes {
            match chords.last_mut() {
                Some((start, duration, pitches)) if *start == note.start && *duration == note.duration => {
                    pitches.push(note.pitch)
                }
                _ => chords.push((note.start, note.duration, vec![note.pitch])),
            }
        }
        chords
    }
}

impl Default for SynthTrack {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            patch: synth::preset_or_default(synth::DEFAULT_PRESET),
            preset: synth::DEFAULT_PRESET.to_string(),
        }
    }
}

/// A parsed song. At most one track of each kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub name: String,
    tempo: u32,
    pub bars: u32,
    pub drums: Option<DrumTrack>,
    pub bass: Option<BassTrack>,
    pub synth: Option<SynthTrack>,
    pub mix: MixLevels,
}

impl Song {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Tempo in BPM, always within `[40, 300]`.
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = beat::clamp_tempo(bpm);
    }

    /// Set the length in bars, capped at [`MAX_SONG_BARS`].
    pub fn set_bars(&mut self, bars: u32) {
        self.bars = bars.min(MAX_SONG_BARS);
    }

    pub fn total_steps(&self) -> usize {
        self.bars.min(MAX_SONG_BARS) as usize * beat::STEPS_PER_BAR as usize
    }

    /// Length of the song in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.total_steps() as f64 * beat::step_seconds(self.tempo as f64)
    }

    /// Take the track gains from an engine configuration.
    pub fn apply_mix(&mut self, config: &EngineConfig) {
        self.mix = config.mix;
    }
}

impl Default for Song {
    fn default() -> Self {
        Self {
            name: DEFAULT_SONG_NAME.to_string(),
            tempo: DEFAULT_SONG_TEMPO,
            bars: DEFAULT_SONG_BARS,
            drums: None,
            bass: None,
            synth: None,
            mix: MixLevels::default(),
        }
    }
}
