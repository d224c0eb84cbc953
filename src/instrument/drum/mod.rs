//! Drum machine voice: ten analog-style drum sounds, the General MIDI drum
//! map, a library of MML preset patterns and step-grid conversion.
//!
//! Drum patterns are ordinary MML. The seven note letters at any octave pick
//! a sound:
//!
//! | Letter | Sound       | GM note |
//! |--------|-------------|---------|
//! | `c`    | kick        | 36      |
//! | `d`    | snare       | 38      |
//! | `e`    | low tom     | 41      |
//! | `f`    | mid tom     | 43      |
//! | `g`    | high tom    | 45      |
//! | `a`    | closed hat  | 42      |
//! | `b`    | open hat    | 46      |
//!
//! Clap (39), cowbell (56) and rimshot (37) have no letter; they are reachable
//! from song drum grids and [`DrumKit`] directly.

mod grid;
mod kit;

pub use grid::{grid_to_mml, pattern_to_grid, DrumGrid, DEFAULT_GRID_STEPS};
pub use kit::{DrumKit, DEFAULT_KIT_SEED};

use std::fmt;

use crate::mml::{self, Pattern, Pitch};

/// One of the drum machine's sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrumSound {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Clap,
    Cowbell,
    LowTom,
    MidTom,
    HighTom,
    Rimshot,
}

impl DrumSound {
    pub const ALL: [DrumSound; 10] = [
        DrumSound::Kick,
        DrumSound::Snare,
        DrumSound::ClosedHat,
        DrumSound::OpenHat,
        DrumSound::Clap,
        DrumSound::Cowbell,
        DrumSound::LowTom,
        DrumSound::MidTom,
        DrumSound::HighTom,
        DrumSound::Rimshot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DrumSound::Kick => "kick",
            DrumSound::Snare => "snare",
            DrumSound::ClosedHat => "closed_hat",
            DrumSound::OpenHat => "open_hat",
            DrumSound::Clap => "clap",
            DrumSound::Cowbell => "cowbell",
            DrumSound::LowTom => "low_tom",
            DrumSound::MidTom => "mid_tom",
            DrumSound::HighTom => "high_tom",
            DrumSound::Rimshot => "rimshot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// General MIDI percussion note number (channel 10).
    pub fn gm_note(self) -> u8 {
        match self {
            DrumSound::Kick => 36,
            DrumSound::Rimshot => 37,
            DrumSound::Snare => 38,
            DrumSound::Clap => 39,
            DrumSound::LowTom => 41,
            DrumSound::ClosedHat => 42,
            DrumSound::MidTom => 43,
            DrumSound::HighTom => 45,
            DrumSound::OpenHat => 46,
            DrumSound::Cowbell => 56,
        }
    }

    /// Sound triggered by an MML note letter. Rests map to nothing.
    pub fn from_pitch(pitch: Pitch) -> Option<Self> {
        match pitch {
            Pitch::C => Some(DrumSound::Kick),
            Pitch::D => Some(DrumSound::Snare),
            Pitch::E => Some(DrumSound::LowTom),
            Pitch::F => Some(DrumSound::MidTom),
            Pitch::G => Some(DrumSound::HighTom),
            Pitch::A => Some(DrumSound::ClosedHat),
            Pitch::B => Some(DrumSound::OpenHat),
            Pitch::Rest => None,
        }
    }

    /// MML note letter for this sound, if it has one.
    pub fn pitch(self) -> Option<Pitch> {
        match self {
            DrumSound::Kick => Some(Pitch::C),
            DrumSound::Snare => Some(Pitch::D),
            DrumSound::LowTom => Some(Pitch::E),
            DrumSound::MidTom => Some(Pitch::F),
            DrumSound::HighTom => Some(Pitch::G),
            DrumSound::ClosedHat => Some(Pitch::A),
            DrumSound::OpenHat => Some(Pitch::B),
            DrumSound::Clap | DrumSound::Cowbell | DrumSound::Rimshot => None,
        }
    }
}

impl fmt::Display for DrumSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single drum hit at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumHit {
    pub sound: DrumSound,
    /// MIDI velocity, 0-127.
    pub velocity: u8,
    pub tick: u64,
    /// Ticks until the next note or rest.
    pub duration: u64,
}

impl DrumHit {
    pub fn midi_note(&self) -> u8 {
        self.sound.gm_note()
    }
}

/// Every non-rest note of a drum pattern as a hit, in pattern order.
pub fn hits(pattern: &Pattern) -> Vec<DrumHit> {
    let mut out = Vec::new();
    let mut tick = 0;
    for note in &pattern.notes {
        let duration = note.duration_ticks();
        if let Some(sound) = DrumSound::from_pitch(note.pitch) {
            out.push(DrumHit {
                sound,
                velocity: note.velocity,
                tick,
                duration,
            });
        }
        tick += duration;
    }
    out
}

const PRESETS: &[(&str, &str)] = &[
    ("basic_4x4", "t120 l16 o4 [c a a a d a a a c a a a d a a a]2"),
    (
        "house_basic",
        "t125 l16 o4 v14
         ; four on the floor with offbeat hats
         [crrr arar drrr arar crrr arar drrr arar]4",
    ),
    (
        "techno_kick",
        "t130 l16 o4 v15
         ; hard kick
         [crcr rrrr drrr rrrr crrr crrr drrr rrrr]4",
    ),
    (
        "electro_beat",
        "t125 l16 o4 v14
         [crrr arar drcr arar crrr arbr drrr arar]4",
    ),
    (
        "hip_hop",
        "t90 l16 o4 v12
         ; boom bap
         [crrr arar rrrr ardr rrrr crar drrr arar]4",
    ),
    (
        "breakbeat",
        "t135 l16 o4 v14
         [crrr ardr rrrr arcr drrr arrr crdr arar]4",
    ),
];

const STYLES: &[(&str, &str)] = &[
    ("house", "house_basic"),
    ("techno", "techno_kick"),
    ("electro", "electro_beat"),
    ("hip_hop", "hip_hop"),
    ("breakbeat", "breakbeat"),
];

/// Parse an MML drum pattern. The pattern is named `drums`.
pub fn parse_pattern(text: &str) -> Pattern {
    mml::parse_named(text, "drums")
}

/// A preset pattern by name, or `None` if there is no such preset.
pub fn preset(name: &str) -> Option<Pattern> {
    PRESETS
        .iter()
        .find(|(preset_name, _)| *preset_name == name)
        .map(|(_, text)| parse_pattern(text))
}

pub fn list_presets() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

/// A ready-made beat for a style (`house`, `techno`, `electro`, `hip_hop`,
/// `breakbeat`). Unknown styles get the basic four-on-the-floor.
pub fn basic_beat(style: &str) -> Pattern {
    let (_, fallback) = PRESETS[0];
    STYLES
        .iter()
        .find(|(s, _)| *s == style)
        .and_then(|(_, name)| preset(name))
        .unwrap_or_else(|| parse_pattern(fallback))
}
