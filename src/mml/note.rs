//! Pattern data model: notes, patterns and the tick math every renderer shares.

use crate::beat::{self, TICKS_PER_BAR, TICKS_PER_BEAT};

pub const DEFAULT_OCTAVE: u8 = 4;
pub const MAX_OCTAVE: u8 = 8;
pub const DEFAULT_LENGTH: u32 = 4;
pub const DEFAULT_TEMPO: u32 = 120;
/// MML volume scale is 0-15.
pub const DEFAULT_VOLUME: u8 = 12;
pub const MAX_VOLUME: u8 = 15;

/// Pitch class of a note, or a rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pitch {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
    Rest,
}

impl Pitch {
    /// Map a lowercase note letter (`c`..`b`) to a pitch.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'c' => Some(Pitch::C),
            'd' => Some(Pitch::D),
            'e' => Some(Pitch::E),
            'f' => Some(Pitch::F),
            'g' => Some(Pitch::G),
            'a' => Some(Pitch::A),
            'b' => Some(Pitch::B),
            _ => None,
        }
    }

    /// The MML letter for this pitch (`r` for a rest).
    pub fn letter(self) -> char {
        match self {
            Pitch::C => 'c',
            Pitch::D => 'd',
            Pitch::E => 'e',
            Pitch::F => 'f',
            Pitch::G => 'g',
            Pitch::A => 'a',
            Pitch::B => 'b',
            Pitch::Rest => 'r',
        }
    }

    /// Semitone offset above C, or `None` for a rest.
    pub fn semitone(self) -> Option<i32> {
        match self {
            Pitch::C => Some(0),
            Pitch::D => Some(2),
            Pitch::E => Some(4),
            Pitch::F => Some(5),
            Pitch::G => Some(7),
            Pitch::A => Some(9),
            Pitch::B => Some(11),
            Pitch::Rest => None,
        }
    }

    pub fn is_rest(self) -> bool {
        self == Pitch::Rest
    }
}

/// Convert an MML volume (0-15) to a MIDI velocity (0-127).
pub fn volume_to_velocity(volume: u8) -> u8 {
    (volume.min(MAX_VOLUME) as u32 * 127 / MAX_VOLUME as u32) as u8
}

/// A single parsed note or rest with all modifiers folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub pitch: Pitch,
    pub octave: u8,
    /// Length denominator: 1 = whole, 4 = quarter, 16 = sixteenth.
    pub length: u32,
    pub dots: u8,
    pub sharp: bool,
    pub flat: bool,
    pub velocity: u8,
    pub tied: bool,
}

impl Note {
    pub fn new(pitch: Pitch, octave: u8, length: u32, velocity: u8) -> Self {
        Self {
            pitch,
            octave: octave.min(MAX_OCTAVE),
            length,
            dots: 0,
            sharp: false,
            flat: false,
            velocity: velocity.min(127),
            tied: false,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_rest()
    }

    /// MIDI note number (C4 = 60), clamped to `0..=127`. `None` for rests.
    ///
    /// A sharp wins over a flat when both are present.
    pub fn midi_note(&self) -> Option<u8> {
        let semitone = self.pitch.semitone()?;
        let octave = self.octave.min(MAX_OCTAVE) as i32;
        let mut midi = 12 * (octave + 1) + semitone;
        if self.sharp {
            midi += 1;
        } else if self.flat {
            midi -= 1;
        }
        Some(midi.clamp(0, 127) as u8)
    }

    /// Duration in ticks at 480 PPQ. Each dot adds half of the previous
    /// increment. Always at least one tick.
    pub fn duration_ticks(&self) -> u64 {
        let mut ticks = (TICKS_PER_BAR / self.length.max(1) as u64).max(1);
        let mut increment = ticks;
        for _ in 0..self.dots {
            increment /= 2;
            ticks += increment;
        }
        ticks
    }
}

/// A sounding note at an absolute tick, produced by [`Pattern::events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub tick: u64,
    pub midi_note: u8,
    pub velocity: u8,
    pub duration: u64,
    /// Index of the note in [`Pattern::notes`] that started this event.
    pub note_index: usize,
}

/// A parsed MML pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub notes: Vec<Note>,
    tempo: u32,
    pub default_length: u32,
    pub default_octave: u8,
    pub default_volume: u8,
    /// Whole bars covered by the notes, rounded up.
    pub bars: u32,
}

impl Pattern {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: Vec::new(),
            tempo: DEFAULT_TEMPO,
            default_length: DEFAULT_LENGTH,
            default_octave: DEFAULT_OCTAVE,
            default_volume: DEFAULT_VOLUME,
            bars: 0,
        }
    }

    /// Tempo in BPM, always within `[40, 300]`.
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = beat::clamp_tempo(bpm);
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn total_ticks(&self) -> u64 {
        self.notes.iter().map(Note::duration_ticks).sum()
    }

    pub fn duration_seconds(&self) -> f64 {
        let beats = self.total_ticks() as f64 / TICKS_PER_BEAT as f64;
        beats * 60.0 / self.tempo as f64
    }

    /// Recompute [`Pattern::bars`] from the current notes.
    pub fn update_bars(&mut self) {
        self.bars = self.total_ticks().div_ceil(TICKS_PER_BAR) as u32;
    }

    /// Sounding notes with absolute onset ticks.
    ///
    /// Rests advance time without producing an event. A tied note absorbs an
    /// immediately following note of the same MIDI pitch, so `c4&c4` sounds
    /// as one half note.
    pub fn events(&self) -> Vec<NoteEvent> {
        let mut events: Vec<NoteEvent> = Vec::new();
        let mut tick = 0;
        let mut tie_open = false;

        for (note_index, note) in self.notes.iter().enumerate() {
            let duration = note.duration_ticks();
            match note.midi_note() {
                Some(midi_note) => {
                    let continues = tie_open
                        && events
                            .last()
                            .is_some_and(|e| e.midi_note == midi_note && e.tick + e.duration == tick);
                    match events.last_mut() {
                        Some(last) if continues => last.duration += duration,
                        _ => events.push(NoteEvent {
                            tick,
                            midi_note,
                            velocity: note.velocity,
                            duration,
                            note_index,
                        }),
                    }
                    tie_open = note.tied;
                }
                None => tie_open = false,
            }
            tick += duration;
        }

        events
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new("")
    }
}
