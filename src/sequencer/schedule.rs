//! Per-track note schedules.

use crate::beat::TICKS_PER_BAR;
use crate::mml::Pattern;

/// A note fires while the playhead is within this many ticks after its
/// onset. Notes the playhead skips past entirely are not fired.
pub const NOTE_WINDOW_TICKS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledNote {
    pub tick: u64,
    pub note: u8,
    /// Pattern velocity scaled by the track volume.
    pub velocity: u8,
    pub duration: u64,
    played: bool,
    released: bool,
}

impl ScheduledNote {
    pub fn played(&self) -> bool {
        self.played
    }

    pub fn end_tick(&self) -> u64 {
        self.tick + self.duration
    }

    fn is_due(&self, position: u64) -> bool {
        !self.played && self.tick <= position && position < self.tick + NOTE_WINDOW_TICKS
    }

    fn is_sounding(&self) -> bool {
        self.played && !self.released
    }
}

/// Notes of one track with their fired/released flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    notes: Vec<ScheduledNote>,
}

impl Schedule {
    /// Build from a pattern's sounding events. Velocities are scaled by
    /// `volume` and truncated.
    pub fn build(pattern: &Pattern, volume: f64) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        let notes = pattern
            .events()
            .into_iter()
            .map(|event| ScheduledNote {
                tick: event.tick,
                note: event.midi_note,
                velocity: (event.velocity as f64 * volume) as u8,
                duration: event.duration,
                played: false,
                released: false,
            })
            .collect();
        Self { notes }
    }

    pub fn notes(&self) -> &[ScheduledNote] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Notes entering their window at `position`, marked played.
    pub fn take_due(&mut self, position: u64) -> Vec<ScheduledNote> {
        let mut due = Vec::new();
        for note in self.notes.iter_mut().filter(|n| n.is_due(position)) {
            note.played = true;
            due.push(*note);
        }
        due
    }

    /// Played notes whose duration has elapsed at `position`, marked
    /// released.
    pub fn take_finished(&mut self, position: u64) -> Vec<ScheduledNote> {
        let mut finished = Vec::new();
        for note in self.notes.iter_mut() {
            if note.is_sounding() && position >= note.end_tick() {
                note.released = true;
                finished.push(*note);
            }
        }
        finished
    }

    /// Every played note still sounding, marked released.
    pub fn release_all(&mut self) -> Vec<ScheduledNote> {
        let mut sounding = Vec::new();
        for note in self.notes.iter_mut().filter(|n| n.is_sounding()) {
            note.released = true;
            sounding.push(*note);
        }
        sounding
    }

    /// Treat notes starting before `position` as already handled, so a
    /// schedule rebuilt mid-playback does not fire them late.
    pub fn skip_before(&mut self, position: u64) {
        for note in self.notes.iter_mut().filter(|n| n.tick < position) {
            note.played = true;
            note.released = true;
        }
    }
}

/// Which of `steps` equal steps of the first bar hold a note onset.
pub fn pattern_grid(pattern: &Pattern, steps: usize) -> Vec<bool> {
    let mut grid = vec![false; steps];
    if steps == 0 {
        return grid;
    }
    let ticks_per_step = (TICKS_PER_BAR / steps as u64).max(1);
    let mut tick = 0;
    for note in &pattern.notes {
        if !note.is_rest() {
            if let Some(cell) = grid.get_mut((tick / ticks_per_step) as usize) {
                *cell = true;
            }
        }
        tick += note.duration_ticks();
    }
    grid
}
