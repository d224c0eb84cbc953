//! Step-grid view of drum patterns.

use std::collections::BTreeMap;

use super::DrumSound;
use crate::beat::{self, TICKS_PER_BAR};
use crate::mml::Pattern;

/// Velocity (0-127) per step for every drum sound. Zero means no hit.
pub type DrumGrid = BTreeMap<DrumSound, Vec<u8>>;

pub const DEFAULT_GRID_STEPS: usize = 16;

/// Voices written back to MML, highest priority first. MML is monophonic so
/// one letter is emitted per step.
const MML_PRIORITY: [DrumSound; 7] = [
    DrumSound::Kick,
    DrumSound::Snare,
    DrumSound::ClosedHat,
    DrumSound::OpenHat,
    DrumSound::LowTom,
    DrumSound::MidTom,
    DrumSound::HighTom,
];

/// Bucket the first bar of a drum pattern into `steps` equal steps.
///
/// Every sound gets a row, even when silent. A note lands in the step that
/// contains its onset tick; notes past the bar are dropped.
pub fn pattern_to_grid(pattern: &Pattern, steps: usize) -> DrumGrid {
    let steps = steps.max(1);
    let mut grid: DrumGrid = DrumSound::ALL
        .iter()
        .map(|sound| (*sound, vec![0; steps]))
        .collect();
    let ticks_per_step = (TICKS_PER_BAR / steps as u64).max(1);

    let mut tick = 0;
    for note in &pattern.notes {
        if let Some(sound) = DrumSound::from_pitch(note.pitch) {
            let step = (tick / ticks_per_step) as usize;
            if let Some(cell) = grid.get_mut(&sound).and_then(|row| row.get_mut(step)) {
                *cell = note.velocity;
            }
        }
        tick += note.duration_ticks();
    }

    grid
}

/// Write a grid back as one bar of MML.
///
/// The note length is the grid's step count, so a 16-step grid is written
/// in sixteenths. Where several sounds share a step only the highest
/// priority lettered sound is kept; clap, cowbell and rimshot have no letter
/// and are dropped.
pub fn grid_to_mml(grid: &DrumGrid, tempo: u32) -> String {
    let steps = grid
        .values()
        .map(Vec::len)
        .max()
        .unwrap_or(DEFAULT_GRID_STEPS)
        .max(1);

    let cells: Vec<char> = (0..steps)
        .map(|step| {
            MML_PRIORITY
                .iter()
                .find(|sound| {
                    grid.get(*sound)
                        .and_then(|row| row.get(step))
                        .is_some_and(|velocity| *velocity > 0)
                })
                .and_then(|sound| sound.pitch())
                .map_or('r', |pitch| pitch.letter())
        })
        .collect();

    let body: Vec<String> = cells
        .chunks(4)
        .map(|group| group.iter().collect())
        .collect();

    format!(
        "t{} l{} o4 v14\n{}",
        beat::clamp_tempo(tempo),
        steps,
        body.join(" ")
    )
}
