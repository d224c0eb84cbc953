//! Song text parser.
//!
//! Permissive like the MML parser: unknown lines are ignored, malformed
//! header values keep the previous setting, and nothing is an error.

use super::{BassTrack, DrumLane, DrumTrack, Song, SynthTrack, DRUM_LINE_VOICES};
use crate::instrument::{bass, synth};
use crate::instrument::synth::SynthNote;

/// Velocity of an uppercase `X`/`O` drum hit.
pub const ACCENT_HIT: f32 = 1.0;
/// Velocity of a lowercase `x`/`o` drum hit.
pub const NORMAL_HIT: f32 = 0.8;
/// Velocity of every synth chord note.
pub const SYNTH_VELOCITY: f64 = 0.8;
/// Longest chord, in beats.
pub const MAX_CHORD_BEATS: f64 = 64.0;

const DEFAULT_BASS_PRESET: &str = "acid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Drums,
    Bass,
    Synth,
}

/// A section header and the content lines collected under it.
struct Section {
    kind: SectionKind,
    preset: Option<String>,
    lines: Vec<String>,
}

/// Parse song text. Never fails; see the module docs of [`crate::song`] for
/// the format.
pub fn parse(text: &str) -> Song {
    let mut song = Song::default();
    let mut sections: Vec<Section> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#SONG") {
            if let Some(name) = rest.split('"').nth(1) {
                song.name = name.to_string();
            }
        } else if let Some(rest) = line.strip_prefix("#TEMPO") {
            if let Some(bpm) = header_number(rest) {
                song.set_tempo(bpm);
            }
        } else if let Some(rest) = line.strip_prefix("#BARS") {
            if let Some(bars) = header_number(rest) {
                song.set_bars(bars);
            }
        } else if line.starts_with("#DRUMS") {
            sections.push(Section::new(SectionKind::Drums, None));
        } else if let Some(rest) = line.strip_prefix("#BASS") {
            sections.push(Section::new(SectionKind::Bass, preset_name(rest)));
        } else if let Some(rest) = line.strip_prefix("#SYNTH") {
            sections.push(Section::new(SectionKind::Synth, preset_name(rest)));
        } else if let Some(section) = sections.last_mut() {
            let content = line.split(';').next().unwrap_or_default().trim();
            if !content.is_empty() {
                section.lines.push(content.to_string());
            }
        }
    }

    // Later sections of the same kind replace earlier ones.
    for section in sections.into_iter().filter(|s| !s.lines.is_empty()) {
        match section.kind {
            SectionKind::Drums => song.drums = Some(parse_drums(&section.lines, song.total_steps())),
            SectionKind::Bass => song.bass = Some(parse_bass(&section.lines, section.preset, song.tempo())),
            SectionKind::Synth => song.synth = Some(parse_synth(&section.lines, section.preset, song.tempo())),
        }
    }

    log::debug!(
        target: "render",
        "parsed song {:?}: {} bpm, {} bars, drums={} bass={} synth={}",
        song.name,
        song.tempo(),
        song.bars,
        song.drums.is_some(),
        song.bass.is_some(),
        song.synth.is_some()
    );
    song
}

impl Section {
    fn new(kind: SectionKind, preset: Option<String>) -> Self {
        Self {
            kind,
            preset,
            lines: Vec::new(),
        }
    }
}

fn header_number(rest: &str) -> Option<u32> {
    rest.split_whitespace().next()?.parse().ok()
}

/// `<name>` after a section keyword, or a bare word.
fn preset_name(rest: &str) -> Option<String> {
    let rest = rest.trim();
    let name = match rest.split_once('<') {
        Some((_, tail)) => tail.split('>').next().unwrap_or_default(),
        None => rest.split_whitespace().next().unwrap_or_default(),
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn parse_drums(lines: &[String], total_steps: usize) -> DrumTrack {
    let lanes = lines
        .iter()
        .zip(DRUM_LINE_VOICES)
        .map(|(line, sound)| {
            let mut steps: Vec<f32> = line
                .chars()
                .filter_map(|c| match c {
                    'X' | 'O' => Some(ACCENT_HIT),
                    'x' | 'o' => Some(NORMAL_HIT),
                    '-' => Some(0.0),
                    _ => None,
                })
                .collect();
            steps.resize(total_steps, 0.0);
            DrumLane { sound, steps }
        })
        .collect();
    DrumTrack { lanes }
}

fn parse_bass(lines: &[String], preset: Option<String>, tempo: u32) -> BassTrack {
    let shorthand = lines.join(" ").replace('|', " ");
    let mut pattern = bass::parse_shorthand(&shorthand);
    pattern.tempo = tempo;

    let preset = preset.unwrap_or_else(|| DEFAULT_BASS_PRESET.to_string());
    if let Some(tone) = bass::preset(&preset) {
        pattern.set_tone_from(&tone);
    } else {
        log::debug!(target: "render", "unknown bass preset {preset:?}, keeping default tone");
    }

    BassTrack { pattern, preset }
}

fn parse_synth(lines: &[String], preset: Option<String>, tempo: u32) -> SynthTrack {
    let content = lines.join(" ").replace('|', " ");
    let beat_seconds = 60.0 / tempo as f64;
    let mut notes = Vec::new();
    let mut time = 0.0;

    let mut rest = content.as_str();
    while let Some(open) = rest.find('[') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find(']') else {
            break;
        };
        let chord = &after_open[..close];
        let tail = &after_open[close + 1..];

        let digits = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let beats = tail[..digits].parse::<f64>().unwrap_or(1.0).min(MAX_CHORD_BEATS);
        let duration = beats * beat_seconds;

        for pitch in chord.split_whitespace().filter_map(note_to_midi) {
            notes.push(SynthNote::new(pitch, SYNTH_VELOCITY, time, duration));
        }
        time += duration;
        rest = &tail[digits..];
    }

    let preset = preset.unwrap_or_else(|| synth::DEFAULT_PRESET.to_string());
    SynthTrack {
        notes,
        patch: synth::preset_or_default(&preset),
        preset,
    }
}

/// `c4`, `f#3`, `a`: letter, optional sharp, optional octave (default 4).
pub fn note_to_midi(token: &str) -> Option<u8> {
    let lowered = token.to_ascii_lowercase();
    let mut chars = lowered.chars().peekable();
    let base: u32 = match chars.next()? {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let sharp = chars.next_if_eq(&'#').is_some();
    // no e# or b#
    if sharp && (base == 4 || base == 11) {
        return None;
    }
    let octave = chars.next_if(char::is_ascii_digit).and_then(|c| c.to_digit(10)).unwrap_or(4);
    Some((12 + octave * 12 + base + sharp as u32) as u8)
}
