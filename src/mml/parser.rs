//! MML parser: folds the token stream into a [`Pattern`].
//!
//! The parser keeps running defaults (octave, length, volume, tempo) and
//! attaches trailing modifiers to the note they follow. Like the lexer it
//! never fails:
//!
//! - out-of-range octaves and volumes saturate,
//! - `l0` and a `0` length override are ignored,
//! - a `]` without an open `[` is ignored,
//! - an unmatched `[` is dropped; the notes after it play once,
//! - loop counts above [`MAX_LOOP_COUNT`] play [`MAX_LOOP_COUNT`] times,
//! - loop expansion stops once a pattern holds [`MAX_PATTERN_NOTES`] notes.

use super::lexer::Lexer;
use super::note::{
    volume_to_velocity, Note, Pattern, DEFAULT_LENGTH, DEFAULT_OCTAVE, DEFAULT_TEMPO,
    DEFAULT_VOLUME, MAX_OCTAVE, MAX_VOLUME,
};
use super::token::{Token, TokenKind};

/// Most repeats a single `]n` can ask for.
pub const MAX_LOOP_COUNT: u32 = 99;
/// Cap on the expanded note list, so nested loops cannot multiply without bound.
pub const MAX_PATTERN_NOTES: usize = 10_000;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    octave: u8,
    length: u32,
    volume: u8,
    tempo: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            octave: DEFAULT_OCTAVE,
            length: DEFAULT_LENGTH,
            volume: DEFAULT_VOLUME,
            tempo: DEFAULT_TEMPO,
        }
    }

    /// Consume all tokens and build a pattern named `name`.
    pub fn parse(mut self, name: &str) -> Pattern {
        let mut pattern = Pattern::new(name);
        pattern.notes = self.parse_notes();
        pattern.set_tempo(self.tempo);
        pattern.update_bars();
        pattern
    }

    fn parse_notes(&mut self) -> Vec<Note> {
        let mut notes: Vec<Note> = Vec::new();
        // Note-list length at each open `[`.
        let mut loop_stack: Vec<usize> = Vec::new();

        while let Some(token) = self.tokens.get(self.pos) {
            let kind = token.kind;
            match kind {
                TokenKind::Note(_) | TokenKind::Rest => {
                    notes.push(self.parse_note(kind));
                    continue;
                }
                TokenKind::Tempo(bpm) => self.tempo = bpm,
                TokenKind::Octave(octave) => {
                    self.octave = octave.min(MAX_OCTAVE as u32) as u8;
                }
                TokenKind::OctaveUp => self.octave = (self.octave + 1).min(MAX_OCTAVE),
                TokenKind::OctaveDown => self.octave = self.octave.saturating_sub(1),
                TokenKind::Length(length) if length > 0 => self.length = length,
                TokenKind::Volume(volume) => {
                    self.volume = volume.min(MAX_VOLUME as u32) as u8;
                }
                TokenKind::LoopStart => loop_stack.push(notes.len()),
                TokenKind::LoopEnd(count) => {
                    if let Some(start) = loop_stack.pop() {
                        let body = notes[start..].to_vec();
                        for _ in 1..count.min(MAX_LOOP_COUNT) {
                            if notes.len() + body.len() > MAX_PATTERN_NOTES {
                                log::debug!(target: "mml", "loop expansion stopped at {} notes", notes.len());
                                break;
                            }
                            notes.extend_from_slice(&body);
                        }
                    }
                }
                // Stray modifiers with no note to attach to.
                _ => {}
            }
            self.pos += 1;
        }

        notes
    }

    /// Parse a note or rest token plus any modifiers directly after it.
    fn parse_note(&mut self, kind: TokenKind) -> Note {
        let pitch = match kind {
            TokenKind::Note(pitch) => pitch,
            _ => super::note::Pitch::Rest,
        };
        let mut note = Note::new(pitch, self.octave, self.length, volume_to_velocity(self.volume));
        self.pos += 1;

        while let Some(token) = self.tokens.get(self.pos) {
            if !token.kind.is_modifier() {
                break;
            }
            match token.kind {
                TokenKind::Sharp => note.sharp = true,
                TokenKind::Flat => note.flat = true,
                TokenKind::Number(length) if length > 0 => note.length = length,
                TokenKind::Dot => note.dots = note.dots.saturating_add(1),
                TokenKind::Tie => note.tied = true,
                _ => {}
            }
            self.pos += 1;
        }

        note
    }
}

/// Parse MML text into a pattern.
///
/// ```
/// let pattern = groovebox::mml::parse("t120 l8 o4 c d e f");
/// assert_eq!(pattern.len(), 4);
/// ```
pub fn parse(source: &str) -> Pattern {
    parse_named(source, "")
}

/// Parse MML text into a pattern carrying `name`.
pub fn parse_named(source: &str, name: &str) -> Pattern {
    let tokens = Lexer::new(source).tokenize();
    Parser::new(tokens).parse(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mml::note::Pitch;

    fn midi(pattern: &Pattern) -> Vec<Option<u8>> {
        pattern.notes.iter().map(Note::midi_note).collect()
    }

    #[test]
    fn basic_scale() {
        let p = parse("t120 l8 o4 c d e f");
        assert_eq!(p.len(), 4);
        assert_eq!(p.tempo(), 120);
        assert!(p.notes.iter().all(|n| n.length == 8 && n.octave == 4));
        assert_eq!(midi(&p), vec![Some(60), Some(62), Some(64), Some(65)]);
    }

    #[test]
    fn defaults_without_commands() {
        let p = parse("c");
        let n = &p.notes[0];
        assert_eq!(n.octave, 4);
        assert_eq!(n.length, 4);
        assert_eq!(n.velocity, volume_to_velocity(12));
        assert_eq!(p.tempo(), 120);
    }

    #[test]
    fn loop_repeats_body() {
        let p = parse("[c d]3");
        let pitches: Vec<Pitch> = p.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(
            pitches,
            vec![Pitch::C, Pitch::D, Pitch::C, Pitch::D, Pitch::C, Pitch::D]
        );
    }

    #[test]
    fn loop_default_count_is_two() {
        assert_eq!(parse("[c d]").len(), 4);
    }

    #[test]
    fn loop_count_one_or_zero_plays_once() {
        assert_eq!(parse("[c d]1").len(), 2);
        assert_eq!(parse("[c d]0").len(), 2);
    }

    #[test]
    fn nested_loops() {
        // inner: c d c d, then e; outer doubles the whole group
        assert_eq!(parse("[[c d]2 e]2").len(), 10);
    }

    #[test]
    fn loop_keeps_notes_before_it() {
        let p = parse("e [c]3");
        assert_eq!(p.len(), 4);
        assert_eq!(p.notes[0].pitch, Pitch::E);
    }

    #[test]
    fn loop_count_is_capped() {
        assert_eq!(parse("[c]4294967295").len(), MAX_LOOP_COUNT as usize);
        assert_eq!(parse("[c d]500").len(), 2 * MAX_LOOP_COUNT as usize);
    }

    #[test]
    fn nested_loop_expansion_is_bounded() {
        // 50^4 notes if expanded in full
        let p = parse("[[[[c]50]50]50]50");
        assert!(p.len() <= MAX_PATTERN_NOTES);
        assert!(p.len() > MAX_PATTERN_NOTES / 2);
        // whole repeats only: the last body copy is never cut short
        assert_eq!(p.len() % 2500, 0);
    }

    #[test]
    fn notes_after_capped_loop_still_parse() {
        let p = parse("[[[c]99]99]99 d");
        assert_eq!(p.notes.last().map(|n| n.pitch), Some(Pitch::D));
        assert!(p.len() <= MAX_PATTERN_NOTES + 1);
    }

    #[test]
    fn unmatched_loop_start_plays_once() {
        let p = parse("[c d");
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn stray_loop_end_ignored() {
        assert_eq!(parse("c ]4 d").len(), 2);
    }

    #[test]
    fn dotted_note() {
        let p = parse("c4.");
        assert_eq!(p.notes[0].dots, 1);
        assert_eq!(p.notes[0].duration_ticks(), 720);
    }

    #[test]
    fn length_override_does_not_change_default() {
        let p = parse("l8 c16 d");
        assert_eq!(p.notes[0].length, 16);
        assert_eq!(p.notes[1].length, 8);
    }

    #[test]
    fn zero_length_ignored() {
        let p = parse("l8 l0 c0");
        assert_eq!(p.notes[0].length, 8);
    }

    #[test]
    fn sharps_and_flats() {
        let p = parse("c+ c# e-");
        assert_eq!(midi(&p), vec![Some(61), Some(61), Some(63)]);
    }

    #[test]
    fn tie_flag() {
        let p = parse("c4&c4");
        assert_eq!(p.len(), 2);
        assert!(p.notes[0].tied);
        assert!(!p.notes[1].tied);
        assert_eq!(p.events().len(), 1);
    }

    #[test]
    fn octave_commands_saturate() {
        let p = parse("o12 c o0 < c o8 > > c");
        assert_eq!(p.notes[0].octave, 8);
        assert_eq!(p.notes[1].octave, 0);
        assert_eq!(p.notes[2].octave, 8);
    }

    #[test]
    fn octave_steps() {
        let p = parse("o4 c > c < < c");
        let octaves: Vec<u8> = p.notes.iter().map(|n| n.octave).collect();
        assert_eq!(octaves, vec![4, 5, 3]);
    }

    #[test]
    fn volume_clamped_and_scaled() {
        let p = parse("v99 c v0 d v15 e");
        let velocities: Vec<u8> = p.notes.iter().map(|n| n.velocity).collect();
        assert_eq!(velocities, vec![127, 0, 127]);
    }

    #[test]
    fn tempo_clamped_on_pattern() {
        assert_eq!(parse("t10 c").tempo(), 40);
        assert_eq!(parse("t500 c").tempo(), 300);
    }

    #[test]
    fn last_tempo_wins() {
        assert_eq!(parse("t100 c t140 d").tempo(), 140);
    }

    #[test]
    fn malformed_arguments_keep_defaults() {
        let p = parse("o c lx d");
        assert!(p.notes.iter().all(|n| n.octave == 4 && n.length == 4));
    }

    #[test]
    fn rests_are_notes_without_pitch() {
        let p = parse("c r8 d");
        assert_eq!(p.len(), 3);
        assert!(p.notes[1].is_rest());
        assert_eq!(p.notes[1].length, 8);
    }

    #[test]
    fn bars_computed() {
        assert_eq!(parse("l4 c d e f").bars, 1);
        assert_eq!(parse("l4 c d e f g").bars, 2);
        assert_eq!(parse("").bars, 0);
    }

    #[test]
    fn comments_ignored() {
        let p = parse("c d ; e f g\n a");
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn named_pattern() {
        assert_eq!(parse_named("c", "lead").name, "lead");
    }
}
