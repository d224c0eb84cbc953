//! Lexer for MML (Music Macro Language) text.
//!
//! Scanning is permissive: characters that do not start a token are skipped,
//! and commands whose numeric argument is missing or out of `u32` range emit
//! nothing. [`Lexer::tokenize`] therefore never fails.

use super::note::Pitch;
use super::token::{Token, TokenKind};

/// Repeat count used by `]` when no number follows it.
pub const DEFAULT_LOOP_COUNT: u32 = 2;

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Scan the whole source into a best-effort token stream.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            let ch = self.peek();
            let line = self.line;
            let col = self.col;

            let kind = match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                    None
                }
                ';' => {
                    self.skip_comment();
                    None
                }
                '>' => self.single_char(TokenKind::OctaveUp),
                '<' => self.single_char(TokenKind::OctaveDown),
                '+' | '#' => self.single_char(TokenKind::Sharp),
                '-' => self.single_char(TokenKind::Flat),
                '.' => self.single_char(TokenKind::Dot),
                '&' => self.single_char(TokenKind::Tie),
                '[' => self.single_char(TokenKind::LoopStart),
                ']' => {
                    self.advance();
                    let count = self.lex_digits().unwrap_or(DEFAULT_LOOP_COUNT);
                    Some(TokenKind::LoopEnd(count))
                }
                '0'..='9' => self.lex_digits().map(TokenKind::Number),
                _ => self.lex_letter(ch),
            };

            if let Some(kind) = kind {
                tokens.push(Token { kind, line, col });
            }
        }

        tokens
    }

    fn lex_letter(&mut self, ch: char) -> Option<TokenKind> {
        let lower = ch.to_ascii_lowercase();
        if let Some(pitch) = Pitch::from_letter(lower) {
            self.advance();
            return Some(TokenKind::Note(pitch));
        }

        let command: fn(u32) -> TokenKind = match lower {
            'r' => {
                self.advance();
                return Some(TokenKind::Rest);
            }
            'o' => TokenKind::Octave,
            'l' => TokenKind::Length,
            't' => TokenKind::Tempo,
            'v' => TokenKind::Volume,
            _ => {
                // Unknown character.
                self.advance();
                return None;
            }
        };

        self.advance();
        self.lex_digits().map(command)
    }

    /// Consume a run of ASCII digits. Returns `None` when there are none or
    /// the value does not fit in a `u32`.
    fn lex_digits(&mut self) -> Option<u32> {
        let start = self.pos;
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }
        if start == self.pos {
            return None;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits.parse().ok()
    }

    fn single_char(&mut self, kind: TokenKind) -> Option<TokenKind> {
        self.advance();
        Some(kind)
    }

    fn skip_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source() {
        assert!(kinds("").is_empty());
        assert!(kinds("   \n\t ").is_empty());
    }

    #[test]
    fn notes_are_case_insensitive() {
        assert_eq!(
            kinds("cD e"),
            vec![
                TokenKind::Note(Pitch::C),
                TokenKind::Note(Pitch::D),
                TokenKind::Note(Pitch::E),
            ]
        );
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            kinds("t140 o5 l16 v10"),
            vec![
                TokenKind::Tempo(140),
                TokenKind::Octave(5),
                TokenKind::Length(16),
                TokenKind::Volume(10),
            ]
        );
    }

    #[test]
    fn command_without_argument_is_dropped() {
        assert_eq!(kinds("o c"), vec![TokenKind::Note(Pitch::C)]);
        assert_eq!(kinds("lt"), Vec::<TokenKind>::new());
    }

    #[test]
    fn oversized_argument_is_dropped() {
        assert_eq!(kinds("t99999999999 c"), vec![TokenKind::Note(Pitch::C)]);
    }

    #[test]
    fn modifiers() {
        assert_eq!(
            kinds("c+8.&d-#"),
            vec![
                TokenKind::Note(Pitch::C),
                TokenKind::Sharp,
                TokenKind::Number(8),
                TokenKind::Dot,
                TokenKind::Tie,
                TokenKind::Note(Pitch::D),
                TokenKind::Flat,
                TokenKind::Sharp,
            ]
        );
    }

    #[test]
    fn loop_end_default_count() {
        assert_eq!(
            kinds("[c]"),
            vec![
                TokenKind::LoopStart,
                TokenKind::Note(Pitch::C),
                TokenKind::LoopEnd(DEFAULT_LOOP_COUNT),
            ]
        );
        assert_eq!(kinds("]4"), vec![TokenKind::LoopEnd(4)]);
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        assert_eq!(
            kinds("c ; d e f\ng"),
            vec![TokenKind::Note(Pitch::C), TokenKind::Note(Pitch::G)]
        );
    }

    #[test]
    fn unknown_characters_skipped() {
        assert_eq!(
            kinds("c ! z @ |d"),
            vec![TokenKind::Note(Pitch::C), TokenKind::Note(Pitch::D)]
        );
    }

    #[test]
    fn octave_steps_and_rest() {
        assert_eq!(
            kinds("> r <"),
            vec![TokenKind::OctaveUp, TokenKind::Rest, TokenKind::OctaveDown]
        );
    }

    #[test]
    fn positions_tracked() {
        let tokens = Lexer::new("c\n  d").tokenize();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    }
}
