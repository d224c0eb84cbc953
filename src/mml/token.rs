//! Token types for the MML lexer.

use super::note::Pitch;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// The kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Notes
    Note(Pitch),
    Rest,

    // Commands carrying a numeric argument
    Octave(u32),
    Length(u32),
    Tempo(u32),
    Volume(u32),

    OctaveUp,
    OctaveDown,

    // Note modifiers
    Sharp,
    Flat,
    Dot,
    Tie,
    Number(u32),

    // Loops
    LoopStart,
    LoopEnd(u32), // repeat count, defaults to 2
}

impl TokenKind {
    /// Whether this token folds into a preceding note.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            TokenKind::Sharp | TokenKind::Flat | TokenKind::Dot | TokenKind::Tie | TokenKind::Number(_)
        )
    }
}
