//! MML (Music Macro Language): text → tokens → [`Pattern`].
//!
//! ```text
//! notes     c d e f g a b      rest  r
//! octave    o4   >   <         length l8, or c16 after a note
//! tempo     t120               volume v0-v15
//! modifiers + # (sharp)  - (flat)  . (dot)  & (tie)
//! loops     [c d e f]4         comments ; to end of line
//! ```

pub mod lexer;
pub mod note;
pub mod parser;
pub mod token;

pub use lexer::Lexer;
pub use note::{Note, NoteEvent, Pattern, Pitch};
pub use parser::{parse, parse_named, Parser};
pub use token::{Token, TokenKind};
