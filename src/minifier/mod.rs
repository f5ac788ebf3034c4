//! Lexical minifier for worker programs
//!
//! Compacts JavaScript source text without renaming identifiers or restructuring
//! control flow. The work happens in two passes:
//!
//! 1. [`segment`] splits the text into string, template and regex literals (kept
//!    verbatim) and plain code runs, dropping comments on the way.
//! 2. [`rewrite`] compacts each plain code run: whitespace is removed unless it
//!    separates two words, a `+ +`/`- -` pair or a line that depends on automatic
//!    semicolon insertion; `;` before `}` is dropped; `true`/`false` become
//!    `!0`/`!1`.
//!
//! The output evaluates exactly like the input, and minifying already minified
//! text returns it unchanged.

mod rewrite;
mod segment;

use std::fmt;
use thiserror::Error;

use rewrite::Rewriter;
use segment::Segment;

/// Kind of literal that was left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Template,
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralKind::String => f.write_str("string"),
            LiteralKind::Template => f.write_str("template"),
        }
    }
}

/// Errors raised when the input cannot be segmented safely
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MinifyError {
    #[error("unterminated {kind} literal starting at byte {offset}")]
    UnterminatedLiteral { kind: LiteralKind, offset: usize },

    #[error("unterminated block comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },
}

/// Result type for minification
pub type MinifyResult<T> = Result<T, MinifyError>;

/// Minify JavaScript source text.
pub fn minify(source: &str) -> MinifyResult<String> {
    let segments = segment::split(source)?;
    let mut rewriter = Rewriter::with_capacity(source.len());

    for (idx, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Literal(text) => rewriter.push_literal(text),
            Segment::Code(code) => {
                let next = segments.get(idx + 1).and_then(Segment::first_char);
                rewriter.push_code(code, next);
            }
        }
    }

    Ok(rewriter.finish())
}
