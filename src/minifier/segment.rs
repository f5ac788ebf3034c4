//! Segmentation pass: split source text into literals and plain code
//!
//! String, template and regular-expression literals are returned verbatim so
//! the rewrite pass never touches whitespace that is part of a value. Comments
//! are dropped here and replaced by the whitespace they stand for.

use super::{LiteralKind, MinifyError, MinifyResult};

/// A piece of source text produced by [`split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    /// Plain code, subject to the rewrite pass. Comments are already replaced.
    Code(String),
    /// A string, template or regex literal, copied through unchanged.
    Literal(&'a str),
}

impl Segment<'_> {
    pub(crate) fn first_char(&self) -> Option<char> {
        match self {
            Segment::Code(code) => code.chars().next(),
            Segment::Literal(text) => text.chars().next(),
        }
    }
}

/// Keywords after which a `/` starts a regular expression rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// Words whose parenthesised head ends where a new statement may begin.
pub(crate) const CONTROL_WORDS: &[&str] = &["if", "for", "while", "with"];

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '\\' || !c.is_ascii()
}

/// Follows parentheses across the plain code seen so far, to tell the `)` of
/// an `if (...)` head (a statement may follow) from any other `)`.
#[derive(Debug, Default)]
struct HeadTracker {
    /// One entry per open `(`: whether it opened a control-statement head.
    parens: Vec<bool>,
    word: String,
    in_word: bool,
    word_after_dot: bool,
    last: Option<char>,
    after_control_head: bool,
}

impl HeadTracker {
    fn feed(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.in_word = false;
                continue;
            }

            if is_ident_char(c) {
                if !self.in_word {
                    self.word.clear();
                    self.word_after_dot = self.last == Some('.');
                    self.in_word = true;
                }
                self.word.push(c);
                self.after_control_head = false;
            } else {
                self.in_word = false;
                match c {
                    '(' => {
                        let control = self.last.is_some_and(is_ident_char)
                            && !self.word_after_dot
                            && CONTROL_WORDS.contains(&self.word.as_str());
                        self.parens.push(control);
                        self.after_control_head = false;
                    }
                    ')' => self.after_control_head = self.parens.pop().unwrap_or(false),
                    _ => self.after_control_head = false,
                }
            }
            self.last = Some(c);
        }
    }

    fn literal(&mut self) {
        self.in_word = false;
        self.last = None;
        self.after_control_head = false;
    }
}

/// Split `source` into code and literal segments.
///
/// Adjacent code is always merged into one [`Segment::Code`], so two code
/// segments never follow each other.
pub(crate) fn split(source: &str) -> MinifyResult<Vec<Segment<'_>>> {
    let bytes = source.as_bytes();
    let mut segments = Vec::new();
    let mut code = String::new();
    let mut after_literal = false;
    let mut heads = HeadTracker::default();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let end = skip_string(bytes, i, quote)?;
                flush(&mut segments, &mut code);
                segments.push(Segment::Literal(&source[i..end]));
                heads.literal();
                after_literal = true;
                i = end;
            }
            b'`' => {
                let end = skip_template(bytes, i)?;
                flush(&mut segments, &mut code);
                segments.push(Segment::Literal(&source[i..end]));
                heads.literal();
                after_literal = true;
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                // Line comment: the terminating newline stays in the code.
                let mut end = i + 2;
                while end < bytes.len() && !is_line_break(bytes[end]) {
                    end += 1;
                }
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = source[i + 2..]
                    .find("*/")
                    .ok_or(MinifyError::UnterminatedComment { offset: i })?;
                let body = &source[i + 2..i + 2 + close];
                let gap = if body.bytes().any(is_line_break) { "\n" } else { " " };
                code.push_str(gap);
                heads.feed(gap);
                i = i + 2 + close + 2;
            }
            b'/' if regex_allowed(&code, after_literal, heads.after_control_head) => {
                match skip_regex(bytes, i) {
                    Some(end) => {
                        flush(&mut segments, &mut code);
                        segments.push(Segment::Literal(&source[i..end]));
                        heads.literal();
                        after_literal = true;
                        i = end;
                    }
                    None => {
                        code.push('/');
                        heads.feed("/");
                        i += 1;
                    }
                }
            }
            _ => {
                // Copy a run of non-delimiter text in one go, respecting UTF-8 boundaries.
                let start = i;
                while i < bytes.len() && !matches!(bytes[i], b'"' | b'\'' | b'`' | b'/') {
                    i += 1;
                }
                if i == start {
                    // A lone '/' that is a division operator.
                    code.push('/');
                    heads.feed("/");
                    i += 1;
                } else {
                    code.push_str(&source[start..i]);
                    heads.feed(&source[start..i]);
                }
            }
        }
    }

    flush(&mut segments, &mut code);
    Ok(segments)
}

fn flush<'a>(segments: &mut Vec<Segment<'a>>, code: &mut String) {
    if !code.is_empty() {
        segments.push(Segment::Code(std::mem::take(code)));
    }
}

fn is_line_break(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

/// Decide whether a `/` following `code` begins a regular expression literal.
fn regex_allowed(code: &str, after_literal: bool, after_control_head: bool) -> bool {
    let trimmed = code.trim_end();
    let Some(last) = trimmed.chars().next_back() else {
        // Nothing but whitespace since the last literal (or the start of input).
        return !after_literal;
    };

    if is_ident_char(last) {
        let word_start = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_ident_char(*c))
            .last()
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        return REGEX_PREFIX_KEYWORDS.contains(&&trimmed[word_start..]);
    }

    if trimmed.ends_with("++") || trimmed.ends_with("--") {
        return false;
    }

    match last {
        ')' => after_control_head,
        ']' => false,
        _ => true,
    }
}

/// Returns the byte offset just past the closing quote.
fn skip_string(bytes: &[u8], start: usize, quote: u8) -> MinifyResult<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Ok(i + 1),
            b'\n' => break,
            _ => i += 1,
        }
    }
    Err(MinifyError::UnterminatedLiteral {
        kind: LiteralKind::String,
        offset: start,
    })
}

/// Returns the byte offset just past the closing backtick, including nested
/// `${ ... }` substitutions.
fn skip_template(bytes: &[u8], start: usize) -> MinifyResult<usize> {
    let unterminated = MinifyError::UnterminatedLiteral {
        kind: LiteralKind::Template,
        offset: start,
    };
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Ok(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i += 2;
                let mut depth = 1usize;
                while depth > 0 {
                    let Some(&b) = bytes.get(i) else {
                        return Err(unterminated);
                    };
                    match b {
                        b'{' => {
                            depth += 1;
                            i += 1;
                        }
                        b'}' => {
                            depth -= 1;
                            i += 1;
                        }
                        b'"' | b'\'' => i = skip_string(bytes, i, b)?,
                        b'`' => i = skip_template(bytes, i)?,
                        _ => i += 1,
                    }
                }
            }
            _ => i += 1,
        }
    }

    Err(unterminated)
}

/// Returns the byte offset just past the flags of a regex literal starting at
/// `start`, or `None` when the slash does not open a well-formed literal on
/// this line.
fn skip_regex(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut in_class = false;

    loop {
        let b = *bytes.get(i)?;
        match b {
            b'\\' => {
                if bytes.get(i + 1).is_none_or(|&n| is_line_break(n)) {
                    return None;
                }
                i += 2;
                continue;
            }
            b'\n' | b'\r' => return None,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => break,
            _ => {}
        }
        i += 1;
    }

    if i == start + 1 {
        return None;
    }

    i += 1;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    Some(i)
}
