//! User functions and their dependencies

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::thread::{ThreadError, ThreadResult};

lazy_static! {
    /// `function name(`, `async function(`, `function* gen(`
    static ref FUNCTION_HEAD: Regex =
        Regex::new(r"^(?:async\s+)?function\b\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)?\s*\(")
            .unwrap_or_else(|e| panic!("invalid function pattern: {}", e));
    /// `x =>`, `async x =>`
    static ref ARROW_IDENT_HEAD: Regex =
        Regex::new(r"^(?:async\s+)?[A-Za-z_$][A-Za-z0-9_$]*\s*=>")
            .unwrap_or_else(|e| panic!("invalid arrow pattern: {}", e));
    /// `(a, b) =>`, `async (a) =>`, the parameter list is matched separately
    static ref ARROW_PARENS_HEAD: Regex =
        Regex::new(r"^(?:async\s*)?\(")
            .unwrap_or_else(|e| panic!("invalid arrow pattern: {}", e));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function` expression or declaration, including async and generator forms
    Function,
    /// Arrow function
    Arrow,
}

/// JavaScript source text of a single function.
///
/// Only the outer shape is checked: a `function` or arrow head followed by a
/// non-empty body. The text itself is evaluated by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFunction {
    source: String,
    kind: FunctionKind,
    name: Option<String>,
    body: (usize, usize),
}

impl ScriptFunction {
    pub fn parse(source: impl Into<String>) -> ThreadResult<Self> {
        let source = source.into().trim().to_string();

        let (kind, name, body) = if let Some(caps) = FUNCTION_HEAD.captures(&source) {
            let open = caps.get(0).map(|m| m.end() - 1).unwrap_or(0);
            let name = caps.get(1).map(|m| m.as_str().to_string());
            let close = closing_paren(&source, open)
                .ok_or_else(|| malformed("unbalanced parameter list"))?;
            (FunctionKind::Function, name, block_body(&source, close + 1)?)
        } else if let Some(head) = ARROW_IDENT_HEAD.find(&source) {
            (FunctionKind::Arrow, None, arrow_body(&source, head.end())?)
        } else if let Some(head) = ARROW_PARENS_HEAD.find(&source) {
            let close = closing_paren(&source, head.end() - 1)
                .ok_or_else(|| malformed("unbalanced parameter list"))?;
            let rest = &source[close + 1..];
            let arrow = rest.trim_start();
            if !arrow.starts_with("=>") {
                return Err(malformed("source is not a function"));
            }
            let arrow_end = source.len() - arrow.len() + 2;
            (FunctionKind::Arrow, None, arrow_body(&source, arrow_end)?)
        } else {
            return Err(malformed("source is not a function"));
        };

        if source[body.0..body.1].trim().is_empty() {
            return Err(ThreadError::Construction(
                "the function body is empty".to_string(),
            ));
        }

        Ok(Self {
            source,
            kind,
            name,
            body,
        })
    }

    /// Full source text, trimmed
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Text between the braces, or the expression of a concise arrow body
    pub fn body(&self) -> &str {
        &self.source[self.body.0..self.body.1]
    }

    /// A named `function` declaration can be inlined as a global of the worker.
    pub fn is_named_declaration(&self) -> bool {
        self.kind == FunctionKind::Function && self.name.is_some()
    }
}

impl FromStr for ScriptFunction {
    type Err = ThreadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn malformed(reason: &str) -> ThreadError {
    ThreadError::Construction(format!("invalid function: {}", reason))
}

/// Byte offset of the `)` matching the `(` at `open`
fn closing_paren(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Range of a `{ ... }` body starting at or after `from`
fn block_body(source: &str, from: usize) -> ThreadResult<(usize, usize)> {
    let rest = &source[from..];
    let trimmed = rest.trim_start();
    if !trimmed.starts_with('{') || !source.ends_with('}') {
        return Err(malformed("missing function body"));
    }
    let start = source.len() - trimmed.len() + 1;
    let end = source.len() - 1;
    if start > end {
        return Err(malformed("missing function body"));
    }
    Ok((start, end))
}

/// Range of an arrow body; `from` points just past `=>`
fn arrow_body(source: &str, from: usize) -> ThreadResult<(usize, usize)> {
    let rest = source[from..].trim_start();
    if rest.starts_with('{') {
        return block_body(source, from);
    }
    let start = source.len() - rest.len();
    Ok((start, source.len()))
}

/// Something the worker program needs before the user function runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// Named function declaration, inlined into the program
    Local(ScriptFunction),
    /// Script path or URL, loaded with `importScripts` at startup
    Remote(String),
}

impl From<ScriptFunction> for Dependency {
    fn from(function: ScriptFunction) -> Self {
        Dependency::Local(function)
    }
}

impl From<&str> for Dependency {
    fn from(path: &str) -> Self {
        Dependency::Remote(path.to_string())
    }
}

impl From<String> for Dependency {
    fn from(path: String) -> Self {
        Dependency::Remote(path)
    }
}

/// Everything needed to build a thread: the user function and its dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSpec {
    pub function: ScriptFunction,
    pub dependencies: Vec<Dependency>,
}

impl ThreadSpec {
    pub fn new(function: ScriptFunction) -> Self {
        Self {
            function,
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency
    pub fn require(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }
}

impl From<ScriptFunction> for ThreadSpec {
    fn from(function: ScriptFunction) -> Self {
        Self::new(function)
    }
}

impl From<(Vec<Dependency>, ScriptFunction)> for ThreadSpec {
    fn from((dependencies, function): (Vec<Dependency>, ScriptFunction)) -> Self {
        Self {
            function,
            dependencies,
        }
    }
}
