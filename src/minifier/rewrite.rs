//! Rewrite pass: compact plain code runs
//!
//! The rewriter sees code segments in order, with literal segments pushed
//! through in between, so whitespace decisions always know the real
//! neighbouring characters even across a string or regex boundary.

use super::segment::{CONTROL_WORDS, is_ident_char};

/// Words after which a line break terminates the statement.
const RESTRICTED_WORDS: &[&str] = &["return", "break", "continue", "throw", "yield"];

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub(crate) struct Rewriter {
    out: String,
    /// One entry per open `(`: whether it opened a control-statement head.
    parens: Vec<bool>,
    /// The last token emitted was the `)` closing a control-statement head.
    after_control_head: bool,
    /// The last token emitted, when it was a word.
    last_word: Option<String>,
}

impl Rewriter {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            parens: Vec::new(),
            after_control_head: false,
            last_word: None,
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }

    pub(crate) fn push_literal(&mut self, text: &str) {
        self.out.push_str(text);
        self.last_word = None;
        self.after_control_head = false;
    }

    /// Rewrite one code run. `next` is the first character of the segment
    /// that follows it, if any.
    pub(crate) fn push_code(&mut self, code: &str, next: Option<char>) {
        let chars: Vec<char> = code.chars().collect();
        let at = |idx: usize| chars.get(idx).copied();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c.is_whitespace() {
                let start = i;
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                let has_line_break = chars[start..i].iter().copied().any(is_line_break);
                let (n, n2) = match at(i) {
                    Some(n) => (Some(n), at(i + 1)),
                    None => (next, None),
                };
                if let Some(sep) = self.separator(has_line_break, n, n2) {
                    self.out.push(sep);
                }
                continue;
            }

            if is_ident_char(c) {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let following = chars[i..]
                    .iter()
                    .copied()
                    .find(|c| !c.is_whitespace())
                    .or(next);
                let following2 = {
                    let mut rest = chars[i..].iter().copied().filter(|c| !c.is_whitespace());
                    rest.next();
                    rest.next()
                };
                self.push_word(word, following, following2);
                continue;
            }

            if c == ';' {
                let following = chars[i + 1..]
                    .iter()
                    .copied()
                    .find(|c| !c.is_whitespace() && *c != ';');
                if following == Some('}') && !self.semicolon_is_statement() {
                    i += 1;
                    continue;
                }
            }

            self.push_punct(c);
            i += 1;
        }
    }

    fn push_word(&mut self, word: String, following: Option<char>, following2: Option<char>) {
        if let Some(short) = self.boolean_shorthand(&word, following, following2) {
            self.out.push_str(short);
            self.last_word = None;
            self.after_control_head = false;
            return;
        }

        self.out.push_str(&word);
        self.last_word = Some(word);
        self.after_control_head = false;
    }

    fn push_punct(&mut self, c: char) {
        match c {
            '(' => {
                let control = self
                    .last_word
                    .as_deref()
                    .is_some_and(|w| CONTROL_WORDS.contains(&w));
                self.parens.push(control);
                self.after_control_head = false;
            }
            ')' => {
                self.after_control_head = self.parens.pop().unwrap_or(false);
            }
            _ => self.after_control_head = false,
        }
        self.out.push(c);
        self.last_word = None;
    }

    /// `true`/`false` become `!0`/`!1` unless they are used as a property name
    /// or an operand where the shorter form would change the parse.
    fn boolean_shorthand(
        &self,
        word: &str,
        following: Option<char>,
        following2: Option<char>,
    ) -> Option<&'static str> {
        let short = match word {
            "true" => "!0",
            "false" => "!1",
            _ => return None,
        };

        let previous = self.out.chars().next_back();
        if previous == Some('.') {
            return None;
        }
        if matches!(following, Some('.') | Some('[')) {
            return None;
        }
        if following == Some('*') && following2 == Some('*') {
            return None;
        }
        if following == Some(':') && matches!(previous, Some('{') | Some(',')) {
            return None;
        }
        // Method names: `{ true() {} }`, `get false()`, `static true = 1`
        if following == Some('(') {
            return None;
        }
        if matches!(self.last_word.as_deref(), Some("get" | "set" | "static")) {
            return None;
        }
        Some(short)
    }

    /// A `;` directly after `if (...)`, `else`, `do` and friends is an empty
    /// statement and must survive even before a `}`.
    fn semicolon_is_statement(&self) -> bool {
        self.after_control_head
            || matches!(self.last_word.as_deref(), Some("else") | Some("do"))
    }

    /// Decide what a whitespace run between the already emitted text and `n`
    /// collapses to.
    fn separator(&self, has_line_break: bool, n: Option<char>, n2: Option<char>) -> Option<char> {
        let p = self.out.chars().next_back()?;
        let n = n?;

        if has_line_break
            && self
                .last_word
                .as_deref()
                .is_some_and(|w| RESTRICTED_WORDS.contains(&w))
            && !matches!(n, '}' | ';' | ')')
        {
            return Some('\n');
        }

        if is_ident_char(p) && is_ident_char(n) {
            return Some(if has_line_break { '\n' } else { ' ' });
        }

        if (p == '+' && n == '+') || (p == '-' && n == '-') {
            return Some(' ');
        }

        if p.is_ascii_digit() && n == '.' {
            return Some(' ');
        }

        if has_line_break && self.ends_expression(p) && starts_statement(n, n2) {
            return Some('\n');
        }

        None
    }

    fn ends_expression(&self, p: char) -> bool {
        if is_ident_char(p) || matches!(p, ')' | ']' | '}' | '"' | '\'' | '`' | '/') {
            return true;
        }
        self.out.ends_with("++") || self.out.ends_with("--")
    }
}

/// Characters that cannot continue the previous expression, so a line break
/// before them triggers automatic semicolon insertion.
fn starts_statement(n: char, n2: Option<char>) -> bool {
    is_ident_char(n)
        || matches!(n, '"' | '\'' | '`' | '!' | '~' | '{')
        || (n == '+' && n2 == Some('+'))
        || (n == '-' && n2 == Some('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(code: &str) -> String {
        let mut rewriter = Rewriter::with_capacity(code.len());
        rewriter.push_code(code, None);
        rewriter.finish()
    }

    #[test]
    fn test_keyword_spacing() {
        assert_eq!(rewrite("var   x = 1"), "var x=1");
        assert_eq!(rewrite("return   (x)"), "return(x)");
        assert_eq!(rewrite("typeof  x"), "typeof x");
        assert_eq!(rewrite("else {  }"), "else{}");
    }

    #[test]
    fn test_word_operators_keep_spaces() {
        assert_eq!(rewrite("a   instanceof   B"), "a instanceof B");
        assert_eq!(rewrite("k  in  obj"), "k in obj");
    }

    #[test]
    fn test_semicolon_before_brace() {
        assert_eq!(rewrite("{ a(); b(); }"), "{a();b()}");
        assert_eq!(rewrite("{ a();; \n }"), "{a()}");
    }

    #[test]
    fn test_empty_statement_semicolon_survives() {
        assert_eq!(rewrite("{ if (x) ; }"), "{if(x);}");
        assert_eq!(rewrite("{ while (i--) ; }"), "{while(i--);}");
        assert_eq!(rewrite("{ f(); }"), "{f()}");
    }

    #[test]
    fn test_booleans() {
        assert_eq!(rewrite("x = true; y = false"), "x=!0;y=!1");
        assert_eq!(rewrite("o.true"), "o.true");
        assert_eq!(rewrite("({ true: 1 })"), "({true:1})");
        assert_eq!(rewrite("true.toString()"), "true.toString()");
        assert_eq!(rewrite("istrue"), "istrue");
        assert_eq!(rewrite("({ true() { return 1; } })"), "({true(){return 1}})");
        assert_eq!(rewrite("({ get false () { return 0 } })"), "({get false(){return 0}})");
        assert_eq!(rewrite("class A { static true = 1 }"), "class A{static true=1}");
        assert_eq!(rewrite("x = f(true)"), "x=f(!0)");
    }

    #[test]
    fn test_unary_operators_not_merged() {
        assert_eq!(rewrite("a + +b"), "a+ +b");
        assert_eq!(rewrite("a - --b"), "a- --b");
        assert_eq!(rewrite("1 .toString()"), "1 .toString()");
    }

    #[test]
    fn test_line_breaks_needed_for_asi() {
        assert_eq!(rewrite("a = 1\nb = 2"), "a=1\nb=2");
        assert_eq!(rewrite("return\nx"), "return\nx");
        assert_eq!(rewrite("x = f(a)\n(b)"), "x=f(a)(b)");
        assert_eq!(rewrite("a\n++b"), "a\n++b");
        assert_eq!(rewrite("x = {\n a: 1\n}"), "x={a:1}");
    }

    #[test]
    fn test_trims_ends() {
        assert_eq!(rewrite("  \n x \n "), "x");
    }
}
