//! Conservative JavaScript minification.
//!
//! Comments and redundant whitespace are removed; every literal (strings,
//! templates, regular expressions) is copied unchanged, and line breaks are
//! kept so automatic semicolon insertion behaves exactly as before.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinifyError {
    pub message: String,
    /// 1-based.
    pub line:    usize,
    /// 1-based.
    pub column:  usize,
}
impl fmt::Display for MinifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {} col {}", self.message, self.line, self.column)
    }
}
impl std::error::Error for MinifyError {}

pub trait Minifier: Sync {
    fn minify(&self, source: &str) -> Result<String, MinifyError>;
}

/// The built-in minifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct Condenser;
impl Minifier for Condenser {
    fn minify(&self, source: &str) -> Result<String, MinifyError> {
        Scanner::new(source).run()
    }
}

const REGEX_KEYWORDS: &[&str] = &[
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

// A `/` right after the closing paren of these headers starts a regex.
const CONTROL_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

#[derive(Clone, PartialEq, Eq)]
enum Previous {
    Start,
    Word(String),
    Punct(char, bool),
    HeaderEnd,
    Literal,
}

fn is_word(c: char) -> bool { c.is_alphanumeric() || c == '_' || c == '$' || c == '\\' || !c.is_ascii() }

fn is_line_break(c: char) -> bool { matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}') }

fn needs_space(before: char, after: char) -> bool {
    (is_word(before) && is_word(after))
        || (before == after && (before == '+' || before == '-'))
        || before == '/'
        || after == '/'
        || (before.is_ascii_digit() && after == '.')
        || (before == '<' && after == '!')
        || (before == '-' && after == '>')
}

struct Scanner {
    chars:    Vec<char>,
    output:   String,
    previous: Previous,
    parens:   Vec<bool>,
}
impl Scanner {
    fn new(source: &str) -> Self {
        Scanner {
            chars:    source.chars().collect(),
            output:   String::with_capacity(source.len()),
            previous: Previous::Start,
            parens:   Vec::new(),
        }
    }

    fn error(&self, message: &str, index: usize) -> MinifyError {
        let before = &self.chars[..index.min(self.chars.len())];
        let line = before.iter().filter(|c| **c == '\n').count() + 1;
        let column = index - before.iter().rposition(|c| *c == '\n').map(|p| p + 1).unwrap_or(0) + 1;
        MinifyError {
            message: message.to_string(),
            line,
            column,
        }
    }

    fn at(&self, index: usize) -> Option<char> { self.chars.get(index).copied() }

    fn regex_allowed(&self) -> bool {
        match &self.previous {
            Previous::Start | Previous::HeaderEnd => true,
            Previous::Word(word) => REGEX_KEYWORDS.contains(&word.as_str()),
            Previous::Punct(c, doubled) => {
                !matches!(c, ')' | ']') && !(*doubled && matches!(c, '+' | '-'))
            }
            Previous::Literal => false,
        }
    }

    fn scan_string(&self, start: usize) -> Result<usize, MinifyError> {
        let quote = self.chars[start];
        let mut i = start + 1;
        loop {
            match self.at(i) {
                None => return Err(self.error("Unterminated string constant", start)),
                Some('\\') => i += 2,
                Some(c) if c == quote => return Ok(i + 1),
                Some(c) if is_line_break(c) => {
                    return Err(self.error("Unterminated string constant", start))
                }
                Some(_) => i += 1,
            }
        }
    }

    fn scan_template(&self, start: usize) -> Result<usize, MinifyError> {
        let mut i = start + 1;
        loop {
            match self.at(i) {
                None => return Err(self.error("Unterminated template", start)),
                Some('\\') => i += 2,
                Some('`') => return Ok(i + 1),
                Some('$') if self.at(i + 1) == Some('{') => i = self.scan_braced(i + 2)?,
                Some(_) => i += 1,
            }
        }
    }

    /// Skip a template substitution up to and including its closing brace.
    fn scan_braced(&self, start: usize) -> Result<usize, MinifyError> {
        let mut depth = 1;
        let mut i = start;
        loop {
            match self.at(i) {
                None => return Err(self.error("Unterminated template substitution", start)),
                Some('{') => {
                    depth += 1;
                    i += 1;
                }
                Some('}') => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                Some('\'') | Some('"') => i = self.scan_string(i)?,
                Some('`') => i = self.scan_template(i)?,
                Some('/') if self.at(i + 1) == Some('/') => i = self.skip_line_comment(i),
                Some('/') if self.at(i + 1) == Some('*') => i = self.skip_block_comment(i)?.0,
                Some(_) => i += 1,
            }
        }
    }

    fn scan_regex(&self, start: usize) -> Result<usize, MinifyError> {
        let mut i = start + 1;
        let mut in_class = false;
        loop {
            match self.at(i) {
                None => return Err(self.error("Unterminated regular expression", start)),
                Some(c) if is_line_break(c) => {
                    return Err(self.error("Unterminated regular expression", start))
                }
                Some('\\') => i += 2,
                Some('[') => {
                    in_class = true;
                    i += 1;
                }
                Some(']') => {
                    in_class = false;
                    i += 1;
                }
                Some('/') if !in_class => {
                    i += 1;
                    while self.at(i).map(is_word).unwrap_or(false) {
                        i += 1;
                    }
                    return Ok(i);
                }
                Some(_) => i += 1,
            }
        }
    }

    fn skip_line_comment(&self, start: usize) -> usize {
        let mut i = start;
        while self.at(i).map(|c| !is_line_break(c)).unwrap_or(false) {
            i += 1;
        }
        i
    }

    /// Returns the index after the comment and whether it spans lines.
    fn skip_block_comment(&self, start: usize) -> Result<(usize, bool), MinifyError> {
        let mut i = start + 2;
        let mut multiline = false;
        loop {
            match self.at(i) {
                None => return Err(self.error("Unterminated comment", start)),
                Some('*') if self.at(i + 1) == Some('/') => return Ok((i + 2, multiline)),
                Some(c) => {
                    multiline |= is_line_break(c);
                    i += 1;
                }
            }
        }
    }

    fn emit(&mut self, gap: Gap, start: usize, end: usize) {
        if let (Some(before), Some(after)) = (self.output.chars().last(), self.at(start)) {
            match gap {
                Gap::Newline => self.output.push('\n'),
                Gap::Space if needs_space(before, after) => self.output.push(' '),
                _ => {}
            }
        }
        self.output.extend(&self.chars[start..end]);
    }

    fn run(mut self) -> Result<String, MinifyError> {
        let mut i = 0;
        let mut gap = Gap::None;
        if self.at(0) == Some('#') && self.at(1) == Some('!') {
            i = self.skip_line_comment(0);
            self.emit(Gap::None, 0, i);
        }
        while let Some(c) = self.at(i) {
            if is_line_break(c) {
                gap = Gap::Newline;
                i += 1;
                continue;
            }
            if c.is_whitespace() || c == '\u{feff}' {
                gap = gap.max(Gap::Space);
                i += 1;
                continue;
            }
            let next = self.at(i + 1);
            if c == '/' && next == Some('/') {
                gap = gap.max(Gap::Space);
                i = self.skip_line_comment(i);
                continue;
            }
            if c == '/' && next == Some('*') {
                let (end, multiline) = self.skip_block_comment(i)?;
                gap = gap.max(if multiline { Gap::Newline } else { Gap::Space });
                i = end;
                continue;
            }
            let start = i;
            let previous = match c {
                '\'' | '"' => {
                    i = self.scan_string(i)?;
                    Previous::Literal
                }
                '`' => {
                    i = self.scan_template(i)?;
                    Previous::Literal
                }
                '/' if self.regex_allowed() => {
                    i = self.scan_regex(i)?;
                    Previous::Literal
                }
                c if is_word(c) => {
                    while self.at(i).map(is_word).unwrap_or(false) {
                        i += if self.at(i) == Some('\\') { 2 } else { 1 };
                    }
                    i = i.min(self.chars.len());
                    Previous::Word(self.chars[start..i].iter().collect())
                }
                '(' => {
                    i += 1;
                    let header = matches!(
                        &self.previous,
                        Previous::Word(word) if CONTROL_KEYWORDS.contains(&word.as_str())
                    );
                    self.parens.push(header);
                    Previous::Punct('(', false)
                }
                ')' => {
                    i += 1;
                    if self.parens.pop().unwrap_or(false) {
                        Previous::HeaderEnd
                    } else {
                        Previous::Punct(')', false)
                    }
                }
                c => {
                    i += 1;
                    let doubled = gap == Gap::None && self.previous == Previous::Punct(c, false);
                    Previous::Punct(c, doubled)
                }
            };
            self.emit(gap, start, i.min(self.chars.len()));
            self.previous = previous;
            gap = Gap::None;
        }
        if gap == Gap::Newline && !self.output.is_empty() {
            self.output.push('\n');
        }
        Ok(self.output)
    }
}
