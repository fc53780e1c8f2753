// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// CommandLine
// ---------------------------------------------------------------------------

/// A command line: one raw escaped string, or a discrete argument list.
///
/// Every value is backed by exactly one of the two representations. A
/// raw-backed value tokenizes into its argument list lazily, on first
/// access, and memoizes the result; a list-backed value renders to a
/// single string via [`fmt::Display`] using the inverse quoting rules.
///
/// Two values compare equal when their materialized argument lists are
/// equal, regardless of which representation backs them.
#[derive(Debug, Clone)]
pub struct CommandLine {
    repr: Repr,
}

#[derive(Debug, Clone)]
enum Repr {
    /// Raw escaped line; the split form is derived at most once.
    Raw {
        line: String,
        split: OnceLock<Vec<String>>,
    },
    List(Vec<String>),
}

impl CommandLine {
    /// The distinguished zero-argument command line.
    pub fn empty() -> Self {
        Self {
            repr: Repr::List(Vec::new()),
        }
    }

    /// Wrap a raw escaped command-line string.
    ///
    /// A zero-length line yields [`CommandLine::empty`]; anything else is
    /// kept verbatim and split lazily with [`tokenize`].
    pub fn parse(line: impl Into<String>) -> Self {
        let line = line.into();
        if line.is_empty() {
            return Self::empty();
        }
        Self {
            repr: Repr::Raw {
                line,
                split: OnceLock::new(),
            },
        }
    }

    /// Build a command line from a discrete argument list.
    pub fn from_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            repr: Repr::List(items.into_iter().map(Into::into).collect()),
        }
    }

    /// The materialized argument list.
    ///
    /// For raw-backed values the list is tokenized on the first call and
    /// reused afterwards.
    pub fn args(&self) -> &[String] {
        match &self.repr {
            Repr::Raw { line, split } => split.get_or_init(|| tokenize(line)),
            Repr::List(items) => items,
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args().len()
    }

    /// `true` when the command line has no arguments.
    pub fn is_empty(&self) -> bool {
        self.args().is_empty()
    }

    /// Iterate over the arguments in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.args().iter()
    }
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for CommandLine {
    fn eq(&self, other: &Self) -> bool {
        self.args() == other.args()
    }
}

impl Eq for CommandLine {}

impl From<Vec<String>> for CommandLine {
    fn from(items: Vec<String>) -> Self {
        Self {
            repr: Repr::List(items),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for CommandLine {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_list(iter)
    }
}

impl<'a> IntoIterator for &'a CommandLine {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for CommandLine {
    /// Raw-backed values print verbatim; list-backed values are rendered
    /// with the inverse quoting rules so that re-parsing reproduces the
    /// same list.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Raw { line, .. } => f.write_str(line),
            Repr::List(items) => {
                let mut out = String::new();
                for (i, arg) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    quote_into(arg, &mut out);
                }
                f.write_str(&out)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Split a raw command line into arguments using classical argv rules.
///
/// - Runs of space/tab separate arguments.
/// - A run of `n` backslashes before a quote collapses to `n/2` literal
///   backslashes; an odd run additionally emits one literal quote which
///   does not toggle quoting state. Backslashes not followed by a quote
///   are literal.
/// - A quote toggles the in-quotes flag, except a doubled quote inside
///   quotes, which emits one literal quote and stays inside quotes.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(' ' | '\t')) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut arg = String::new();
        let mut in_quotes = false;
        loop {
            match chars.peek() {
                None => break,
                Some(' ' | '\t') if !in_quotes => break,
                Some('\\') => {
                    let mut run = 0usize;
                    while matches!(chars.peek(), Some('\\')) {
                        chars.next();
                        run += 1;
                    }
                    if matches!(chars.peek(), Some('"')) {
                        for _ in 0..run / 2 {
                            arg.push('\\');
                        }
                        if run % 2 == 1 {
                            // Escaped quote: literal, no state toggle.
                            arg.push('"');
                            chars.next();
                        }
                    } else {
                        for _ in 0..run {
                            arg.push('\\');
                        }
                    }
                }
                Some('"') => {
                    chars.next();
                    if in_quotes && matches!(chars.peek(), Some('"')) {
                        // Doubled quote inside quotes: one literal quote.
                        arg.push('"');
                        chars.next();
                    } else {
                        in_quotes = !in_quotes;
                    }
                }
                Some(&c) => {
                    arg.push(c);
                    chars.next();
                }
            }
        }
        args.push(arg);
    }

    args
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// Append `arg` to `out`, quoted so that [`tokenize`] recovers it exactly.
///
/// Arguments without spaces, tabs, or quotes pass through verbatim
/// (backslashes are only special before a quote). Everything else is
/// wrapped in quotes: `n` pending backslashes become `2n+1` before an
/// embedded quote and `2n` before the closing quote.
fn quote_into(arg: &str, out: &mut String) {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        out.push_str(arg);
        return;
    }

    out.push('"');
    let mut backslashes = 0usize;
    for ch in arg.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                for _ in 0..backslashes * 2 + 1 {
                    out.push('\\');
                }
                backslashes = 0;
                out.push('"');
            }
            _ => {
                for _ in 0..backslashes {
                    out.push('\\');
                }
                backslashes = 0;
                out.push(ch);
            }
        }
    }
    for _ in 0..backslashes * 2 {
        out.push('\\');
    }
    out.push('"');
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
