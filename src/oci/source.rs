//! Source text preparation
//!
//! Everything here runs before lexing. Comments are blanked out without moving
//! any other character, so byte offsets, lines and columns computed on the
//! cleaned text stay valid for the text the user wrote.
//!
//! The cleaned text is ASCII once [`validate_ascii`] accepts it, which makes
//! byte offsets into it equal to character offsets into the original.

use std::ops::Range;

use crate::oci::error::ParseError;

/// Blank out `//`, `#` and `/* */` comments.
///
/// Each comment character becomes a single space except `\r` and `\n`, which are
/// kept so that line structure never changes. The result has exactly as many
/// characters as the input. Comment markers inside single-quoted literals are
/// left alone, and a `/*` without a matching `*/` is not a comment.
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_quote = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if in_quote {
            out.push(ch);
            match ch {
                '\\' if i + 1 < chars.len() && !is_line_break(chars[i + 1]) => {
                    out.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                '\'' | '\r' | '\n' => in_quote = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        match (ch, next) {
            ('\'', _) => {
                in_quote = true;
                out.push(ch);
                i += 1;
            }
            ('#', _) | ('/', Some('/')) => {
                while i < chars.len() && !is_line_break(chars[i]) {
                    out.push(' ');
                    i += 1;
                }
            }
            ('/', Some('*')) => match find_block_end(&chars, i + 2) {
                Some(close) => {
                    // `close` is the index of the '*' in "*/"
                    for &c in &chars[i..close + 2] {
                        out.push(if is_line_break(c) { c } else { ' ' });
                    }
                    i = close + 2;
                }
                None => {
                    out.push(ch);
                    i += 1;
                }
            },
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    out
}

fn is_line_break(ch: char) -> bool {
    ch == '\n' || ch == '\r'
}

fn find_block_end(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(1)).find(|&j| chars[j] == '*' && chars[j + 1] == '/')
}

/// Reject any character outside tab, CR, LF and 0x20..=0x7E.
pub fn validate_ascii(cleaned: &str) -> Result<(), ParseError> {
    match cleaned
        .chars()
        .enumerate()
        .find(|(_, ch)| !matches!(ch, '\t' | '\r' | '\n' | ' '..='~'))
    {
        Some((index, character)) => Err(ParseError::InvalidCharacter {
            position: index + 1,
            character,
        }),
        None => Ok(()),
    }
}

/// Line/column lookup over a text.
///
/// Lines are 1-based and columns 0-based. Only `\n` starts a new line; a
/// trailing `\r` is dropped when a line's text is requested.
pub struct SourceLocation<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceLocation<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (byte_pos, ch) in text.char_indices() {
            if ch == '\n' {
                line_starts.push(byte_pos + 1);
            }
        }
        Self { text, line_starts }
    }

    /// Convert a byte offset to `(line, column)`.
    pub fn position(&self, byte_offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .binary_search(&byte_offset)
            .unwrap_or_else(|i| i - 1);
        (line + 1, byte_offset - self.line_starts[line])
    }

    /// Text of a 1-based line without its terminator.
    pub fn line_text(&self, line: usize) -> Option<&'a str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let raw = self.text.get(start..end)?;
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Exact substring covered by a byte range, empty when out of bounds.
    pub fn slice(&self, range: &Range<usize>) -> &'a str {
        self.text.get(range.clone()).unwrap_or("")
    }
}

/// One matching rule cut out of a multi-rule input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChunk {
    /// The rule text, trimmed.
    pub text: String,
    /// Byte offset of `text` inside the input it was cut from.
    pub offset: usize,
}

/// Split matching rules at line breaks that sit outside braces and quotes.
///
/// `\r\n` counts as a single break. Chunks are trimmed and empty chunks are
/// dropped. An unbalanced `}` never drives the depth below zero.
pub fn split_rules(text: &str) -> Vec<RuleChunk> {
    let bytes = text.as_bytes();
    let mut chunks = Vec::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if in_str {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'\'' {
                in_str = false;
            }
            i += 1;
            continue;
        }

        match b {
            b'\'' => in_str = true,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'\n' | b'\r' if depth == 0 => {
                push_chunk(&mut chunks, text, start, i);
                i += if b == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    push_chunk(&mut chunks, text, start, bytes.len());

    chunks
}

fn push_chunk(chunks: &mut Vec<RuleChunk>, text: &str, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        let lead = raw.len() - raw.trim_start().len();
        chunks.push(RuleChunk {
            text: trimmed.to_string(),
            offset: start + lead,
        });
    }
}
