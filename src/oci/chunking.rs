//! Statement-sized chunks for large policy files
//!
//! Very large inputs can be cut into chunks at lines that start a statement
//! and parsed one chunk at a time. Parsing the chunks and concatenating the
//! statements gives the same result as parsing the whole document, except
//! that spans, line numbers and statement indices are relative to each chunk.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::oci::api::{parse_policy_statements, PolicyOptions};
use crate::oci::ast::{Statement, StatementKind};
use crate::oci::diagnostics::Diagnostics;
use crate::oci::error::ParseError;
use crate::oci::filtering::ReturnFilter;
use crate::oci::parsing::ErrorMode;

static STATEMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(allow|define|admit|endorse|deny)\b").expect("valid statement regex")
});

static DEFINE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*define\b").expect("valid define regex"));

/// Groups lines into chunks, each starting at a statement line.
///
/// Lines are expected to keep their terminators; chunks are their plain
/// concatenation. Lines before the first statement are dropped.
pub struct PolicyChunks<I> {
    lines: I,
    buffer: String,
    seen_statement: bool,
    strip_bom: bool,
    first: bool,
}

/// Chunk an iterator of lines, see [`PolicyChunks`].
pub fn chunk_policy_lines<I, S>(lines: I) -> PolicyChunks<I::IntoIter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    PolicyChunks {
        lines: lines.into_iter(),
        buffer: String::new(),
        seen_statement: false,
        strip_bom: false,
        first: true,
    }
}

impl<I> PolicyChunks<I> {
    /// Drop a leading U+FEFF from the first line.
    pub fn strip_bom(mut self) -> Self {
        self.strip_bom = true;
        self
    }
}

impl<I, S> Iterator for PolicyChunks<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for line in self.lines.by_ref() {
            let mut line = line.as_ref();
            if self.first {
                self.first = false;
                if self.strip_bom {
                    line = line.trim_start_matches('\u{feff}');
                }
            }

            if !STATEMENT_LINE.is_match(line) {
                if self.seen_statement {
                    self.buffer.push_str(line);
                }
                continue;
            }

            let finished = self.seen_statement && !self.buffer.is_empty();
            let previous = std::mem::replace(&mut self.buffer, line.to_string());
            self.seen_statement = true;
            if finished {
                return Some(previous);
            }
        }

        if self.seen_statement && !self.buffer.is_empty() {
            return Some(std::mem::take(&mut self.buffer));
        }
        None
    }
}

/// True when a chunk starts with a `define` statement.
pub fn is_define_chunk(chunk: &str) -> bool {
    DEFINE_LINE.is_match(chunk)
}

/// Statements and diagnostics gathered over all chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkedOutput {
    pub statements: Vec<Statement>,
    /// The `define` statements among `statements`.
    pub defines: Vec<Statement>,
    /// `Some` in report mode.
    pub diagnostics: Option<Diagnostics>,
}

impl ChunkedOutput {
    pub fn error_count(&self) -> usize {
        self.diagnostics.as_ref().map_or(0, |d| d.error_count)
    }
}

/// Parse chunks one by one, handing each chunk's statements to `on_chunk`.
///
/// In raise mode the first failing chunk ends the run. With `symbols_only`,
/// chunks that do not start with `define` are skipped without parsing and
/// only `define` statements are kept.
pub fn parse_policy_chunks<I, S, F>(
    chunks: I,
    options: &PolicyOptions,
    symbols_only: bool,
    mut on_chunk: F,
) -> Result<ChunkedOutput, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&[Statement]) -> Result<(), ParseError>,
{
    let mut options = options.clone();
    if symbols_only {
        options.return_filter = Some(ReturnFilter::kind(StatementKind::Define.as_str()));
    }

    let mut out = ChunkedOutput {
        diagnostics: (options.error_mode == ErrorMode::Report).then(Diagnostics::default),
        ..ChunkedOutput::default()
    };

    for (index, chunk) in chunks.into_iter().enumerate() {
        let chunk = chunk.as_ref();
        if symbols_only && !is_define_chunk(chunk) {
            continue;
        }
        tracing::trace!(chunk = index + 1, bytes = chunk.len(), "parsing policy chunk");

        let parsed = parse_policy_statements(chunk, &options)?;
        if let (Some(total), Some(diagnostics)) = (out.diagnostics.as_mut(), parsed.diagnostics) {
            total.extend(diagnostics);
        }

        let statements = parsed.payload.statements;
        on_chunk(&statements)?;
        out.defines.extend(
            statements
                .iter()
                .filter(|s| s.kind == StatementKind::Define)
                .cloned(),
        );
        if !symbols_only {
            out.statements.extend(statements);
        }
    }

    Ok(out)
}
