//! Best-effort source context for uncaught errors.
//!
//! Rendering maps a span to line/column and quotes the offending line
//! with a caret. The per-source line table is derived data; the engine
//! keeps it in an [`crate::cache::AuxCache`] so it lives exactly as long
//! as its script.

use rill_ir::Span;

/// Byte offsets of line starts, for span-to-position mapping.
#[derive(Debug)]
pub struct LineIndex {
    starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i as u32 + 1);
            }
        }
        LineIndex { starts }
    }

    /// One-based line and column of a byte offset.
    pub fn line_col(&self, offset: u32) -> (usize, usize) {
        let line = self
            .starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        (line + 1, (offset - self.starts[line]) as usize + 1)
    }

    /// Text of the one-based `line`, without its newline.
    pub fn line_text<'a>(&self, text: &'a str, line: usize) -> &'a str {
        let start = self.starts[line - 1] as usize;
        let end = self
            .starts
            .get(line)
            .map_or(text.len(), |&next| next as usize);
        text[start..end].trim_end_matches('\n')
    }
}

/// Render `message` at `span` with the quoted source line.
pub fn render(index: &LineIndex, source: &str, span: Option<Span>, message: &str) -> String {
    let Some(span) = span else {
        return format!("error: {message}");
    };
    let (line, col) = index.line_col(span.start);
    let text = index.line_text(source, line);
    let width = ((span.end - span.start) as usize).max(1);
    let avail = text.len().saturating_sub(col - 1).max(1);
    let caret_len = width.min(avail);
    let mut out = String::new();
    out.push_str(&format!("error: {message}\n"));
    out.push_str(&format!(" --> line {line}, column {col}\n"));
    out.push_str(&format!("  | {text}\n"));
    out.push_str(&format!("  | {}{}", " ".repeat(col - 1), "^".repeat(caret_len)));
    out
}
