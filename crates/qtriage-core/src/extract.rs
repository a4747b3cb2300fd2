//! Statement extraction from single query-log lines.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::patterns::{captures, patterns};

/// A statement recovered from one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedStatement {
    /// 1-based line number in the source log.
    pub line_number: usize,
    /// Statement text, base64-decoded when the log carried it encoded.
    pub text: String,
    /// Runtime error the server reported for this statement, if any.
    pub error_text: Option<String>,
}

/// Match `line` against the finished and errored shapes.
///
/// Returns `None` when the line has neither shape or carries an empty
/// statement. The two shapes are mutually exclusive in practice; the finished
/// shape is tried first.
#[must_use]
pub fn extract_statement(line: &str, line_number: usize) -> Option<ExtractedStatement> {
    let p = patterns()?;

    let (raw, error_text) = if let Some(groups) = captures(&p.finished_query, line) {
        (groups.into_iter().next()?, None)
    } else if let Some(groups) = captures(&p.errored_query, line) {
        let mut groups = groups.into_iter();
        let error = groups.next()?;
        let raw = groups.next()?;
        (raw, Some(error).filter(|e| !e.is_empty()))
    } else {
        return None;
    };

    if raw.is_empty() {
        return None;
    }

    Some(ExtractedStatement {
        line_number,
        text: decode_statement_text(&raw),
        error_text,
    })
}

/// Decode base64 statement text, falling back to the raw text.
///
/// Text that is not valid standard base64, or that decodes to bytes which are
/// not UTF-8, is taken to be plain SQL.
#[must_use]
pub fn decode_statement_text(raw: &str) -> String {
    STANDARD
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| raw.to_owned())
}
