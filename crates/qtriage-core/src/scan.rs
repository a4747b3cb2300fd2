//! The forward scan over a query log.
//!
//! One pass, one line at a time: extract the statement, follow test
//! boundaries, parse and canonicalize, then index. Per-statement problems
//! become [`Diagnostic`]s and the scan carries on; only I/O failures and
//! canonicalization contract breaks end it.

use std::io::BufRead;

use qtriage_error::{Result, TriageError};
use tracing::{debug, error, info, warn};

use crate::boundary::{BoundaryMismatch, BoundaryTracker, Test, Transition};
use crate::canonical::{LiteralPolicy, canonicalize, parse_statement, tables_used};
use crate::collection::{QueryCollection, Statement};
use crate::extract::extract_statement;
use crate::patterns::patterns;
use crate::report::FailedTests;
use crate::test_id::display_from_test_id;

/// Knobs for [`scan_log`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Drop statements that ran outside any test, boundary markers included.
    pub hide_non_test_queries: bool,
    pub literal_policy: LiteralPolicy,
}

/// A recoverable problem met during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A finished marker named a different test than the running one.
    BoundaryMismatch(BoundaryMismatch),
    /// Statement text did not parse; it was kept without a tree.
    ParseFailure {
        line_number: usize,
        text: String,
        error: String,
    },
}

impl Diagnostic {
    #[must_use]
    pub const fn line_number(&self) -> usize {
        match self {
            Self::BoundaryMismatch(m) => m.line_number,
            Self::ParseFailure { line_number, .. } => *line_number,
        }
    }
}

/// Everything one scan produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub collection: QueryCollection,
    /// Closed tests, in the order they closed.
    pub tests: Vec<Test>,
    pub diagnostics: Vec<Diagnostic>,
    pub lines_read: usize,
}

/// Scan a query log.
///
/// Lines are read as bytes and decoded lossily, so stray non-UTF-8 output
/// in the log does not stop the scan.
///
/// # Errors
///
/// - `TriageError::Io` when reading fails.
/// - `TriageError::UnsupportedLiteral` when canonicalization meets a literal
///   it cannot classify.
pub fn scan_log<R: BufRead>(
    mut reader: R,
    failed: &FailedTests,
    options: &ScanOptions,
) -> Result<ScanOutcome> {
    if patterns().is_none() {
        return Err(TriageError::internal("log line patterns failed to compile"));
    }

    let mut outcome = ScanOutcome::default();
    let mut tracker = BoundaryTracker::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        outcome.lines_read += 1;
        let line_number = outcome.lines_read;
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);

        let Some(extracted) = extract_statement(line, line_number) else {
            continue;
        };

        let transition = tracker.observe(&extracted.text, line_number, |id| failed.contains(id));
        let test_id = match transition {
            Transition::Started { test_id } => {
                debug!(line_number, test_id = %test_id, "test started");
                String::new()
            }
            Transition::Finished { test_id, mismatch } => {
                if let Some(mismatch) = mismatch {
                    warn!(
                        line_number,
                        finished_id = %mismatch.finished_id,
                        active_id = %mismatch.active_id,
                        "test id mismatch at test end"
                    );
                    outcome
                        .diagnostics
                        .push(Diagnostic::BoundaryMismatch(mismatch));
                } else {
                    debug!(line_number, test_id = %test_id, "test finished");
                }
                String::new()
            }
            Transition::Statement { test_id } => test_id,
        };

        if options.hide_non_test_queries && test_id.is_empty() {
            continue;
        }

        let (tree, tables) = match parse_statement(&extracted.text) {
            Ok(mut tree) => {
                let tables = tables_used(&tree);
                if let Err(err) = canonicalize(&mut tree, options.literal_policy) {
                    error!(line_number, error = %err, "canonicalization failed");
                    return Err(err);
                }
                (Some(tree), tables)
            }
            Err(err) => {
                warn!(
                    line_number,
                    test_id = %test_id,
                    error = %err,
                    "statement did not parse"
                );
                outcome.diagnostics.push(Diagnostic::ParseFailure {
                    line_number,
                    text: extracted.text.clone(),
                    error: err.to_string(),
                });
                (None, Vec::new())
            }
        };

        let in_test = !test_id.is_empty();
        // Markers carry an empty id, so only test statements are recorded.
        if in_test {
            tracker.record(outcome.collection.len(), &tables);
        }
        outcome.collection.add(Statement {
            line_number,
            canonical_form: tree.as_ref().map(|t| t.canonical_form()),
            tree,
            text: extracted.text,
            display_name: display_from_test_id(&test_id).unwrap_or_default(),
            test_failed: in_test && failed.contains(&test_id),
            test_id,
            error_text: extracted.error_text,
            tables_used: tables,
        });
    }

    outcome.tests = tracker.finish();
    info!(
        lines = outcome.lines_read,
        statements = outcome.collection.len(),
        tests = outcome.tests.len(),
        diagnostics = outcome.diagnostics.len(),
        "query log scanned"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn finished(query: &str) -> String {
        format!("2023-03-22T18:55:23Z DEBUG [conn 2] Query finished in 1 ms {{connectTime=t, connectionDb=db, query={query}}}")
    }

    fn scan(lines: &[String], failed: &FailedTests, options: ScanOptions) -> ScanOutcome {
        let log = lines.join("\n");
        scan_log(Cursor::new(log.into_bytes()), failed, &options).expect("scan succeeds")
    }

    fn bracketed() -> Vec<String> {
        vec![
            finished("SELECT 0"),
            finished("select 'dolt: setUp, test id = pkg.Case.test_a'"),
            finished("SELECT a FROM t WHERE x = 1"),
            finished("select 'dolt: _post_teardown, test id = pkg.Case.test_a'"),
        ]
    }

    #[test]
    fn markers_kept_with_empty_id() {
        let outcome = scan(&bracketed(), &FailedTests::new(), ScanOptions::default());
        let ids: Vec<_> = outcome
            .collection
            .all()
            .iter()
            .map(|s| (s.line_number, s.test_id.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![(1, ""), (2, ""), (3, "pkg.Case.test_a"), (4, "")]
        );
        assert_eq!(outcome.tests.len(), 1);
        assert_eq!(outcome.tests[0].statement_indices, vec![2]);
        assert_eq!(outcome.tests[0].tables_used, vec!["t".to_owned()]);
        assert_eq!(outcome.lines_read, 4);
    }

    #[test]
    fn hide_non_test_queries_drops_markers_and_setup() {
        let options = ScanOptions {
            hide_non_test_queries: true,
            ..ScanOptions::default()
        };
        let outcome = scan(&bracketed(), &FailedTests::new(), options);
        assert_eq!(outcome.collection.len(), 1);
        assert_eq!(outcome.collection.all()[0].line_number, 3);
        assert_eq!(outcome.tests[0].statement_indices, vec![0]);
    }

    #[test]
    fn parse_failure_is_kept_without_tree() {
        let lines = vec![finished("SELEC oops"), finished("SELECT 1")];
        let outcome = scan(&lines, &FailedTests::new(), ScanOptions::default());
        assert_eq!(outcome.collection.len(), 2);
        let broken = &outcome.collection.all()[0];
        assert!(broken.tree.is_none());
        assert!(broken.canonical_form.is_none());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].line_number(), 1);
        assert!(matches!(
            outcome.diagnostics[0],
            Diagnostic::ParseFailure { .. }
        ));
    }

    #[test]
    fn failed_set_marks_statements() {
        let failed: FailedTests = ["pkg.Case.test_a".to_owned()].into_iter().collect();
        let outcome = scan(&bracketed(), &failed, ScanOptions::default());
        let stmt = &outcome.collection.all()[2];
        assert!(stmt.test_failed);
        assert_eq!(stmt.display_name, "test_a (pkg.Case)");
        assert!(outcome.tests[0].failed);
        assert!(!outcome.collection.all()[0].test_failed);
    }

    #[test]
    fn non_utf8_bytes_do_not_stop_the_scan() {
        let mut log = b"garbage \xff\xfe line\n".to_vec();
        log.extend_from_slice(finished("SELECT 1").as_bytes());
        let outcome = scan_log(Cursor::new(log), &FailedTests::new(), &ScanOptions::default())
            .expect("scan succeeds");
        assert_eq!(outcome.collection.len(), 1);
        assert_eq!(outcome.collection.all()[0].line_number, 2);
    }

    #[test]
    fn crlf_line_endings_are_trimmed() {
        let log = format!("{}\r\n", finished("SELECT 1"));
        let outcome = scan_log(
            Cursor::new(log.into_bytes()),
            &FailedTests::new(),
            &ScanOptions::default(),
        )
        .expect("scan succeeds");
        assert_eq!(outcome.collection.all()[0].text, "SELECT 1");
    }
}
