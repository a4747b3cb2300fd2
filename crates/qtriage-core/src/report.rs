//! Failure-report reader.
//!
//! The runner report is a unittest-style transcript. Everything before the
//! first [`REPORT_SEPARATOR`] is progress noise; after it, each failure or
//! error block opens with a `FAIL: name (suite)` / `ERROR: name (suite)` line.

use std::collections::HashSet;
use std::io::BufRead;

use qtriage_error::Result;
use tracing::debug;

use crate::patterns::{REPORT_SEPARATOR, captures, patterns};
use crate::test_id::join_test_id;

/// How the runner classified a failing test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Assertion failure (`FAIL:`).
    Failed,
    /// Unexpected exception (`ERROR:`).
    Errored,
}

/// One failing test as listed in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTest {
    /// Dotted test id, `suite.name`.
    pub id: String,
    pub kind: FailureKind,
    /// 1-based line in the report where the test was first listed.
    pub line_number: usize,
}

/// Insertion-ordered set of failed test ids.
///
/// Built once by [`read_failure_report`] and read-only afterwards. A test
/// listed twice keeps its first entry.
#[derive(Debug, Clone, Default)]
pub struct FailedTests {
    entries: Vec<FailedTest>,
    ids: HashSet<String>,
}

impl FailedTests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a test; returns `false` if `id` was already present.
    pub fn insert(&mut self, test: FailedTest) -> bool {
        if self.ids.contains(&test.id) {
            return false;
        }
        self.ids.insert(test.id.clone());
        self.entries.push(test);
        true
    }

    #[must_use]
    pub fn contains(&self, test_id: &str) -> bool {
        self.ids.contains(test_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FailedTest> {
        self.entries.iter()
    }

    /// Ids in report order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|t| t.id.as_str())
    }
}

impl FromIterator<String> for FailedTests {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(FailedTest {
                id,
                kind: FailureKind::Failed,
                line_number: 0,
            });
        }
        set
    }
}

/// Match one post-separator report line.
///
/// Returns the dotted id and failure kind, or `None` for any other line.
#[must_use]
pub fn parse_failure_line(line: &str) -> Option<(String, FailureKind)> {
    let p = patterns()?;
    let (groups, kind) = if let Some(groups) = captures(&p.report_failed, line) {
        (groups, FailureKind::Failed)
    } else {
        (captures(&p.report_errored, line)?, FailureKind::Errored)
    };
    let [name, suite] = <[String; 2]>::try_from(groups).ok()?;
    Some((join_test_id(&suite, &name)?, kind))
}

/// Read the failed-test set from a runner report.
///
/// # Errors
///
/// Returns `TriageError::Io` if reading from `reader` fails. Invalid UTF-8
/// is replaced, not reported.
pub fn read_failure_report<R: BufRead>(mut reader: R) -> Result<FailedTests> {
    let mut failed = FailedTests::new();
    let mut past_separator = false;
    let mut buf = Vec::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if !past_separator {
            past_separator = line.trim_end() == REPORT_SEPARATOR;
            continue;
        }
        if let Some((id, kind)) = parse_failure_line(line) {
            if failed.insert(FailedTest {
                id: id.clone(),
                kind,
                line_number,
            }) {
                debug!(line_number, test_id = %id, ?kind, "failed test");
            }
        }
    }

    debug!(count = failed.len(), "failure report read");
    Ok(failed)
}
