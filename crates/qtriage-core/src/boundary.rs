//! Test-boundary tracking.
//!
//! The harness brackets every test with two marker statements issued over
//! the same connection as the test's own SQL:
//!
//! ```text
//! select 'dolt: setUp, test id = pkg.Case.test_x'
//! ...statements belonging to pkg.Case.test_x...
//! select 'dolt: _post_teardown, test id = pkg.Case.test_x'
//! ```
//!
//! [`BoundaryTracker`] follows these markers through a forward scan and
//! assembles the closed [`Test`] aggregates.

use crate::collection::{QueryCollection, Statement};
use crate::patterns::{captures, patterns};
use crate::test_id::display_from_test_id;

/// A marker statement recognized by its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sentinel {
    Starting(String),
    Finished(String),
}

/// Classify statement text as a boundary marker, if it is one.
#[must_use]
pub fn classify_sentinel(text: &str) -> Option<Sentinel> {
    let p = patterns()?;
    if let Some(groups) = captures(&p.test_starting, text) {
        return groups.into_iter().next().map(Sentinel::Starting);
    }
    captures(&p.test_finished, text)?
        .into_iter()
        .next()
        .map(Sentinel::Finished)
}

/// A finished marker that named a different test than the one running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMismatch {
    pub line_number: usize,
    /// Id carried by the finished marker.
    pub finished_id: String,
    /// Id the tracker had active (possibly empty).
    pub active_id: String,
}

/// What one statement did to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A starting marker; the named test is now active.
    Started { test_id: String },
    /// A finished marker; no test is active any more.
    Finished {
        /// The test that was active, empty if none was.
        test_id: String,
        mismatch: Option<BoundaryMismatch>,
    },
    /// An ordinary statement, attributed to the active test (or none).
    Statement { test_id: String },
}

impl Transition {
    /// Whether the statement was a boundary marker.
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Statement { .. })
    }
}

/// Aggregate of the consecutive statements that ran under one test id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Test {
    pub id: String,
    /// Runner display name, `name (suite)`.
    pub display_name: String,
    pub failed: bool,
    /// Indices into [`QueryCollection::all`], in log order.
    pub statement_indices: Vec<usize>,
    /// Tables referenced by any statement of the test, first-seen order.
    pub tables_used: Vec<String>,
}

impl Test {
    fn open(id: &str, failed: bool) -> Self {
        Self {
            id: id.to_owned(),
            display_name: display_from_test_id(id).unwrap_or_default(),
            failed,
            statement_indices: Vec::new(),
            tables_used: Vec::new(),
        }
    }

    /// Resolve this test's statements against the collection they were
    /// recorded into.
    pub fn statements<'a>(
        &'a self,
        collection: &'a QueryCollection,
    ) -> impl Iterator<Item = &'a Statement> + 'a {
        self.statement_indices
            .iter()
            .filter_map(|&idx| collection.get(idx))
    }
}

/// Forward-scan state machine over boundary markers.
#[derive(Debug, Default)]
pub struct BoundaryTracker {
    current_test_id: String,
    open: Option<Test>,
    closed: Vec<Test>,
}

impl BoundaryTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the running test, empty when none is.
    #[must_use]
    pub fn current_test_id(&self) -> &str {
        &self.current_test_id
    }

    /// Feed one statement's text through the tracker.
    ///
    /// `is_failed` tells whether a test id is in the failed set; it is
    /// consulted once when a test opens.
    pub fn observe(
        &mut self,
        text: &str,
        line_number: usize,
        is_failed: impl Fn(&str) -> bool,
    ) -> Transition {
        match classify_sentinel(text) {
            Some(Sentinel::Starting(id)) => {
                let same_test = self.open.as_ref().is_some_and(|t| t.id == id);
                if !same_test {
                    self.close_open();
                    self.open = Some(Test::open(&id, is_failed(&id)));
                }
                self.current_test_id.clone_from(&id);
                Transition::Started { test_id: id }
            }
            Some(Sentinel::Finished(finished_id)) => {
                let active_id = std::mem::take(&mut self.current_test_id);
                let mismatch = (finished_id != active_id).then(|| BoundaryMismatch {
                    line_number,
                    finished_id,
                    active_id: active_id.clone(),
                });
                self.close_open();
                Transition::Finished {
                    test_id: active_id,
                    mismatch,
                }
            }
            None => Transition::Statement {
                test_id: self.current_test_id.clone(),
            },
        }
    }

    /// Append a recorded statement to the open test.
    ///
    /// No-op when no test is open.
    pub fn record(&mut self, index: usize, tables: &[String]) {
        let Some(test) = self.open.as_mut() else {
            return;
        };
        test.statement_indices.push(index);
        for table in tables {
            if !test.tables_used.contains(table) {
                test.tables_used.push(table.clone());
            }
        }
    }

    /// Close any still-open test and return every test in closing order.
    #[must_use]
    pub fn finish(mut self) -> Vec<Test> {
        self.close_open();
        self.closed
    }

    fn close_open(&mut self) {
        if let Some(test) = self.open.take() {
            self.closed.push(test);
        }
    }
}
