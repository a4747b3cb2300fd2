//! Text and JSON renderers for scan results.

use std::fmt::Write as _;

use qtriage_error::{Result, TriageError};
use serde::Serialize;

use crate::boundary::Test;
use crate::collection::{QueryCollection, Statement};
use crate::ranking::RankedGroup;
use crate::scan::Diagnostic;
use crate::sink::OutputSink;

/// Separator written after every block.
pub const BLOCK_SEPARATOR: &str = "--------------------------------------------------\n";

/// Render one statement as a `.queries` block (without the separator).
#[must_use]
pub fn render_statement(stmt: &Statement, log_query_text: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Line {}", stmt.line_number);
    if stmt.in_test() {
        let label = if stmt.test_failed {
            "FAILED TEST"
        } else {
            "Passing test"
        };
        let _ = writeln!(out, "{label}: {} / {}", stmt.test_id, stmt.display_name);
    }
    if log_query_text {
        let _ = writeln!(out, "Query:\n{}", stmt.text);
    }
    match &stmt.canonical_form {
        Some(form) => {
            let _ = writeln!(out, "Query tree:\n{form}");
        }
        None => out.push_str("Query tree: nil\n"),
    }
    if let Some(error) = &stmt.error_text {
        let _ = writeln!(out, "Query error: {error}");
    }
    out
}

/// Render one test as a `.tests` block (without the separator).
#[must_use]
pub fn render_test(test: &Test, collection: &QueryCollection) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Test {} / {}", test.id, test.display_name);
    if test.failed {
        out.push_str("Failed: true\n");
    }
    out.push('\n');

    let _ = writeln!(out, "Tables used: {}", test.tables_used.join(", "));
    out.push_str("Queries: \n");
    for stmt in test.statements(collection) {
        let _ = writeln!(out, "{};", stmt.text);
    }
    out.push('\n');

    out.push_str("send_query(DOLT_PATCH) calls for used tables:\n");
    out.push_str("if is_db_dolt():\n");
    for table in &test.tables_used {
        let _ = writeln!(
            out,
            "    send_query(\"SELECT statement_order, TO_BASE64(statement) FROM DOLT_PATCH('HEAD', 'WORKING', '{table}');\",True)"
        );
    }
    out.push('\n');
    out
}

/// Every statement, separated.
pub fn write_queries(
    sink: &mut dyn OutputSink,
    collection: &QueryCollection,
    log_query_text: bool,
) -> Result<()> {
    for stmt in collection.all() {
        sink.write_str(&render_statement(stmt, log_query_text))?;
        sink.write_str(BLOCK_SEPARATOR)?;
    }
    sink.flush()
}

/// Every statement's text, one `;`-terminated line each.
pub fn write_flat_queries(sink: &mut dyn OutputSink, collection: &QueryCollection) -> Result<()> {
    for stmt in collection.all() {
        sink.write_formatted(format_args!("{};\n", stmt.text))?;
    }
    sink.flush()
}

pub fn write_tests(
    sink: &mut dyn OutputSink,
    tests: &[Test],
    collection: &QueryCollection,
) -> Result<()> {
    for test in tests {
        sink.write_str(&render_test(test, collection))?;
        sink.write_str(BLOCK_SEPARATOR)?;
    }
    sink.flush()
}

/// Summary counts followed by the ranked groups.
pub fn write_analysis(
    sink: &mut dyn OutputSink,
    collection: &QueryCollection,
    groups: &[RankedGroup<'_>],
    log_query_text: bool,
) -> Result<()> {
    sink.write_formatted(format_args!("Total queries: {}\n", collection.len()))?;
    sink.write_formatted(format_args!(
        "Number of tests: {}\n",
        collection.test_id_count()
    ))?;
    sink.write_formatted(format_args!(
        "Number of test queries: {}\n",
        collection.test_statement_count()
    ))?;
    sink.write_str(BLOCK_SEPARATOR)?;

    for (rank, group) in groups.iter().enumerate() {
        let count = group.statement_count();
        sink.write_formatted(format_args!(
            "Group {}, fingerprint {}\n",
            rank + 1,
            group.fingerprint
        ))?;
        sink.write_formatted(format_args!("Canonical form: \n{}\n", group.canonical_form))?;
        sink.write_formatted(format_args!("Number of queries: {count}\n"))?;
        sink.write_formatted(format_args!(
            "Failed test queries: {}\n",
            group.failed_count
        ))?;
        for (idx, stmt) in group.statements.iter().enumerate() {
            sink.write_formatted(format_args!(
                "Query {}/{count}:\n{}\n",
                idx + 1,
                render_statement(stmt, log_query_text)
            ))?;
        }
        sink.write_str(BLOCK_SEPARATOR)?;
    }
    sink.flush()
}

/// Machine-readable form of the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub total_queries: usize,
    pub number_of_tests: usize,
    pub number_of_test_queries: usize,
    pub diagnostics: usize,
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub rank: usize,
    pub fingerprint: String,
    pub canonical_form: String,
    pub statement_count: usize,
    pub failed_count: usize,
    pub members: Vec<MemberSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub line_number: usize,
    pub test_id: String,
    pub test_failed: bool,
}

impl AnalysisSummary {
    #[must_use]
    pub fn build(
        collection: &QueryCollection,
        groups: &[RankedGroup<'_>],
        diagnostics: &[Diagnostic],
    ) -> Self {
        Self {
            total_queries: collection.len(),
            number_of_tests: collection.test_id_count(),
            number_of_test_queries: collection.test_statement_count(),
            diagnostics: diagnostics.len(),
            groups: groups
                .iter()
                .enumerate()
                .map(|(idx, group)| GroupSummary {
                    rank: idx + 1,
                    fingerprint: group.fingerprint.clone(),
                    canonical_form: group.canonical_form.to_owned(),
                    statement_count: group.statement_count(),
                    failed_count: group.failed_count,
                    members: group
                        .statements
                        .iter()
                        .map(|stmt| MemberSummary {
                            line_number: stmt.line_number,
                            test_id: stmt.test_id.clone(),
                            test_failed: stmt.test_failed,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Pretty-printed JSON summary plus a trailing newline.
pub fn write_summary_json(sink: &mut dyn OutputSink, summary: &AnalysisSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|err| TriageError::internal(format!("summary serialization: {err}")))?;
    sink.write_line(&json)?;
    sink.flush()
}
