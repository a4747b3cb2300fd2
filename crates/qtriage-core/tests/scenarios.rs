//! Attribution, correlation and canonicalization scenarios over small
//! in-memory logs.

use std::io::Cursor;

use qtriage_core::canonical::{LiteralPolicy, canonical_form_of};
use qtriage_core::ranking::rank_groups;
use qtriage_core::{
    Diagnostic, FailedTests, REPORT_SEPARATOR, ScanOptions, ScanOutcome, read_failure_report,
    scan_log,
};

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .compact()
        .try_init();
}

fn finished(query: &str) -> String {
    format!(
        "2023-03-22T18:55:23Z DEBUG [conn 2] Query finished in 1 ms {{connectTime=2023-03-22T18:55:23Z, connectionDb=nautobot, query={query}}}"
    )
}

fn errored(error: &str, query: &str) -> String {
    format!(
        "2023-03-22T18:55:23Z WARN [conn 2] error running query {{connectTime=2023-03-22T18:55:23Z, connectionDb=nautobot, error={error}, query={query}}}"
    )
}

fn start(id: &str) -> String {
    finished(&format!("select 'dolt: setUp, test id = {id}'"))
}

fn finish(id: &str) -> String {
    finished(&format!("select 'dolt: _post_teardown, test id = {id}'"))
}

fn scan(lines: &[String], failed: &FailedTests) -> ScanOutcome {
    init_test_logging();
    let log = lines.join("\n");
    scan_log(Cursor::new(log.into_bytes()), failed, &ScanOptions::default())
        .expect("scan succeeds")
}

fn report(body: &str) -> FailedTests {
    read_failure_report(Cursor::new(body.as_bytes().to_vec())).expect("report reads")
}

#[test]
fn basic_attribution() {
    let lines = vec![
        start("pkg.Case.test_x"),
        finished("SELECT 1"),
        finish("pkg.Case.test_x"),
    ];
    let outcome = scan(&lines, &FailedTests::new());

    assert_eq!(outcome.tests.len(), 1);
    let test = &outcome.tests[0];
    assert_eq!(test.id, "pkg.Case.test_x");
    assert!(!test.failed);
    let statements: Vec<_> = test.statements(&outcome.collection).collect();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].text, "SELECT 1");
    assert_eq!(statements[0].line_number, 2);
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn failure_correlation() {
    let lines = vec![
        start("pkg.Case.test_x"),
        finished("SELECT 1"),
        finish("pkg.Case.test_x"),
    ];
    let failed = report(&format!(
        "Ran 1 test in 0.1s\n{REPORT_SEPARATOR}\nFAIL: test_x (pkg.Case)\n----------------------------------------------------------------------\nTraceback (most recent call last):\n"
    ));
    assert!(failed.contains("pkg.Case.test_x"));

    let outcome = scan(&lines, &failed);
    let stmt = outcome
        .collection
        .test_statements()
        .next()
        .expect("one test statement");
    assert!(stmt.test_failed);
    assert!(outcome.tests[0].failed);

    let groups = rank_groups(&outcome.collection);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].failed_count, 1);
    assert_eq!(groups[0].statement_count(), 1);
}

#[test]
fn base64_statement() {
    // "SELECT 2"
    let outcome = scan(&[finished("U0VMRUNUIDI=")], &FailedTests::new());
    let stmt = &outcome.collection.all()[0];
    assert_eq!(stmt.text, "SELECT 2");
    assert!(stmt.tree.is_some());
    assert_eq!(stmt.canonical_form.as_deref(), Some("SELECT *"));
}

#[test]
fn mismatched_boundary() {
    let lines = vec![start("A.a"), finished("SELECT 1"), finish("B.b")];
    let outcome = scan(&lines, &FailedTests::new());

    assert_eq!(outcome.tests.len(), 1);
    assert_eq!(outcome.tests[0].id, "A.a");
    assert_eq!(outcome.diagnostics.len(), 1);
    let Diagnostic::BoundaryMismatch(mismatch) = &outcome.diagnostics[0] else {
        panic!("expected a boundary mismatch, got {:?}", outcome.diagnostics[0]);
    };
    assert_eq!(mismatch.line_number, 3);
    assert_eq!(mismatch.finished_id, "B.b");
    assert_eq!(mismatch.active_id, "A.a");
}

#[test]
fn canonicalization_collapse() {
    let form = |sql| canonical_form_of(sql, LiteralPolicy::Erase).expect("canonicalizes");
    assert_eq!(
        form("SELECT * FROM t WHERE x = 1"),
        form("SELECT * FROM t WHERE x = 2")
    );
    assert_ne!(
        form("SELECT * FROM t WHERE x = 1"),
        form("SELECT * FROM t WHERE y = 1")
    );

    let lines = vec![
        start("p.C.t"),
        finished("SELECT * FROM t WHERE x = 1"),
        finished("SELECT * FROM t WHERE x = 2"),
        finished("SELECT * FROM t WHERE y = 1"),
        finish("p.C.t"),
    ];
    let outcome = scan(&lines, &FailedTests::new());
    let groups = rank_groups(&outcome.collection);
    let sizes: Vec<_> = groups.iter().map(|g| g.statement_count()).collect();
    assert_eq!(sizes, vec![2, 1]);
}

#[test]
fn errored_statement_keeps_error_text() {
    let lines = vec![
        start("p.C.t"),
        errored("table not found: widgets", "SELECT * FROM widgets"),
        finish("p.C.t"),
    ];
    let outcome = scan(&lines, &FailedTests::new());
    let stmt = outcome
        .collection
        .test_statements()
        .next()
        .expect("errored statement recorded");
    assert_eq!(stmt.error_text.as_deref(), Some("table not found: widgets"));
    assert_eq!(stmt.tables_used, vec!["widgets".to_owned()]);
}

#[test]
fn tables_accumulate_across_a_test() {
    let lines = vec![
        start("p.C.t"),
        finished("INSERT INTO dcim_cable (id) VALUES (1)"),
        finished("SELECT * FROM dcim_cable JOIN dcim_site ON dcim_cable.site_id = dcim_site.id"),
        finished("SELECT * FROM extras_tag WHERE id IN (SELECT tag_id FROM dcim_site)"),
        finish("p.C.t"),
    ];
    let outcome = scan(&lines, &FailedTests::new());
    assert_eq!(
        outcome.tests[0].tables_used,
        vec!["dcim_cable", "dcim_site", "extras_tag"]
    );
}

#[test]
fn unparseable_statement_does_not_stop_the_run() {
    let lines = vec![
        start("p.C.t"),
        finished("THIS IS NOT SQL"),
        finished("SELECT 1"),
        finish("p.C.t"),
    ];
    let outcome = scan(&lines, &FailedTests::new());
    assert_eq!(outcome.collection.test_statement_count(), 2);
    assert_eq!(outcome.tests[0].statement_indices.len(), 2);
    assert!(matches!(
        outcome.diagnostics.as_slice(),
        [Diagnostic::ParseFailure { line_number: 2, .. }]
    ));
    let groups = rank_groups(&outcome.collection);
    assert_eq!(groups.len(), 1, "the unparsed statement joins no group");
}

#[test]
fn failing_tests_rank_first() {
    let lines = vec![
        start("p.C.ok_one"),
        finished("SELECT * FROM a WHERE id = 1"),
        finished("SELECT * FROM a WHERE id = 2"),
        finish("p.C.ok_one"),
        start("p.C.broken"),
        finished("UPDATE b SET flag = 1 WHERE id = 3"),
        finish("p.C.broken"),
    ];
    let failed = report(&format!("{REPORT_SEPARATOR}\nERROR: broken (p.C)\n"));
    let outcome = scan(&lines, &failed);
    let groups = rank_groups(&outcome.collection);
    assert_eq!(groups.len(), 2);
    assert!(groups[0].canonical_form.starts_with("UPDATE"));
    assert_eq!(groups[0].failed_count, 1);
    assert_eq!(groups[1].statement_count(), 2);
}
