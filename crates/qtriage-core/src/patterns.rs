//! Line-shape patterns for the query log and the runner report.
//!
//! Compiled once on first use and shared read-only for the rest of the
//! process. Example inputs:
//!
//! ```text
//! 2023-03-22T18:55:23Z DEBUG [conn 2] Query finished in 1 ms {connectTime=…, connectionDb=, query=SET NAMES utf8mb4}
//! 2023-03-22T18:55:23Z WARN [conn 2] error running query {connectTime=…, connectionDb=, error=database exists, query=CREATE DATABASE `t`}
//! select 'dolt: setUp, test id = nautobot.dcim.tests.test_filters.CableTestCase.test_color'
//! select 'dolt: _post_teardown, test id = nautobot.dcim.tests.test_filters.CableTestCase.test_color'
//! FAIL: test_napalm_args (nautobot.dcim.tests.test_filters.PlatformTestCase)
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Separator line that opens the failure listing of a unittest-style report.
pub const REPORT_SEPARATOR: &str =
    "======================================================================";

pub struct LinePatterns {
    /// `… ] Query finished in … {…, query=<TEXT>}`
    pub finished_query: Regex,
    /// `… ] error running query {…, error=<ERR>, query=<TEXT>}`
    pub errored_query: Regex,
    /// `select 'dolt: setUp, test id = <ID>'`
    pub test_starting: Regex,
    /// `select 'dolt: _post_teardown, test id = <ID>'`
    pub test_finished: Regex,
    /// `FAIL: <name> (<suite>)` or `FAILED: <name> (<suite>)`
    pub report_failed: Regex,
    /// `ERROR: <name> (<suite>)` or `ERRORED: <name> (<suite>)`
    pub report_errored: Regex,
    /// `<name> (<suite>)`
    pub display_name: Regex,
}

fn build_patterns() -> Option<LinePatterns> {
    Some(LinePatterns {
        finished_query: Regex::new(r".*\] Query finished in .*\{.*, query=(.*)\}").ok()?,
        errored_query: Regex::new(r".*\] error running query \{.*, error=(.*), query=(.*)\}").ok()?,
        test_starting: Regex::new(r"select 'dolt: setUp, test id = (.*)'").ok()?,
        test_finished: Regex::new(r"select 'dolt: _post_teardown, test id = (.*)'").ok()?,
        report_failed: Regex::new(r"FAIL(?:ED)?: (.*) \((.*)\)").ok()?,
        report_errored: Regex::new(r"ERROR(?:ED)?: (.*) \((.*)\)").ok()?,
        display_name: Regex::new(r"^(.*) \((.*)\)$").ok()?,
    })
}

static PATTERNS: LazyLock<Option<LinePatterns>> = LazyLock::new(build_patterns);

/// Shared pattern table; `None` only if a pattern literal fails to compile.
pub fn patterns() -> Option<&'static LinePatterns> {
    PATTERNS.as_ref()
}

/// First-match capture groups as owned strings, or `None` when `regex` does
/// not match `text`.
pub fn captures(regex: &Regex, text: &str) -> Option<Vec<String>> {
    let caps = regex.captures(text)?;
    Some(
        caps.iter()
            .skip(1)
            .map(|group| group.map_or_else(String::new, |m| m.as_str().to_owned()))
            .collect(),
    )
}
