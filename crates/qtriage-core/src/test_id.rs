//! Conversion between dotted test ids and runner display names.
//!
//! A dotted id `a.b.Case.test_x` is displayed by the runner as
//! `test_x (a.b.Case)`. Both directions split or join on the last dot.

use crate::patterns::{captures, patterns};

/// `name (suite)` → `suite.name`.
///
/// Returns `None` if `display` is not of the `name (suite)` shape or either
/// half is empty.
#[must_use]
pub fn test_id_from_display(display: &str) -> Option<String> {
    let groups = captures(&patterns()?.display_name, display)?;
    let [name, suite] = <[String; 2]>::try_from(groups).ok()?;
    join_test_id(&suite, &name)
}

/// `suite.name` → `name (suite)`.
///
/// Returns `None` if `test_id` has no dot or either half is empty.
#[must_use]
pub fn display_from_test_id(test_id: &str) -> Option<String> {
    let (suite, name) = test_id.rsplit_once('.')?;
    if suite.is_empty() || name.is_empty() {
        return None;
    }
    Some(format!("{name} ({suite})"))
}

/// `suite` + `.` + `name`, rejecting empty halves and names containing dots
/// (which would not split back to the same pair).
pub(crate) fn join_test_id(suite: &str, name: &str) -> Option<String> {
    if suite.is_empty() || name.is_empty() || name.contains('.') {
        return None;
    }
    Some(format!("{suite}.{name}"))
}
