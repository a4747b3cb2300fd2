//! Failure-density ranking of canonical groups.

use std::cmp::Ordering;

use sha2::{Digest, Sha256};

use crate::collection::{QueryCollection, Statement};

/// Length of a group fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 12;

/// A canonical shape and the test statements that share it.
#[derive(Debug, Clone)]
pub struct RankedGroup<'a> {
    pub canonical_form: &'a str,
    pub fingerprint: String,
    /// Members attributed to a test, in log order.
    pub statements: Vec<&'a Statement>,
    /// Members whose test failed.
    pub failed_count: usize,
}

impl RankedGroup<'_> {
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// Short stable handle for a canonical form: leading hex of its SHA-256.
#[must_use]
pub fn fingerprint(canonical_form: &str) -> String {
    let mut hex = sha256_hex(canonical_form.as_bytes());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

fn sha256_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0F)]));
    }
    out
}

/// Ranking order: more failed members first, then more members, then
/// canonical form ascending.
#[must_use]
pub fn compare_groups(a: &RankedGroup<'_>, b: &RankedGroup<'_>) -> Ordering {
    b.failed_count
        .cmp(&a.failed_count)
        .then_with(|| b.statement_count().cmp(&a.statement_count()))
        .then_with(|| a.canonical_form.cmp(b.canonical_form))
}

/// Restrict each canonical bucket to test statements, drop the empty ones
/// and sort by [`compare_groups`].
#[must_use]
pub fn rank_groups(collection: &QueryCollection) -> Vec<RankedGroup<'_>> {
    let mut groups: Vec<RankedGroup<'_>> = collection
        .canonical_groups()
        .filter_map(|(form, members)| {
            let statements: Vec<&Statement> =
                members.into_iter().filter(|s| s.in_test()).collect();
            if statements.is_empty() {
                return None;
            }
            let failed_count = statements.iter().filter(|s| s.test_failed).count();
            Some(RankedGroup {
                canonical_form: form,
                fingerprint: fingerprint(form),
                statements,
                failed_count,
            })
        })
        .collect();
    groups.sort_by(compare_groups);
    groups
}
