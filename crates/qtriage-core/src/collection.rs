//! Append-only statement store with its derived indexes.

use std::collections::{BTreeMap, HashMap};

use crate::canonical::QueryTree;

/// One logged statement, attributed and canonicalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based line number in the query log.
    pub line_number: usize,
    /// Decoded statement text.
    pub text: String,
    /// Canonical tree; `None` when the text did not parse.
    pub tree: Option<QueryTree>,
    /// Serialized `tree`, the grouping key.
    pub canonical_form: Option<String>,
    /// Test active when the statement ran, empty if none.
    pub test_id: String,
    /// Runner display form of `test_id`, empty if none.
    pub display_name: String,
    pub test_failed: bool,
    /// Runtime error recorded by the server.
    pub error_text: Option<String>,
    /// Tables referenced before canonicalization, first-seen order.
    pub tables_used: Vec<String>,
}

impl Statement {
    #[must_use]
    pub fn in_test(&self) -> bool {
        !self.test_id.is_empty()
    }
}

/// Every statement in arrival order, indexed by test id and by canonical
/// form.
///
/// Indexes store positions into [`all`](Self::all), so bucket order always
/// matches arrival order. [`add`](Self::add) is the only mutation.
#[derive(Debug, Default)]
pub struct QueryCollection {
    all: Vec<Statement>,
    test_statements: Vec<usize>,
    by_test_id: BTreeMap<String, Vec<usize>>,
    canonical_buckets: Vec<(String, Vec<usize>)>,
    canonical_slots: HashMap<String, usize>,
}

impl QueryCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `statement` and index it; returns its position in `all`.
    pub fn add(&mut self, statement: Statement) -> usize {
        let index = self.all.len();

        if statement.in_test() {
            self.test_statements.push(index);
        }
        self.by_test_id
            .entry(statement.test_id.clone())
            .or_default()
            .push(index);
        if let Some(form) = &statement.canonical_form {
            let slot = match self.canonical_slots.get(form) {
                Some(&slot) => slot,
                None => {
                    let slot = self.canonical_buckets.len();
                    self.canonical_buckets.push((form.clone(), Vec::new()));
                    self.canonical_slots.insert(form.clone(), slot);
                    slot
                }
            };
            self.canonical_buckets[slot].1.push(index);
        }

        self.all.push(statement);
        index
    }

    #[must_use]
    pub fn all(&self) -> &[Statement] {
        &self.all
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Statement> {
        self.all.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Statements attributed to some test, in arrival order.
    pub fn test_statements(&self) -> impl Iterator<Item = &Statement> {
        self.resolve(&self.test_statements)
    }

    #[must_use]
    pub fn test_statement_count(&self) -> usize {
        self.test_statements.len()
    }

    /// Distinct test ids seen, the empty id included when present.
    pub fn test_ids(&self) -> impl Iterator<Item = &str> {
        self.by_test_id.keys().map(String::as_str)
    }

    /// Number of `by_test_id` buckets.
    #[must_use]
    pub fn test_id_count(&self) -> usize {
        self.by_test_id.len()
    }

    /// Statements of one test id (empty id for unattributed statements).
    pub fn by_test_id<'a>(&'a self, test_id: &str) -> impl Iterator<Item = &'a Statement> + use<'a> {
        let indices = self
            .by_test_id
            .get(test_id)
            .map_or(&[][..], Vec::as_slice);
        self.resolve(indices)
    }

    /// Statements sharing one canonical form.
    pub fn by_canonical_form<'a>(
        &'a self,
        form: &str,
    ) -> impl Iterator<Item = &'a Statement> + use<'a> {
        let indices = self
            .canonical_slots
            .get(form)
            .map_or(&[][..], |&slot| self.canonical_buckets[slot].1.as_slice());
        self.resolve(indices)
    }

    /// Canonical buckets in first-seen order.
    pub fn canonical_groups(&self) -> impl Iterator<Item = (&str, Vec<&Statement>)> {
        self.canonical_buckets
            .iter()
            .map(|(form, indices)| (form.as_str(), self.resolve(indices).collect()))
    }

    #[must_use]
    pub fn canonical_form_count(&self) -> usize {
        self.canonical_buckets.len()
    }

    fn resolve<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a Statement> + 'a {
        indices.iter().filter_map(|&idx| self.all.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(line: usize, test_id: &str, form: Option<&str>) -> Statement {
        Statement {
            line_number: line,
            text: format!("SELECT {line}"),
            tree: None,
            canonical_form: form.map(str::to_owned),
            test_id: test_id.to_owned(),
            display_name: String::new(),
            test_failed: false,
            error_text: None,
            tables_used: Vec::new(),
        }
    }

    fn lines<'a>(it: impl Iterator<Item = &'a Statement>) -> Vec<usize> {
        it.map(|s| s.line_number).collect()
    }

    #[test]
    fn add_updates_every_index() {
        let mut coll = QueryCollection::new();
        assert_eq!(coll.add(stmt(1, "", Some("A"))), 0);
        assert_eq!(coll.add(stmt(2, "t.x", Some("B"))), 1);
        assert_eq!(coll.add(stmt(3, "t.x", Some("A"))), 2);
        assert_eq!(coll.add(stmt(4, "t.y", None)), 3);

        assert_eq!(coll.len(), 4);
        assert_eq!(lines(coll.test_statements()), vec![2, 3, 4]);
        assert_eq!(lines(coll.by_test_id("")), vec![1]);
        assert_eq!(lines(coll.by_test_id("t.x")), vec![2, 3]);
        assert_eq!(lines(coll.by_canonical_form("A")), vec![1, 3]);
        assert_eq!(lines(coll.by_canonical_form("B")), vec![2]);
        assert_eq!(coll.test_id_count(), 3);
        assert_eq!(coll.canonical_form_count(), 2);
    }

    #[test]
    fn canonical_groups_in_discovery_order() {
        let mut coll = QueryCollection::new();
        coll.add(stmt(1, "", Some("Z")));
        coll.add(stmt(2, "", Some("A")));
        coll.add(stmt(3, "", Some("Z")));
        let forms: Vec<_> = coll.canonical_groups().map(|(f, s)| (f, s.len())).collect();
        assert_eq!(forms, vec![("Z", 2), ("A", 1)]);
    }

    #[test]
    fn unknown_keys_are_empty() {
        let coll = QueryCollection::new();
        assert!(coll.is_empty());
        assert_eq!(coll.by_test_id("nope").count(), 0);
        assert_eq!(coll.by_canonical_form("nope").count(), 0);
    }

    #[test]
    fn buckets_partition_all() {
        let mut coll = QueryCollection::new();
        for line in 1..=20 {
            let test = ["", "a.b", "c.d"][line % 3];
            let form = (line % 5 != 0).then(|| format!("F{}", line % 4));
            coll.add(stmt(line, test, form.as_deref()));
        }
        let by_test: usize = coll
            .test_ids()
            .map(|id| coll.by_test_id(id).count())
            .sum();
        assert_eq!(by_test, coll.len());
        let by_form: usize = coll.canonical_groups().map(|(_, s)| s.len()).sum();
        let with_tree = coll.all().iter().filter(|s| s.canonical_form.is_some()).count();
        assert_eq!(by_form, with_tree);
    }
}
