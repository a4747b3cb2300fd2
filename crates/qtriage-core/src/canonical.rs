//! Statement parsing and shape canonicalization.
//!
//! Two statements that differ only in literal values, table names, alias
//! names, savepoint names or projected columns canonicalize to the same
//! string. Everything else in the tree (join shape, filter structure,
//! operators, number of placeholders) is retained, so statements that differ
//! there stay apart.
//!
//! The rewrite is a single bottom-up [`VisitorMut`] pass. Subqueries are
//! reached by the same visitor, so they are canonicalized with the whole
//! pass.

use std::fmt;
use std::ops::ControlFlow;

use qtriage_error::{Result, TriageError};
use sqlparser::ast::{
    Expr, Ident, ObjectName, Query, SelectItem, SetExpr, Statement as SqlStatement, TableAlias,
    TableFactor, Value, Visit, VisitMut, Visitor, VisitorMut, WildcardAdditionalOptions,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Name given to every savepoint and table alias.
pub const PLACEHOLDER_NAME: &str = "placeholder";

/// Zero-row relation substituted for every table reference.
pub const DUAL_TABLE: &str = "dual";

/// What to do with literal values during canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiteralPolicy {
    /// Replace every literal with its type-class placeholder.
    #[default]
    Erase,
    /// Keep literal values; statements only group when values match too.
    Preserve,
}

/// Type class of a literal, deciding its placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralClass {
    String,
    /// Integers, decimals and booleans (MySQL booleans are integers).
    Numeric,
    Null,
}

impl LiteralClass {
    /// Classify a literal. Bind-parameter placeholders return `Ok(None)`;
    /// they carry no value to erase.
    ///
    /// # Errors
    ///
    /// `TriageError::UnsupportedLiteral` for any value kind outside the three
    /// classes.
    pub fn of(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Number(..) | Value::Boolean(_) => Ok(Some(Self::Numeric)),
            Value::SingleQuotedString(_)
            | Value::DoubleQuotedString(_)
            | Value::EscapedStringLiteral(_)
            | Value::NationalStringLiteral(_)
            | Value::HexStringLiteral(_)
            | Value::SingleQuotedByteStringLiteral(_)
            | Value::DoubleQuotedByteStringLiteral(_)
            | Value::DollarQuotedString(_) => Ok(Some(Self::String)),
            Value::Null => Ok(Some(Self::Null)),
            Value::Placeholder(_) => Ok(None),
            other => Err(TriageError::UnsupportedLiteral {
                class: value_kind_name(other),
            }),
        }
    }

    /// The literal that stands in for every value of this class.
    #[must_use]
    pub fn placeholder(self) -> Value {
        match self {
            Self::String => Value::SingleQuotedString(PLACEHOLDER_NAME.to_owned()),
            Self::Numeric => Value::Number("1".to_owned(), false),
            Self::Null => Value::Null,
        }
    }
}

/// Variant name of a `Value`, e.g. `TripleSingleQuotedString`.
fn value_kind_name(value: &Value) -> String {
    let debug = format!("{value:?}");
    debug
        .split(|ch: char| ch == '(' || ch == ' ' || ch == '{')
        .next()
        .unwrap_or_default()
        .to_owned()
}

/// Node kinds the canonicalizer rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Literal,
    TableReference,
    TableAlias,
    Savepoint,
    Projection,
}

/// Per-kind rewrite counts from one canonicalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub literals: usize,
    pub table_references: usize,
    pub table_aliases: usize,
    pub savepoints: usize,
    pub projections: usize,
}

impl RewriteStats {
    fn bump(&mut self, kind: NodeKind) {
        let slot = match kind {
            NodeKind::Literal => &mut self.literals,
            NodeKind::TableReference => &mut self.table_references,
            NodeKind::TableAlias => &mut self.table_aliases,
            NodeKind::Savepoint => &mut self.savepoints,
            NodeKind::Projection => &mut self.projections,
        };
        *slot += 1;
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.literals
            + self.table_references
            + self.table_aliases
            + self.savepoints
            + self.projections
    }
}

/// Parsed statement text: usually one statement, several for a
/// `;`-separated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTree {
    statements: Vec<SqlStatement>,
}

impl QueryTree {
    #[must_use]
    pub fn statements(&self) -> &[SqlStatement] {
        &self.statements
    }

    /// Deterministic serialization, the grouping key.
    #[must_use]
    pub fn canonical_form(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, stmt) in self.statements.iter().enumerate() {
            if idx > 0 {
                f.write_str(";\n")?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

/// Parse statement text with the MySQL dialect.
///
/// # Errors
///
/// `TriageError::Parse` if the text is not valid SQL or contains no
/// statement.
pub fn parse_statement(text: &str) -> Result<QueryTree> {
    let statements = Parser::parse_sql(&MySqlDialect {}, text)
        .map_err(|err| TriageError::parse(err.to_string()))?;
    if statements.is_empty() {
        return Err(TriageError::parse("no statement in text"));
    }
    Ok(QueryTree { statements })
}

/// Table names referenced anywhere in the tree, subqueries included, in
/// first-seen order. Schema qualifiers are dropped.
#[must_use]
pub fn tables_used(tree: &QueryTree) -> Vec<String> {
    struct TableCollector {
        tables: Vec<String>,
    }

    impl Visitor for TableCollector {
        type Break = ();

        fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
            if let Some(ident) = relation.0.last() {
                if !self.tables.iter().any(|t| t == &ident.value) {
                    self.tables.push(ident.value.clone());
                }
            }
            ControlFlow::Continue(())
        }
    }

    let mut collector = TableCollector { tables: Vec::new() };
    for stmt in &tree.statements {
        let _ = Visit::visit(stmt, &mut collector);
    }
    collector.tables
}

/// Rewrite `tree` in place into canonical form.
///
/// # Errors
///
/// `TriageError::UnsupportedLiteral` when a literal falls outside the known
/// type classes. The tree is partially rewritten in that case and should be
/// discarded.
pub fn canonicalize(tree: &mut QueryTree, policy: LiteralPolicy) -> Result<RewriteStats> {
    let mut rewriter = Canonicalizer {
        policy,
        stats: RewriteStats::default(),
    };
    for stmt in &mut tree.statements {
        if let ControlFlow::Break(err) = VisitMut::visit(stmt, &mut rewriter) {
            return Err(err);
        }
    }
    Ok(rewriter.stats)
}

/// Parse, canonicalize and serialize in one step.
///
/// # Errors
///
/// Propagates parse and canonicalization errors.
pub fn canonical_form_of(text: &str, policy: LiteralPolicy) -> Result<String> {
    let mut tree = parse_statement(text)?;
    canonicalize(&mut tree, policy)?;
    Ok(tree.canonical_form())
}

struct Canonicalizer {
    policy: LiteralPolicy,
    stats: RewriteStats,
}

impl Canonicalizer {
    fn rewrite(&mut self, kind: NodeKind, apply: impl FnOnce()) {
        apply();
        self.stats.bump(kind);
    }

    fn rewrite_literal(&mut self, value: &mut Value) -> Result<()> {
        let Some(class) = LiteralClass::of(value)? else {
            return Ok(());
        };
        match self.policy {
            LiteralPolicy::Erase => {
                self.rewrite(NodeKind::Literal, || *value = class.placeholder());
            }
            LiteralPolicy::Preserve => {}
        }
        Ok(())
    }

    /// `DATE '2024-01-01'` and friends hold their value as a bare string.
    fn rewrite_typed_string(&mut self, value: &mut String) -> Result<()> {
        let mut literal = Value::SingleQuotedString(std::mem::take(value));
        let outcome = self.rewrite_literal(&mut literal);
        if let Value::SingleQuotedString(text) = literal {
            *value = text;
        }
        outcome
    }

    fn collapse_projection(&mut self, body: &mut SetExpr) {
        match body {
            SetExpr::Select(select) => {
                let already = matches!(select.projection.as_slice(), [SelectItem::Wildcard(_)]);
                if !already {
                    self.rewrite(NodeKind::Projection, || {
                        select.projection =
                            vec![SelectItem::Wildcard(WildcardAdditionalOptions::default())];
                    });
                }
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.collapse_projection(left);
                self.collapse_projection(right);
            }
            // Nested queries get their own pre_visit_query; the remaining
            // kinds carry no projection.
            _ => {}
        }
    }
}

fn table_alias_mut(factor: &mut TableFactor) -> Option<&mut TableAlias> {
    match factor {
        TableFactor::Table { alias, .. }
        | TableFactor::Derived { alias, .. }
        | TableFactor::TableFunction { alias, .. }
        | TableFactor::Function { alias, .. }
        | TableFactor::NestedJoin { alias, .. } => alias.as_mut(),
        _ => None,
    }
}

impl VisitorMut for Canonicalizer {
    type Break = TriageError;

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        self.collapse_projection(&mut query.body);
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &mut ObjectName) -> ControlFlow<Self::Break> {
        let already = matches!(relation.0.as_slice(), [ident] if ident.value == DUAL_TABLE);
        if !already {
            self.rewrite(NodeKind::TableReference, || {
                *relation = ObjectName(vec![Ident::new(DUAL_TABLE)]);
            });
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<Self::Break> {
        if let Some(alias) = table_alias_mut(factor) {
            self.rewrite(NodeKind::TableAlias, || {
                alias.name = Ident::new(PLACEHOLDER_NAME);
            });
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_statement(&mut self, stmt: &mut SqlStatement) -> ControlFlow<Self::Break> {
        let savepoint = match stmt {
            SqlStatement::Savepoint { name } | SqlStatement::ReleaseSavepoint { name } => {
                Some(name)
            }
            SqlStatement::Rollback { savepoint, .. } => savepoint.as_mut(),
            _ => None,
        };
        if let Some(name) = savepoint {
            self.rewrite(NodeKind::Savepoint, || *name = Ident::new(PLACEHOLDER_NAME));
        }
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        let outcome = match expr {
            Expr::Value(value) | Expr::IntroducedString { value, .. } => {
                self.rewrite_literal(value)
            }
            Expr::TypedString { value, .. } => self.rewrite_typed_string(value),
            _ => Ok(()),
        };
        match outcome {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(err),
        }
    }
}
