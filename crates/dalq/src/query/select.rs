//! SELECT query builder.
//!
//! [`SelectCore`] holds one `SELECT ... FROM ... WHERE ... GROUP BY ... HAVING`
//! branch. [`Select`] owns the current core plus everything that applies to the
//! whole statement: composed branches (UNION/INTERSECT/EXCEPT), ORDER BY, LIMIT
//! and OFFSET.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::enclose::Enclosure;
use crate::error::{DalError, DalResult};
use crate::query::where_clause::{Predicate, Where, impl_where_methods};
use crate::query::IntoFragment;

/// `SELECT DISTINCT` or `SELECT ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Distinct,
    All,
}

impl Quantifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Quantifier::Distinct => "DISTINCT",
            Quantifier::All => "ALL",
        }
    }
}

/// Compound operator between two SELECT branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl SetOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            SetOperator::Union => "UNION",
            SetOperator::UnionAll => "UNION ALL",
            SetOperator::Intersect => "INTERSECT",
            SetOperator::Except => "EXCEPT",
        }
    }
}

/// JOIN keyword family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Join,
    NaturalJoin,
    LeftJoin,
    NaturalLeftJoin,
    LeftOuterJoin,
    NaturalLeftOuterJoin,
    InnerJoin,
    NaturalInnerJoin,
    CrossJoin,
    NaturalCrossJoin,
}

impl JoinKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinKind::Join => "JOIN",
            JoinKind::NaturalJoin => "NATURAL JOIN",
            JoinKind::LeftJoin => "LEFT JOIN",
            JoinKind::NaturalLeftJoin => "NATURAL LEFT JOIN",
            JoinKind::LeftOuterJoin => "LEFT OUTER JOIN",
            JoinKind::NaturalLeftOuterJoin => "NATURAL LEFT OUTER JOIN",
            JoinKind::InnerJoin => "INNER JOIN",
            JoinKind::NaturalInnerJoin => "NATURAL INNER JOIN",
            JoinKind::CrossJoin => "CROSS JOIN",
            JoinKind::NaturalCrossJoin => "NATURAL CROSS JOIN",
        }
    }
}

/// One FROM entry. Joins rewrite `expr` in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub expr: String,
    pub alias: Option<String>,
}

/// State of one SELECT branch.
///
/// Composition takes this struct out of the [`Select`] (leaving a default one
/// behind), so a cleared branch is never rendered by mistake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectCore {
    columns: Vec<String>,
    quantifier: Option<Quantifier>,
    sources: Vec<Source>,
    filter: Where,
    group_by: Vec<String>,
    having: Option<String>,
}

impl SelectCore {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        *self == SelectCore::default()
    }

    pub(crate) fn render(&self, enclosure: &Enclosure) -> String {
        let mut out = String::from("SELECT");

        if let Some(quantifier) = self.quantifier {
            out.push(' ');
            out.push_str(quantifier.as_str());
        }

        if self.columns.is_empty() {
            out.push_str(" *");
        } else {
            out.push(' ');
            out.push_str(&enclosure.enclose_joined(&self.columns));
        }

        if !self.sources.is_empty() {
            let sources: Vec<String> = self
                .sources
                .iter()
                .map(|source| match &source.alias {
                    Some(alias) => format!(
                        "{} AS {}",
                        enclosure.enclose(&source.expr),
                        enclosure.enclose(alias)
                    ),
                    None => enclosure.enclose(&source.expr),
                })
                .collect();
            out.push_str(" FROM ");
            out.push_str(&sources.join(", "));
        }

        out.push_str(&self.filter.to_string());

        if !self.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            out.push_str(&enclosure.enclose_joined(&self.group_by));

            if let Some(having) = self.having.as_deref().filter(|h| !h.is_empty()) {
                out.push_str(" HAVING ");
                out.push_str(having);
            }
        }

        out
    }
}

/// SELECT statement builder.
///
/// # Example
/// ```
/// let mut q = dalq::select(["a", "b"]);
/// q.from("t").where_("a = 1").order_by(["a"]).limit(10);
/// assert_eq!(q.to_sql(), "SELECT a, b FROM t WHERE a = 1 ORDER BY a LIMIT 10");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Select {
    core: SelectCore,
    compound: Vec<String>,
    order_by: Vec<String>,
    limit: Vec<u64>,
    offset: Option<String>,
    enclosure: Enclosure,
}

impl_where_methods!(Select, core.filter);

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a SELECT with an initial column list.
    pub fn with_columns<I>(columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut select = Self::new();
        select.select(columns);
        select
    }

    // ==================== Enclosing ====================

    pub fn enclosure(&self) -> &Enclosure {
        &self.enclosure
    }

    /// Replace the whole enclosing configuration.
    pub fn set_enclosure(&mut self, enclosure: Enclosure) -> &mut Self {
        self.enclosure = enclosure;
        self
    }

    /// Set enclose symbols. `close` defaults to `open`.
    pub fn set_enclose_symbol(&mut self, open: &str, close: Option<&str>) -> &mut Self {
        self.enclosure.set_symbols(open, close);
        self
    }

    /// Enable or disable identifier enclosing. Returns the previous state.
    pub fn enable_enclose_identifier(&mut self, enable: bool) -> bool {
        self.enclosure.enable(enable)
    }

    // ==================== Core ====================

    /// Make a `SELECT DISTINCT`.
    pub fn distinct(&mut self) -> &mut Self {
        self.core.quantifier = Some(Quantifier::Distinct);
        self
    }

    /// Make a `SELECT ALL`.
    pub fn all(&mut self) -> &mut Self {
        self.core.quantifier = Some(Quantifier::All);
        self
    }

    /// Append columns.
    pub fn select<I>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.core.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Append a source. Sub-selects are parenthesised.
    pub fn from(&mut self, source: impl IntoFragment) -> &mut Self {
        self.core.sources.push(Source {
            expr: source.into_fragment(),
            alias: None,
        });
        self
    }

    /// Alias the last declared source. No-op without a source.
    pub fn as_(&mut self, alias: &str) -> &mut Self {
        if let Some(last) = self.core.sources.last_mut() {
            last.alias = Some(alias.to_string());
        }
        self
    }

    /// Append GROUP BY expressions.
    pub fn group_by<I>(&mut self, expressions: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.core
            .group_by
            .extend(expressions.into_iter().map(Into::into));
        self
    }

    /// Set the HAVING expression (rendered only together with GROUP BY).
    pub fn having(&mut self, expression: &str) -> &mut Self {
        self.core.having = Some(expression.to_string());
        self
    }

    pub fn core(&self) -> &SelectCore {
        &self.core
    }

    // ==================== JOIN ====================

    pub fn join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::Join, source)
    }

    pub fn natural_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::NaturalJoin, source)
    }

    pub fn left_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::LeftJoin, source)
    }

    pub fn natural_left_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::NaturalLeftJoin, source)
    }

    pub fn left_outer_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::LeftOuterJoin, source)
    }

    pub fn natural_left_outer_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::NaturalLeftOuterJoin, source)
    }

    pub fn inner_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::InnerJoin, source)
    }

    pub fn natural_inner_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::NaturalInnerJoin, source)
    }

    pub fn cross_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::CrossJoin, source)
    }

    pub fn natural_cross_join(&mut self, source: impl IntoFragment) -> DalResult<Join<'_>> {
        self.join_as(JoinKind::NaturalCrossJoin, source)
    }

    /// Join a source onto the last FROM entry.
    ///
    /// Fails with a builder error when no FROM source was declared.
    pub fn join_as(&mut self, kind: JoinKind, source: impl IntoFragment) -> DalResult<Join<'_>> {
        let joined = source.into_fragment();
        let enclosure = &self.enclosure;
        let Some(last) = self.core.sources.last_mut() else {
            return Err(DalError::builder("Cannot join if there is no `FROM` set."));
        };

        last.expr = format!(
            "{} {} {}",
            enclosure.enclose(&last.expr),
            kind.as_str(),
            enclosure.enclose(&joined)
        );

        Ok(Join { select: self })
    }

    // ==================== Composition ====================

    /// Close the current branch with `UNION` and start a new one.
    pub fn union(&mut self) -> &mut Self {
        self.compose(SetOperator::Union)
    }

    /// Close the current branch with `UNION ALL` and start a new one.
    pub fn union_all(&mut self) -> &mut Self {
        self.compose(SetOperator::UnionAll)
    }

    /// Close the current branch with `INTERSECT` and start a new one.
    pub fn intersect(&mut self) -> &mut Self {
        self.compose(SetOperator::Intersect)
    }

    /// Close the current branch with `EXCEPT` and start a new one.
    pub fn except(&mut self) -> &mut Self {
        self.compose(SetOperator::Except)
    }

    /// ORDER BY, LIMIT and OFFSET are statement-wide and survive composition.
    pub fn compose(&mut self, operator: SetOperator) -> &mut Self {
        let branch = std::mem::take(&mut self.core);
        self.compound.push(format!(
            "{} {}",
            branch.render(&self.enclosure),
            operator.as_str()
        ));
        self
    }

    // ==================== Ordering & pagination ====================

    /// Append ordering terms.
    pub fn order_by<I>(&mut self, terms: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.order_by.extend(terms.into_iter().map(Into::into));
        self
    }

    /// Append a limit expression.
    ///
    /// Two limits without an offset render in the comma form `LIMIT a, b`.
    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.limit.push(n);
        self
    }

    /// Set the offset expression (a number or a placeholder).
    pub fn offset(&mut self, expression: impl fmt::Display) -> &mut Self {
        self.offset = Some(expression.to_string());
        self
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.compound.is_empty() {
            f.write_str(&self.compound.join(" "))?;
            f.write_str(" ")?;
        }

        f.write_str(&self.core.render(&self.enclosure))?;

        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", self.enclosure.enclose_joined(&self.order_by))?;
        }

        if let Some(first) = self.limit.first() {
            match &self.offset {
                Some(offset) => write!(f, " LIMIT {first} OFFSET {offset}")?,
                None => {
                    let limits: Vec<String> = self.limit.iter().map(u64::to_string).collect();
                    write!(f, " LIMIT {}", limits.join(", "))?;
                }
            }
        }

        Ok(())
    }
}

/// Handle returned by the JOIN family, bound to the joined [`Select`].
///
/// `on`/`using` constrain the join; any other `Select` method is reachable
/// through `Deref`.
pub struct Join<'a> {
    select: &'a mut Select,
}

impl<'a> Join<'a> {
    /// Append ` ON <predicate>` to the joined source.
    pub fn on(self, predicate: impl Into<Predicate>) -> &'a mut Select {
        let constraint = predicate.into().render();
        self.constrain(format!(" ON {constraint}"))
    }

    /// Append ` USING (a, b)` to the joined source.
    pub fn using<I>(self, columns: I) -> &'a mut Select
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.constrain(format!(" USING ({})", columns.join(", ")))
    }

    /// Leave the join unconstrained.
    pub fn done(self) -> &'a mut Select {
        self.select
    }

    fn constrain(self, suffix: String) -> &'a mut Select {
        if let Some(last) = self.select.core.sources.last_mut() {
            last.expr.push_str(&suffix);
        }
        self.select
    }
}

impl Deref for Join<'_> {
    type Target = Select;

    fn deref(&self) -> &Select {
        self.select
    }
}

impl DerefMut for Join<'_> {
    fn deref_mut(&mut self) -> &mut Select {
        self.select
    }
}
