//! Stateful SQL statement builders.
//!
//! Builders only assemble text: they never execute anything. Each renders
//! through `Display` / `to_sql()` and the result is handed verbatim to
//! [`crate::Dal::prepare`] or [`crate::Dal::query`].
//!
//! Fragments (predicates, value expressions, source names) are not parsed;
//! values belong in bind placeholders.
//!
//! # Usage
//!
//! ```
//! let mut q = dalq::Select::new();
//! q.from("a").union().from("b");
//! assert_eq!(q.to_sql(), "SELECT * FROM a UNION SELECT * FROM b");
//!
//! let mut q = dalq::select(["u.name", "o.total"]);
//! q.from("users")
//!     .as_("u")
//!     .left_join("orders o")?
//!     .on("o.user_id = u.id")
//!     .where_("o.total > 100")
//!     .or_where("u.vip = 1");
//! # Ok::<(), dalq::DalError>(())
//! ```

mod delete;
mod insert;
mod registry;
mod select;
mod update;
mod where_clause;

pub use delete::Delete;
pub use insert::{Insert, InsertOr, Values};
pub use registry::{QueryRegistry, Registered, Shared, Statement, StatementRef};
pub use select::{Join, JoinKind, Quantifier, Select, SelectCore, SetOperator, Source};
pub use update::Update;
pub use where_clause::{LogicOp, Predicate, Where};

/// Values accepted where a source or a value expression is expected.
///
/// Text is used verbatim; a [`Select`] is rendered and parenthesised.
pub trait IntoFragment {
    fn into_fragment(self) -> String;
}

impl IntoFragment for &str {
    fn into_fragment(self) -> String {
        self.to_string()
    }
}

impl IntoFragment for String {
    fn into_fragment(self) -> String {
        self
    }
}

impl IntoFragment for &String {
    fn into_fragment(self) -> String {
        self.clone()
    }
}

impl IntoFragment for &Select {
    fn into_fragment(self) -> String {
        format!("({self})")
    }
}

impl IntoFragment for &mut Select {
    fn into_fragment(self) -> String {
        format!("({self})")
    }
}

impl IntoFragment for Select {
    fn into_fragment(self) -> String {
        format!("({self})")
    }
}

/// Start a SELECT with the given columns (empty renders `*`).
pub fn select<I>(columns: I) -> Select
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    Select::with_columns(columns)
}

/// Start an INSERT.
pub fn insert() -> Insert {
    Insert::new()
}

/// Start an UPDATE.
pub fn update() -> Update {
    Update::new()
}

/// Start a DELETE.
pub fn delete() -> Delete {
    Delete::new()
}

/// Start a standalone WHERE clause, typically nested into another one.
pub fn where_(predicate: impl Into<Predicate>) -> Where {
    let mut clause = Where::new();
    clause.where_(predicate);
    clause
}
