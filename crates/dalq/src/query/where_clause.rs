//! Shared WHERE clause builder for SELECT, UPDATE, DELETE.

use std::fmt;

/// Logic operator joining two predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicOp {
    #[default]
    And,
    Or,
}

impl LogicOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        }
    }
}

/// One predicate handed to [`Where::where_`].
///
/// Raw fragments are emitted verbatim; a nested [`Where`] is parenthesised.
#[derive(Debug, Clone)]
pub enum Predicate {
    Raw(String),
    Group(Where),
}

impl Predicate {
    pub(crate) fn render(&self) -> String {
        match self {
            Predicate::Raw(sql) => sql.clone(),
            Predicate::Group(group) => format!("({})", group.conditions()),
        }
    }
}

impl From<&str> for Predicate {
    fn from(sql: &str) -> Self {
        Predicate::Raw(sql.to_string())
    }
}

impl From<String> for Predicate {
    fn from(sql: String) -> Self {
        Predicate::Raw(sql)
    }
}

impl From<&String> for Predicate {
    fn from(sql: &String) -> Self {
        Predicate::Raw(sql.clone())
    }
}

impl From<Where> for Predicate {
    fn from(group: Where) -> Self {
        Predicate::Group(group)
    }
}

impl From<&Where> for Predicate {
    fn from(group: &Where) -> Self {
        Predicate::Group(group.clone())
    }
}

impl From<&mut Where> for Predicate {
    fn from(group: &mut Where) -> Self {
        Predicate::Group(group.clone())
    }
}

/// Reusable WHERE clause builder.
///
/// Entries are stored already prefixed with their logic operator, so the
/// rendering is a plain join. The pending operator applies to the next
/// `where_` call only and then falls back to AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Where {
    entries: Vec<String>,
    pending: Option<LogicOp>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate, joined with the pending operator (AND by default).
    pub fn where_(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
        let fragment = predicate.into().render();
        let op = self.pending.take().unwrap_or_default();

        if self.entries.is_empty() {
            self.entries.push(fragment);
        } else {
            self.entries.push(format!("{} {}", op.as_str(), fragment));
        }
        self
    }

    /// Add a predicate joined with AND.
    pub fn and_where(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
        self.pending = Some(LogicOp::And);
        self.where_(predicate)
    }

    /// Add a predicate joined with OR.
    pub fn or_where(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
        self.pending = Some(LogicOp::Or);
        self.where_(predicate)
    }

    /// Make the next `where_` join with AND.
    pub fn and(&mut self) -> &mut Self {
        self.pending = Some(LogicOp::And);
        self
    }

    /// Make the next `where_` join with OR.
    pub fn or(&mut self) -> &mut Self {
        self.pending = Some(LogicOp::Or);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every predicate.
    pub fn reset(&mut self) -> &mut Self {
        self.entries.clear();
        self.pending = None;
        self
    }

    /// The joined predicates without the `WHERE` keyword.
    pub fn conditions(&self) -> String {
        self.entries.join(" ")
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return Ok(());
        }
        write!(f, " WHERE {}", self.conditions())
    }
}

/// Builders that embed a [`Where`] get the fluent WHERE methods for free.
macro_rules! impl_where_methods {
    ($ty:ty, $($field:ident).+) => {
        impl $ty {
            /// Add a WHERE predicate, joined with the pending operator (AND by default).
            pub fn where_(&mut self, predicate: impl Into<$crate::query::Predicate>) -> &mut Self {
                self.$($field).+.where_(predicate);
                self
            }

            /// Add a WHERE predicate joined with AND.
            pub fn and_where(
                &mut self,
                predicate: impl Into<$crate::query::Predicate>,
            ) -> &mut Self {
                self.$($field).+.and_where(predicate);
                self
            }

            /// Add a WHERE predicate joined with OR.
            pub fn or_where(&mut self, predicate: impl Into<$crate::query::Predicate>) -> &mut Self {
                self.$($field).+.or_where(predicate);
                self
            }

            /// Make the next `where_` join with AND.
            pub fn and(&mut self) -> &mut Self {
                self.$($field).+.and();
                self
            }

            /// Make the next `where_` join with OR.
            pub fn or(&mut self) -> &mut Self {
                self.$($field).+.or();
                self
            }
        }
    };
}

pub(crate) use impl_where_methods;
