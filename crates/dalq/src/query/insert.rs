//! INSERT statement builder.

use std::fmt;

use crate::enclose::Enclosure;
use crate::query::select::Select;

/// Alternative clause of `INSERT OR <KEYWORD>` / `UPDATE OR <KEYWORD>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOr {
    Rollback,
    Abort,
    Replace,
    Fail,
    Ignore,
}

impl InsertOr {
    pub fn as_str(self) -> &'static str {
        match self {
            InsertOr::Rollback => "ROLLBACK",
            InsertOr::Abort => "ABORT",
            InsertOr::Replace => "REPLACE",
            InsertOr::Fail => "FAIL",
            InsertOr::Ignore => "IGNORE",
        }
    }
}

/// Source of the inserted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Values {
    /// One entry per `VALUES` tuple, each a list of raw value expressions.
    Tuples(Vec<Vec<String>>),
    /// A rendered sub-select.
    Select(String),
}

impl Default for Values {
    fn default() -> Self {
        Values::Tuples(Vec::new())
    }
}

/// INSERT statement builder.
///
/// # Example
/// ```
/// let mut q = dalq::insert();
/// q.into_table("t").on(["a", "b"]).values([1, 2]);
/// assert_eq!(q.to_sql(), "INSERT INTO t (a, b) VALUES (1, 2)");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Insert {
    into: Option<String>,
    alternative: Option<InsertOr>,
    columns: Vec<String>,
    values: Values,
    default_values: bool,
    enclosure: Enclosure,
}

impl Insert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enclosure(&self) -> &Enclosure {
        &self.enclosure
    }

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

    /// Set the target table.
    pub fn into_table(&mut self, name: &str) -> &mut Self {
        self.into = Some(name.to_string());
        self
    }

    /// `INSERT OR ROLLBACK`.
    pub fn rollback(&mut self) -> &mut Self {
        self.or_else(InsertOr::Rollback)
    }

    /// `INSERT OR ABORT`.
    pub fn abort(&mut self) -> &mut Self {
        self.or_else(InsertOr::Abort)
    }

    /// `INSERT OR REPLACE`.
    pub fn replace(&mut self) -> &mut Self {
        self.or_else(InsertOr::Replace)
    }

    /// `INSERT OR FAIL`.
    pub fn fail(&mut self) -> &mut Self {
        self.or_else(InsertOr::Fail)
    }

    /// `INSERT OR IGNORE`.
    pub fn ignore(&mut self) -> &mut Self {
        self.or_else(InsertOr::Ignore)
    }

    /// Declare an alternative to plain `INSERT`. The last call wins.
    pub fn or_else(&mut self, alternative: InsertOr) -> &mut Self {
        self.alternative = Some(alternative);
        self
    }

    /// Append target columns.
    pub fn on<I>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Append one tuple of raw value expressions.
    ///
    /// Values are emitted verbatim; use bind placeholders for untrusted input.
    /// Calling this after [`Insert::values_select`] discards the sub-select.
    pub fn values<I>(&mut self, tuple: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let tuple: Vec<String> = tuple.into_iter().map(|v| v.to_string()).collect();
        match &mut self.values {
            Values::Tuples(tuples) => tuples.push(tuple),
            Values::Select(_) => self.values = Values::Tuples(vec![tuple]),
        }
        self
    }

    /// Insert the rows produced by a SELECT.
    pub fn values_select(&mut self, select: &Select) -> &mut Self {
        self.values = Values::Select(select.to_string());
        self
    }

    /// Use `DEFAULT VALUES`; columns and values are then ignored.
    pub fn default_values(&mut self) -> &mut Self {
        self.default_values = true;
        self
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("INSERT")?;

        if let Some(alternative) = self.alternative {
            write!(f, " OR {}", alternative.as_str())?;
        }

        write!(
            f,
            " INTO {}",
            self.enclosure.enclose(self.into.as_deref().unwrap_or_default())
        )?;

        if self.default_values {
            return f.write_str(" DEFAULT VALUES");
        }

        if !self.columns.is_empty() {
            write!(f, " ({})", self.enclosure.enclose_joined(&self.columns))?;
        }

        match &self.values {
            Values::Select(select) => write!(f, " {select}"),
            Values::Tuples(tuples) if tuples.is_empty() => Ok(()),
            Values::Tuples(tuples) => {
                let tuples: Vec<String> = tuples
                    .iter()
                    .map(|tuple| format!("({})", tuple.join(", ")))
                    .collect();
                write!(f, " VALUES {}", tuples.join(", "))
            }
        }
    }
}
