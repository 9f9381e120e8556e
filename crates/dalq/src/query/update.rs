//! UPDATE statement builder.

use std::fmt;

use crate::enclose::Enclosure;
use crate::query::IntoFragment;
use crate::query::insert::InsertOr;
use crate::query::where_clause::{Where, impl_where_methods};

/// UPDATE statement builder.
///
/// # Example
/// ```
/// let mut q = dalq::update();
/// q.table("users").set("status", "'inactive'").where_("id = ?");
/// assert_eq!(q.to_sql(), "UPDATE users SET status = 'inactive' WHERE id = ?");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Update {
    table: Option<String>,
    alternative: Option<InsertOr>,
    assignments: Vec<(String, String)>,
    filter: Where,
    enclosure: Enclosure,
}

impl_where_methods!(Update, filter);

impl Update {
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

    /// Set the updated table.
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(name.to_string());
        self
    }

    /// `UPDATE OR ROLLBACK`.
    pub fn rollback(&mut self) -> &mut Self {
        self.or_else(InsertOr::Rollback)
    }

    /// `UPDATE OR ABORT`.
    pub fn abort(&mut self) -> &mut Self {
        self.or_else(InsertOr::Abort)
    }

    /// `UPDATE OR REPLACE`.
    pub fn replace(&mut self) -> &mut Self {
        self.or_else(InsertOr::Replace)
    }

    /// `UPDATE OR FAIL`.
    pub fn fail(&mut self) -> &mut Self {
        self.or_else(InsertOr::Fail)
    }

    /// `UPDATE OR IGNORE`.
    pub fn ignore(&mut self) -> &mut Self {
        self.or_else(InsertOr::Ignore)
    }

    pub fn or_else(&mut self, alternative: InsertOr) -> &mut Self {
        self.alternative = Some(alternative);
        self
    }

    /// Assign a raw value expression (or a parenthesised sub-select) to a column.
    ///
    /// Setting the same column twice keeps its first position and the last value.
    pub fn set(&mut self, column: &str, value: impl IntoFragment) -> &mut Self {
        let value = value.into_fragment();
        match self.assignments.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.assignments.push((column.to_string(), value)),
        }
        self
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UPDATE")?;

        if let Some(alternative) = self.alternative {
            write!(f, " OR {}", alternative.as_str())?;
        }

        write!(
            f,
            " {}",
            self.enclosure.enclose(self.table.as_deref().unwrap_or_default())
        )?;

        if !self.assignments.is_empty() {
            let assignments: Vec<String> = self
                .assignments
                .iter()
                .map(|(column, value)| format!("{} = {}", self.enclosure.enclose(column), value))
                .collect();
            write!(f, " SET {}", assignments.join(", "))?;
        }

        write!(f, "{}", self.filter)
    }
}
