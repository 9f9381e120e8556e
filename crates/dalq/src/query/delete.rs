//! DELETE statement builder.

use std::fmt;

use crate::enclose::Enclosure;
use crate::query::where_clause::{Where, impl_where_methods};

/// DELETE statement builder.
///
/// Unlike a guarded ORM delete, an empty WHERE renders a plain
/// `DELETE FROM table`: the builder only assembles text.
#[derive(Debug, Clone, Default)]
pub struct Delete {
    from: Option<String>,
    filter: Where,
    enclosure: Enclosure,
}

impl_where_methods!(Delete, filter);

impl Delete {
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

    /// Set the table rows are deleted from.
    pub fn from(&mut self, name: &str) -> &mut Self {
        self.from = Some(name.to_string());
        self
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Delete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DELETE FROM {}{}",
            self.enclosure.enclose(self.from.as_deref().unwrap_or_default()),
            self.filter
        )
    }
}
