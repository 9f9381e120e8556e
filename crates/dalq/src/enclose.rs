//! Identifier enclosing.
//!
//! [`Enclosure`] wraps bare identifiers (columns, tables, ORDER BY / GROUP BY terms)
//! in configurable quoting symbols.
//!
//! - Disabled by default; symbols default to `"` on both sides.
//! - An identifier containing whitespace or `(` is treated as an expression
//!   (`COUNT(*)`, `t.a AS b`, a sub-select) and is returned untouched.
//!
//! # Example
//! ```
//! use dalq::Enclosure;
//!
//! let mut e = Enclosure::default();
//! assert_eq!(e.enclose("users"), "users");
//!
//! e.enable(true);
//! e.set_symbols("`", None);
//! assert_eq!(e.enclose("users"), "`users`");
//! assert_eq!(e.enclose("COUNT(id)"), "COUNT(id)");
//! ```

/// Quoting configuration shared by every builder that renders identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    enabled: bool,
    open: String,
    close: String,
}

impl Default for Enclosure {
    fn default() -> Self {
        Self {
            enabled: false,
            open: "\"".to_string(),
            close: "\"".to_string(),
        }
    }
}

impl Enclosure {
    /// Create an enabled enclosure with the given symbols.
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            enabled: true,
            open: open.to_string(),
            close: close.to_string(),
        }
    }

    /// Set the opening and closing symbols. `close` defaults to `open`.
    pub fn set_symbols(&mut self, open: &str, close: Option<&str>) -> &mut Self {
        self.open = open.to_string();
        self.close = close.unwrap_or(open).to_string();
        self
    }

    /// Enable or disable enclosing. Returns the previous state.
    pub fn enable(&mut self, enable: bool) -> bool {
        std::mem::replace(&mut self.enabled, enable)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn symbols(&self) -> (&str, &str) {
        (&self.open, &self.close)
    }

    /// Enclose one identifier.
    pub fn enclose(&self, identifier: &str) -> String {
        if !self.enabled || is_expression(identifier) {
            return identifier.to_string();
        }

        let mut out = String::with_capacity(identifier.len() + self.open.len() + self.close.len());
        out.push_str(&self.open);
        out.push_str(identifier);
        out.push_str(&self.close);
        out
    }

    /// Enclose every identifier of a list.
    pub fn enclose_all<S: AsRef<str>>(&self, identifiers: &[S]) -> Vec<String> {
        identifiers
            .iter()
            .map(|identifier| self.enclose(identifier.as_ref()))
            .collect()
    }

    /// Enclose every identifier of a list and join them with `", "`.
    pub(crate) fn enclose_joined<S: AsRef<str>>(&self, identifiers: &[S]) -> String {
        self.enclose_all(identifiers).join(", ")
    }
}

fn is_expression(identifier: &str) -> bool {
    identifier.chars().any(|c| c.is_whitespace() || c == '(')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let e = Enclosure::default();
        assert!(!e.is_enabled());
        assert_eq!(e.enclose("users"), "users");
    }

    #[test]
    fn enable_returns_previous_state() {
        let mut e = Enclosure::default();
        assert!(!e.enable(true));
        assert!(e.enable(false));
        assert!(!e.is_enabled());
    }

    #[test]
    fn close_symbol_defaults_to_open() {
        let mut e = Enclosure::default();
        assert_eq!(e.symbols(), ("\"", "\""));
        e.enable(true);
        e.set_symbols("`", None);
        assert_eq!(e.symbols(), ("`", "`"));
        assert_eq!(e.enclose("a"), "`a`");

        e.set_symbols("[", Some("]"));
        assert_eq!(e.symbols(), ("[", "]"));
        assert_eq!(e.enclose("a"), "[a]");
    }

    #[test]
    fn expressions_are_left_alone() {
        let e = Enclosure::new("\"", "\"");
        assert_eq!(e.enclose("COUNT(*)"), "COUNT(*)");
        assert_eq!(e.enclose("a AS b"), "a AS b");
        assert_eq!(e.enclose("a\tb"), "a\tb");
        assert_eq!(e.enclose("t.a"), "\"t.a\"");
    }

    #[test]
    fn enclose_list() {
        let e = Enclosure::new("[", "]");
        assert_eq!(e.enclose_all(&["a", "b c"]), vec!["[a]", "b c"]);
        assert_eq!(e.enclose_joined(&["a", "b"]), "[a], [b]");
    }
}
