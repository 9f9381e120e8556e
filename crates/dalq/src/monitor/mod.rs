//! Hooks observing the SQL handed to a connection.
//!
//! A [`SqlHook`] attached with [`crate::Dal::with_hook`] sees every statement
//! before it reaches the driver's `prepare` or `query`.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use dalq::memory::MemoryConnection;
//! use dalq::monitor::{QueryContext, QueryType, SqlHook};
//! use dalq::{Dal, Value};
//!
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<QueryType>>);
//!
//! impl SqlHook for Recorder {
//!     fn before_statement(&self, ctx: &QueryContext) {
//!         self.0.lock().unwrap().push(ctx.query_type);
//!     }
//! }
//!
//! let recorder = Arc::new(Recorder::default());
//! let conn = MemoryConnection::new().with_result("SELECT 1", ["one"], [vec![Value::Int(1)]]);
//! let mut dal = Dal::new("main", conn).with_hook(recorder.clone());
//! dal.query("SELECT 1")?;
//! assert_eq!(*recorder.0.lock().unwrap(), vec![QueryType::Select]);
//! # Ok::<(), dalq::DalError>(())
//! ```

mod types;

#[cfg(feature = "tracing")]
mod tracing_hook;

pub use types::{Operation, QueryContext, QueryType, SqlHook};

#[cfg(feature = "tracing")]
pub use tracing_hook::TracingSqlHook;

/// Cut `sql` to at most `max_bytes`, on a char boundary.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
