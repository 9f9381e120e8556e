//! # dalq
//!
//! Stateful SQL builders plus a random-access result cursor for drivers
//! that only stream forward.
//!
//! ## Features
//!
//! - **Builders, not an ORM**: `Select`, `Insert`, `Update` and `Delete` assemble SQL text and nothing else
//! - **Chainable WHERE**: `where_` / `and_where` / `or_where` with nested groups
//! - **Random-access results**: `ResultCursor` caches rows so `fetch_first`, `fetch_last` and `count` work on forward-only handles
//! - **Fetch styles**: maps, positional sets, JSON objects, class instances or a reused record
//! - **Named connections**: a caller-owned `ConnectionRegistry` with autoload
//! - **Statement hooks**: observe every prepared or queried statement
//!
//! ## Query builders
//!
//! ```
//! use dalq::{Select, insert};
//!
//! let mut q = Select::new();
//! q.from("users").where_("age > ?").and_where("active = 1").limit(10);
//! assert_eq!(q.to_sql(), "SELECT * FROM users WHERE age > ? AND active = 1 LIMIT 10");
//!
//! let mut ins = insert();
//! ins.into_table("users").on(["name", "age"]).values(["?", "?"]);
//! assert_eq!(ins.to_sql(), "INSERT INTO users (name, age) VALUES (?, ?)");
//! ```
//!
//! ## Result cursor
//!
//! ```
//! use dalq::memory::MemoryConnection;
//! use dalq::{Dal, Value};
//!
//! let conn = MemoryConnection::new().forward_only().with_result(
//!     "SELECT n FROM t",
//!     ["n"],
//!     vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
//! );
//! let mut dal = Dal::new("main", conn);
//! let mut cursor = dal.query("SELECT n FROM t")?;
//!
//! // Jump to the end, then come back: rows already read are served from cache.
//! assert!(cursor.fetch_last()?.is_some());
//! assert_eq!(cursor.fetch_all()?.len(), 3);
//! assert_eq!(cursor.count()?, 3);
//! # Ok::<(), dalq::DalError>(())
//! ```

pub mod config;
pub mod cursor;
pub mod dal;
pub mod enclose;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod pg;
pub mod query;
pub mod row;

pub use config::{ConnectionParams, DalConfig};
pub use cursor::{
    CursorKind, Direction, FetchMode, FetchStyle, Orientation, Record, ResultCursor, Rows,
    StartOffset,
};
pub use dal::{
    Connection, ConnectionRegistry, Dal, Driver, ErrorInfo, Param, ParamType, PrepareOptions,
    StatementHandle, quote_as, quote_literal,
};
pub use enclose::Enclosure;
pub use error::{DalError, DalResult};
pub use monitor::{Operation, QueryContext, QueryType, SqlHook};
pub use row::{FromRow, FromValue, Row, Value};

// Re-export the builders for easy access
pub use query::{
    Delete, Insert, IntoFragment, Join, JoinKind, QueryRegistry, Select, SelectCore, Update,
    Where, delete, insert, select, update, where_,
};

#[cfg(feature = "tracing")]
pub use monitor::TracingSqlHook;
