//! In-memory driver.
//!
//! Results are registered per SQL text up front; executing a statement
//! serves a copy of the registered rows. Statements count their native
//! calls in [`FetchStats`], which makes the cursor's cache behaviour
//! observable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::cursor::{CursorKind, Orientation, RowBuffer};
use crate::dal::{Connection, ErrorInfo, Param, ParamType, PrepareOptions, StatementHandle, record_error};
use crate::error::{DalError, DalResult};
use crate::monitor::QueryType;
use crate::row::{Row, Value, columns};

#[derive(Debug, Clone)]
struct MemoryResult {
    columns: Arc<[String]>,
    rows: Vec<Vec<Value>>,
    affected: Option<u64>,
}

type ResultTable = Arc<Mutex<HashMap<String, MemoryResult>>>;

/// Native calls made on one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub executions: usize,
    /// Single-row fetches, whatever their orientation.
    pub fetches: usize,
    pub bulk_fetches: usize,
    pub column_fetches: usize,
    /// Orientation of the latest single-row fetch.
    pub last_orientation: Option<Orientation>,
}

/// A connection serving registered results.
#[derive(Debug)]
pub struct MemoryConnection {
    results: ResultTable,
    scrollable: bool,
    counts_selects: bool,
    in_transaction: bool,
    attributes: BTreeMap<String, Value>,
    last_insert_id: Arc<AtomicU64>,
    last_error: Option<ErrorInfo>,
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self {
            results: Arc::default(),
            scrollable: true,
            counts_selects: true,
            in_transaction: false,
            attributes: BTreeMap::new(),
            last_insert_id: Arc::default(),
            last_error: None,
        }
    }
}

impl MemoryConnection {
    /// A connection whose statements are scrollable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the cursor-kind probe fail, as drivers without scrollable cursors do.
    pub fn forward_only(mut self) -> Self {
        self.scrollable = false;
        self
    }

    /// Report a row count of 0 for every result set, as SQLite does for SELECT.
    pub fn without_select_counts(mut self) -> Self {
        self.counts_selects = false;
        self
    }

    /// Register the rows returned for `sql`.
    pub fn with_result<C, R>(self, sql: &str, column_names: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        self.set_result(sql, column_names, rows);
        self
    }

    /// Register an affected-row count for a statement returning no rows.
    pub fn with_affected(self, sql: &str, affected: u64) -> Self {
        self.table().insert(
            sql.to_string(),
            MemoryResult {
                columns: columns(Vec::<String>::new()),
                rows: Vec::new(),
                affected: Some(affected),
            },
        );
        self
    }

    /// Replace the rows returned for `sql`; prepared statements see them on their next execute.
    pub fn set_result<C, R>(&self, sql: &str, column_names: C, rows: R)
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        self.table().insert(
            sql.to_string(),
            MemoryResult {
                columns: columns(column_names),
                rows: rows.into_iter().collect(),
                affected: None,
            },
        );
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transaction(&mut self, open: bool) -> DalResult<bool> {
        let result = if self.in_transaction == open {
            let message = if open {
                "There is already an active transaction"
            } else {
                "There is no active transaction"
            };
            Err(DalError::driver("25000", 0, message))
        } else {
            self.in_transaction = open;
            Ok(true)
        };
        record_error(&mut self.last_error, result)
    }
}

impl Connection for MemoryConnection {
    type Statement = MemoryStatement;

    fn prepare(&mut self, sql: &str, options: &PrepareOptions) -> DalResult<MemoryStatement> {
        self.last_error = None;
        Ok(MemoryStatement {
            sql: sql.to_string(),
            query_type: QueryType::from_sql(sql),
            results: Arc::clone(&self.results),
            last_insert_id: Arc::clone(&self.last_insert_id),
            scrollable: self.scrollable && options.cursor == Some(CursorKind::Scrollable),
            counts_selects: self.counts_selects,
            params: BTreeMap::new(),
            last_params: Vec::new(),
            buffer: None,
            affected: 0,
            stats: FetchStats::default(),
            last_error: None,
        })
    }

    fn query(&mut self, sql: &str) -> DalResult<MemoryStatement> {
        let options = PrepareOptions::new().cursor(if self.scrollable {
            CursorKind::Scrollable
        } else {
            CursorKind::ForwardOnly
        });
        let mut statement = self.prepare(sql, &options)?;
        let executed = statement.execute(&[]);
        record_error(&mut self.last_error, executed)?;
        Ok(statement)
    }

    fn begin_transaction(&mut self) -> DalResult<bool> {
        self.transaction(true)
    }

    fn commit(&mut self) -> DalResult<bool> {
        self.transaction(false)
    }

    fn roll_back(&mut self) -> DalResult<bool> {
        self.transaction(false)
    }

    fn last_insert_id(&mut self, _sequence: Option<&str>) -> DalResult<String> {
        Ok(self.last_insert_id.load(Ordering::Relaxed).to_string())
    }

    fn get_attribute(&self, name: &str) -> DalResult<Value> {
        match name {
            "driver_name" => Ok(Value::from("memory")),
            _ => self
                .attributes
                .get(name)
                .cloned()
                .ok_or_else(|| DalError::unsupported(format!("attribute `{name}`"))),
        }
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> DalResult<bool> {
        self.attributes.insert(name.to_string(), value);
        Ok(true)
    }

    fn error_code(&self) -> Option<String> {
        self.last_error.as_ref().map(|info| info.sqlstate.clone())
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.clone().unwrap_or_default()
    }

    fn available_drivers(&self) -> Vec<String> {
        vec!["memory".to_string()]
    }

    fn cursor_kind(&self) -> DalResult<CursorKind> {
        if self.scrollable {
            Ok(CursorKind::Scrollable)
        } else {
            Err(DalError::unsupported("cursor type attribute"))
        }
    }
}

/// A statement of a [`MemoryConnection`].
#[derive(Debug)]
pub struct MemoryStatement {
    sql: String,
    query_type: QueryType,
    results: ResultTable,
    last_insert_id: Arc<AtomicU64>,
    scrollable: bool,
    counts_selects: bool,
    params: BTreeMap<Param, Value>,
    last_params: Vec<Value>,
    buffer: Option<RowBuffer>,
    affected: u64,
    stats: FetchStats,
    last_error: Option<ErrorInfo>,
}

impl MemoryStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_scrollable(&self) -> bool {
        self.scrollable
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Parameters used by the last execution.
    pub fn last_params(&self) -> &[Value] {
        &self.last_params
    }

    fn buffer(&mut self) -> DalResult<&mut RowBuffer> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| DalError::driver("HY010", 0, "statement is not executed"));
        match buffer {
            Ok(buffer) => Ok(buffer),
            Err(err) => {
                self.last_error = Some(ErrorInfo::from(&err));
                Err(err)
            }
        }
    }

    fn run(&mut self, params: &[Value]) -> DalResult<bool> {
        let result = self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.sql)
            .cloned()
            .ok_or_else(|| {
                DalError::driver("42S02", 1, format!("no result registered for `{}`", self.sql))
            })?;

        self.last_params = if params.is_empty() {
            self.params.values().cloned().collect()
        } else {
            params.to_vec()
        };
        let selected = if self.counts_selects {
            result.rows.len() as u64
        } else {
            0
        };
        self.affected = result.affected.unwrap_or(selected);
        self.buffer = Some(RowBuffer::new(result.columns, result.rows));
        self.stats.executions += 1;

        if self.query_type == QueryType::Insert {
            self.last_insert_id.fetch_add(self.affected.max(1), Ordering::Relaxed);
        }
        Ok(true)
    }
}

impl StatementHandle for MemoryStatement {
    fn execute(&mut self, params: &[Value]) -> DalResult<bool> {
        let result = self.run(params);
        record_error(&mut self.last_error, result)
    }

    fn bind_parameter(
        &mut self,
        param: Param,
        value: Value,
        kind: Option<ParamType>,
        _length: Option<usize>,
    ) -> DalResult<bool> {
        let value = match kind {
            Some(ParamType::Null) => Value::Null,
            _ => value,
        };
        self.params.insert(param, value);
        Ok(true)
    }

    fn fetch(&mut self, orientation: Orientation) -> DalResult<Option<Row>> {
        if !self.scrollable && orientation != Orientation::Next {
            let err = DalError::unsupported(format!(
                "{orientation:?} fetch on a forward-only statement"
            ));
            self.last_error = Some(ErrorInfo::from(&err));
            return Err(err);
        }
        let row = self.buffer()?.fetch(orientation);
        self.stats.fetches += 1;
        self.stats.last_orientation = Some(orientation);
        Ok(row)
    }

    fn fetch_all(&mut self) -> DalResult<Vec<Row>> {
        let rows = self.buffer()?.fetch_rest();
        self.stats.bulk_fetches += 1;
        Ok(rows)
    }

    fn fetch_column(&mut self, index: usize) -> DalResult<Option<Value>> {
        let value = self.buffer()?.fetch_column(index);
        self.stats.column_fetches += 1;
        Ok(value)
    }

    fn row_count(&mut self) -> DalResult<u64> {
        self.buffer()?;
        Ok(self.affected)
    }

    fn column_count(&self) -> usize {
        self.buffer.as_ref().map_or(0, |buffer| buffer.columns().len())
    }

    fn close_cursor(&mut self) -> DalResult<bool> {
        self.buffer = None;
        Ok(true)
    }

    fn error_code(&self) -> Option<String> {
        self.last_error.as_ref().map(|info| info.sqlstate.clone())
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers() -> MemoryConnection {
        MemoryConnection::new().with_result(
            "SELECT n FROM t",
            ["n"],
            (0..3).map(|n| vec![Value::Int(n)]),
        )
    }

    #[test]
    fn forward_only_rejects_scrolling() {
        let mut conn = numbers().forward_only();
        assert!(conn.cursor_kind().is_err());

        let mut stmt = conn.query("SELECT n FROM t").unwrap();
        assert!(!stmt.is_scrollable());
        assert!(stmt.fetch(Orientation::Next).unwrap().is_some());
        let err = stmt.fetch(Orientation::First).unwrap_err();
        assert!(matches!(err, DalError::Unsupported(_)));
        assert!(stmt.error_code().is_some());
    }

    #[test]
    fn fetch_before_execute_is_a_driver_error() {
        let mut conn = numbers();
        let mut stmt = conn
            .prepare("SELECT n FROM t", &PrepareOptions::new())
            .unwrap();
        let err = stmt.fetch(Orientation::Next).unwrap_err();
        assert_eq!(err.sqlstate(), Some("HY010"));
        assert_eq!(stmt.error_info().sqlstate, "HY010");
    }

    #[test]
    fn unknown_sql_fails_on_execute() {
        let mut conn = numbers();
        let err = conn.query("SELECT nothing").unwrap_err();
        assert_eq!(err.sqlstate(), Some("42S02"));
        assert_eq!(conn.error_code().as_deref(), Some("42S02"));
    }

    #[test]
    fn bound_parameters_are_used_without_explicit_ones() {
        let mut conn = numbers();
        let mut stmt = conn
            .prepare("SELECT n FROM t", &PrepareOptions::new())
            .unwrap();
        stmt.bind_parameter(Param::Position(2), Value::Int(9), None, None)
            .unwrap();
        stmt.bind_parameter(Param::Position(1), Value::from("a"), Some(ParamType::Null), None)
            .unwrap();
        stmt.execute(&[]).unwrap();
        assert_eq!(stmt.last_params(), &[Value::Null, Value::Int(9)]);

        stmt.execute(&[Value::Int(1)]).unwrap();
        assert_eq!(stmt.last_params(), &[Value::Int(1)]);
        assert_eq!(stmt.stats().executions, 2);
    }

    #[test]
    fn transactions_and_insert_ids() {
        let mut conn = MemoryConnection::new().with_affected("INSERT INTO t DEFAULT VALUES", 1);
        assert!(conn.begin_transaction().unwrap());
        assert!(conn.begin_transaction().is_err());
        assert!(conn.in_transaction());

        let mut stmt = conn.query("INSERT INTO t DEFAULT VALUES").unwrap();
        assert_eq!(stmt.row_count().unwrap(), 1);
        assert_eq!(conn.last_insert_id(None).unwrap(), "1");

        assert!(conn.commit().unwrap());
        assert!(conn.roll_back().is_err());
    }

    #[test]
    fn attributes() {
        let mut conn = MemoryConnection::new();
        assert_eq!(conn.get_attribute("driver_name").unwrap(), Value::from("memory"));
        assert!(conn.get_attribute("timeout").is_err());
        conn.set_attribute("timeout", Value::Int(5)).unwrap();
        assert_eq!(conn.get_attribute("timeout").unwrap(), Value::Int(5));
    }
}
