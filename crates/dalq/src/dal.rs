//! Connection layer: the driver traits the cursor consumes, the [`Dal`]
//! wrapper that turns SQL into cursors, and a caller-owned
//! [`ConnectionRegistry`] of named connections.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::config::{ConnectionParams, DalConfig};
use crate::cursor::{CursorKind, Orientation, ResultCursor};
use crate::error::{DalError, DalResult};
use crate::monitor::{Operation, QueryContext, SqlHook};
use crate::row::{Row, Value};

/// A bind parameter: 1-based position or name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Param {
    Position(usize),
    Name(String),
}

impl From<usize> for Param {
    fn from(position: usize) -> Self {
        Param::Position(position)
    }
}

impl From<&str> for Param {
    fn from(name: &str) -> Self {
        Param::Name(name.to_string())
    }
}

/// Type hint for bound parameters and quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Null,
    Bool,
    Int,
    Str,
    Lob,
}

/// Structured error state of a connection or statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub sqlstate: String,
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self {
            sqlstate: "00000".to_string(),
            code: None,
            message: None,
        }
    }
}

impl From<&DalError> for ErrorInfo {
    fn from(err: &DalError) -> Self {
        match err {
            DalError::Driver {
                sqlstate,
                code,
                message,
            } => Self {
                sqlstate: sqlstate.clone(),
                code: Some(*code),
                message: Some(message.clone()),
            },
            other => Self {
                sqlstate: other.sqlstate().unwrap_or("HY000").to_string(),
                code: None,
                message: Some(other.to_string()),
            },
        }
    }
}

/// Options for [`Connection::prepare`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Requested cursor kind. `None` uses whatever the connection supports.
    pub cursor: Option<CursorKind>,
}

impl PrepareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(mut self, kind: CursorKind) -> Self {
        self.cursor = Some(kind);
        self
    }
}

/// A native prepared statement, as consumed by [`ResultCursor`].
///
/// Rows are returned raw; fetch styles are applied by the cursor.
pub trait StatementHandle {
    /// Run the statement. Empty `params` uses the bound parameters.
    fn execute(&mut self, params: &[Value]) -> DalResult<bool>;

    fn bind_parameter(
        &mut self,
        param: Param,
        value: Value,
        kind: Option<ParamType>,
        length: Option<usize>,
    ) -> DalResult<bool>;

    /// Move the native cursor and return the row landed on.
    fn fetch(&mut self, orientation: Orientation) -> DalResult<Option<Row>>;

    /// Every row after the native position.
    fn fetch_all(&mut self) -> DalResult<Vec<Row>>;

    /// One column of the next row.
    fn fetch_column(&mut self, index: usize) -> DalResult<Option<Value>>;

    /// Rows affected or returned by the last execution.
    ///
    /// Scrollable cursors use this to locate the last row. Drivers that
    /// report 0 for SELECT are handled by draining to the end instead.
    fn row_count(&mut self) -> DalResult<u64>;

    fn column_count(&self) -> usize;

    fn close_cursor(&mut self) -> DalResult<bool>;

    fn error_code(&self) -> Option<String>;

    fn error_info(&self) -> ErrorInfo;
}

/// A driver connection.
pub trait Connection {
    type Statement: StatementHandle;

    fn prepare(&mut self, sql: &str, options: &PrepareOptions) -> DalResult<Self::Statement>;

    /// Prepare and execute in one step.
    fn query(&mut self, sql: &str) -> DalResult<Self::Statement>;

    fn quote(&self, value: &Value, kind: Option<ParamType>) -> String {
        quote_as(value, kind)
    }

    fn begin_transaction(&mut self) -> DalResult<bool>;

    fn commit(&mut self) -> DalResult<bool>;

    fn roll_back(&mut self) -> DalResult<bool>;

    fn last_insert_id(&mut self, sequence: Option<&str>) -> DalResult<String>;

    fn get_attribute(&self, name: &str) -> DalResult<Value>;

    fn set_attribute(&mut self, name: &str, value: Value) -> DalResult<bool>;

    fn error_code(&self) -> Option<String>;

    fn error_info(&self) -> ErrorInfo;

    fn available_drivers(&self) -> Vec<String>;

    /// Which cursor kind statements of this connection support.
    ///
    /// An `Err` means the driver cannot answer; callers treat it as forward-only.
    fn cursor_kind(&self) -> DalResult<CursorKind>;
}

/// Render a value as an SQL literal.
pub fn quote_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => quote_text(s),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}

/// Render a value as an SQL literal of the hinted type.
pub fn quote_as(value: &Value, kind: Option<ParamType>) -> String {
    match (kind, value) {
        (_, Value::Null) | (Some(ParamType::Null), _) => "NULL".to_string(),
        (Some(ParamType::Str), Value::Text(_) | Value::Blob(_)) => quote_literal(value),
        (Some(ParamType::Str), other) => quote_text(&other.to_string()),
        _ => quote_literal(value),
    }
}

/// Remember the error of a failed driver call, forget it on success.
pub(crate) fn record_error<T>(slot: &mut Option<ErrorInfo>, result: DalResult<T>) -> DalResult<T> {
    *slot = result.as_ref().err().map(ErrorInfo::from);
    result
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// One named connection.
pub struct Dal<C> {
    id: String,
    connection: C,
    hook: Option<Arc<dyn SqlHook>>,
}

impl<C: fmt::Debug> fmt::Debug for Dal<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dal")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl<C: Connection> Dal<C> {
    pub fn new(id: impl Into<String>, connection: C) -> Self {
        Self {
            id: id.into(),
            connection,
            hook: None,
        }
    }

    /// Observe every statement handed to the driver.
    pub fn with_hook(mut self, hook: Arc<dyn SqlHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Prepare `sql` and wrap the handle in an unexecuted cursor.
    ///
    /// A scrollable cursor is used when the connection reports support for
    /// one and `options` does not ask for forward-only.
    pub fn prepare(
        &mut self,
        sql: &str,
        options: &PrepareOptions,
    ) -> DalResult<ResultCursor<C::Statement>> {
        self.notify(Operation::Prepare, sql);
        let kind = self.cursor_kind_for(options.cursor);
        let handle = self.connection.prepare(sql, &PrepareOptions { cursor: Some(kind) })?;
        Ok(ResultCursor::new(handle, kind))
    }

    /// Run `sql` and wrap the result in a cursor.
    pub fn query(&mut self, sql: &str) -> DalResult<ResultCursor<C::Statement>> {
        self.notify(Operation::Query, sql);
        let kind = self.cursor_kind_for(None);
        let handle = self.connection.query(sql)?;
        Ok(ResultCursor::new(handle, kind))
    }

    /// Run `sql` and return the affected row count.
    pub fn exec(&mut self, sql: &str) -> DalResult<u64> {
        self.query(sql)?.count()
    }

    pub fn quote(&self, value: &Value, kind: Option<ParamType>) -> String {
        self.connection.quote(value, kind)
    }

    pub fn begin_transaction(&mut self) -> DalResult<bool> {
        self.connection.begin_transaction()
    }

    pub fn commit(&mut self) -> DalResult<bool> {
        self.connection.commit()
    }

    pub fn roll_back(&mut self) -> DalResult<bool> {
        self.connection.roll_back()
    }

    pub fn last_insert_id(&mut self, sequence: Option<&str>) -> DalResult<String> {
        self.connection.last_insert_id(sequence)
    }

    pub fn get_attribute(&self, name: &str) -> DalResult<Value> {
        self.connection.get_attribute(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: Value) -> DalResult<bool> {
        self.connection.set_attribute(name, value)
    }

    pub fn error_code(&self) -> Option<String> {
        self.connection.error_code()
    }

    pub fn error_info(&self) -> ErrorInfo {
        self.connection.error_info()
    }

    pub fn available_drivers(&self) -> Vec<String> {
        self.connection.available_drivers()
    }

    fn notify(&self, operation: Operation, sql: &str) {
        if let Some(hook) = &self.hook {
            hook.before_statement(&QueryContext::new(&self.id, operation, sql));
        }
    }

    fn cursor_kind_for(&self, requested: Option<CursorKind>) -> CursorKind {
        if requested == Some(CursorKind::ForwardOnly) {
            return CursorKind::ForwardOnly;
        }
        match self.connection.cursor_kind() {
            Ok(kind) => kind,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    target: "dalq.connection",
                    connection = %self.id,
                    error = %err,
                    "cursor kind unavailable, using forward-only"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = err;
                CursorKind::ForwardOnly
            }
        }
    }
}

/// Opens a connection from its parameters.
pub type Driver<C> = Box<dyn Fn(&ConnectionParams) -> DalResult<C> + Send + Sync>;

/// Caller-owned set of named connections.
///
/// # Example
/// ```
/// use dalq::memory::MemoryConnection;
/// use dalq::{ConnectionParams, ConnectionRegistry, DalConfig};
///
/// let config = DalConfig::new()
///     .connection("main", ConnectionParams::new("memory", "memory:"))
///     .autoload("main");
///
/// let mut registry = ConnectionRegistry::new().with_config(config);
/// registry.register_driver("memory", |_| Ok(MemoryConnection::new()));
///
/// assert_eq!(registry.last()?.id(), "main");
/// # Ok::<(), dalq::DalError>(())
/// ```
pub struct ConnectionRegistry<C> {
    drivers: HashMap<String, Driver<C>>,
    config: DalConfig,
    connections: BTreeMap<String, Dal<C>>,
    last: Option<String>,
    hook: Option<Arc<dyn SqlHook>>,
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self {
            drivers: HashMap::new(),
            config: DalConfig::default(),
            connections: BTreeMap::new(),
            last: None,
            hook: None,
        }
    }
}

impl<C> fmt::Debug for ConnectionRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("open", &self.connections.keys().collect::<Vec<_>>())
            .field("last", &self.last)
            .finish()
    }
}

impl<C: Connection> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: DalConfig) -> Self {
        self.config = config;
        self
    }

    /// Hook attached to every connection opened afterwards.
    pub fn with_hook(mut self, hook: Arc<dyn SqlHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn config(&self) -> &DalConfig {
        &self.config
    }

    /// Register the factory used for connections whose `dal` is `name`.
    pub fn register_driver<F>(&mut self, name: &str, driver: F) -> &mut Self
    where
        F: Fn(&ConnectionParams) -> DalResult<C> + Send + Sync + 'static,
    {
        self.drivers.insert(name.to_string(), Box::new(driver));
        self
    }

    /// Open the configured connection `id`, or return it if already open.
    pub fn open(&mut self, id: &str) -> DalResult<&mut Dal<C>> {
        if !self.connections.contains_key(id) {
            let params = self.config.connections.get(id).cloned().ok_or_else(|| {
                DalError::configuration(format!("connection `{id}` is not configured"))
            })?;
            self.connect(id, &params)?;
        }
        self.activate(id)
    }

    /// Open `id` with explicit parameters, replacing an open connection of that id.
    pub fn open_with(&mut self, id: &str, params: ConnectionParams) -> DalResult<&mut Dal<C>> {
        self.connect(id, &params)?;
        self.activate(id)
    }

    pub fn get(&mut self, id: &str) -> Option<&mut Dal<C>> {
        self.connections.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// The most recently opened connection, or the autoload one.
    pub fn last(&mut self) -> DalResult<&mut Dal<C>> {
        let id = match (&self.last, &self.config.autoload) {
            (Some(id), _) | (None, Some(id)) => id.clone(),
            (None, None) => {
                return Err(DalError::configuration(
                    "no connection is open and no autoload connection is configured",
                ));
            }
        };
        self.open(&id)
    }

    /// Close and return the connection `id`.
    pub fn close(&mut self, id: &str) -> Option<Dal<C>> {
        let dal = self.connections.remove(id)?;
        if self.last.as_deref() == Some(id) {
            self.last = None;
        }
        log_closed(id);
        Some(dal)
    }

    /// Ids of the open connections, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn connect(&mut self, id: &str, params: &ConnectionParams) -> DalResult<()> {
        let driver = self.drivers.get(&params.dal).ok_or_else(|| {
            DalError::configuration(format!("driver `{}` is not registered", params.dal))
        })?;

        let mut params = params.clone();
        params.dsn = resolve_dsn(&params.dsn);
        let connection = driver(&params)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            target: "dalq.connection",
            connection = %id,
            dal = %params.dal,
            dsn = %params.dsn,
            username = %params.username,
            "connection opened"
        );

        let mut dal = Dal::new(id, connection);
        if let Some(hook) = &self.hook {
            dal = dal.with_hook(Arc::clone(hook));
        }
        if self.connections.insert(id.to_string(), dal).is_some() {
            log_closed(id);
        }
        Ok(())
    }

    fn activate(&mut self, id: &str) -> DalResult<&mut Dal<C>> {
        self.last = Some(id.to_string());
        self.connections
            .get_mut(id)
            .ok_or_else(|| DalError::configuration(format!("connection `{id}` is not open")))
    }
}

fn log_closed(id: &str) {
    #[cfg(feature = "tracing")]
    tracing::info!(target: "dalq.connection", connection = %id, "connection closed");
    #[cfg(not(feature = "tracing"))]
    let _ = id;
}

/// Make the path of an `sqlite:` DSN absolute. Other DSNs are returned as-is.
pub fn resolve_dsn(dsn: &str) -> String {
    let Some(path) = dsn.strip_prefix("sqlite:") else {
        return dsn.to_string();
    };
    if path.is_empty() || path.starts_with(':') {
        return dsn.to_string();
    }
    match std::path::absolute(path) {
        Ok(absolute) => format!("sqlite:{}", absolute.display()),
        Err(_) => dsn.to_string(),
    }
}
