//! Postgres driver on top of `tokio-postgres`.
//!
//! The public API stays blocking: every connection owns a private
//! current-thread runtime and drives the client with `block_on`. A statement
//! buffers its whole result on execute, so handles are natively scrollable.
//!
//! Builders emit `?` placeholders; they are numbered (`$1`, `$2`, ...) before
//! the SQL reaches the server. Only positional parameters are supported.
//!
//! # Example
//! ```ignore
//! use dalq::pg::PgConnection;
//! use dalq::{ConnectionParams, Dal, Value};
//!
//! let params = ConnectionParams::new("pgsql", "pgsql:host=localhost;dbname=app")
//!     .credentials("app", "secret");
//! let mut dal = Dal::new("main", PgConnection::connect(&params)?);
//!
//! let mut cursor = dal.prepare("SELECT id, name FROM users WHERE id > ?", &Default::default())?;
//! cursor.execute(&[Value::Int(10)])?;
//! for row in cursor.rows() {
//!     println!("{:?}", row?.to_json());
//! }
//! ```

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use futures_util::{TryStreamExt, pin_mut};
use tokio::runtime::Runtime;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, NoTls, Statement};

use crate::config::ConnectionParams;
use crate::cursor::{CursorKind, Orientation, RowBuffer};
use crate::dal::{Connection, ErrorInfo, Param, ParamType, PrepareOptions, StatementHandle, record_error};
use crate::error::{DalError, DalResult};
use crate::row::{Row, Value};

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => {
                if *ty == Type::INT2 {
                    i16::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::OID {
                    u32::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    (*i as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*i as f64).to_sql(ty, out)
                } else if *ty == Type::INT8 {
                    i.to_sql(ty, out)
                } else {
                    i.to_string().to_sql(ty, out)
                }
            }
            Value::Float(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    f.to_sql(ty, out)
                } else {
                    f.to_string().to_sql(ty, out)
                }
            }
            Value::Text(s) => s.to_sql(ty, out),
            Value::Blob(b) => b.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Build a client configuration from connection parameters.
///
/// Accepts libpq key/value strings, `postgres://` URLs and PDO-style
/// `pgsql:host=...;dbname=...` DSNs.
pub fn client_config(params: &ConnectionParams) -> DalResult<tokio_postgres::Config> {
    let dsn = match params.dsn.strip_prefix("pgsql:") {
        Some(pairs) => pairs.replace(';', " "),
        None => params.dsn.clone(),
    };
    let mut config: tokio_postgres::Config = dsn
        .parse()
        .map_err(|e| DalError::configuration(format!("invalid postgres dsn: {e}")))?;
    if !params.username.is_empty() {
        config.user(&params.username);
    }
    if !params.password.is_empty() {
        config.password(&params.password);
    }
    Ok(config)
}

/// Replace `?` placeholders with `$1`, `$2`, ... outside quoted text.
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut n = 0;

    for c in sql.chars() {
        match (quote, c) {
            (None, '\'' | '"') => {
                quote = Some(c);
                out.push(c);
            }
            (Some(open), _) if c == open => {
                quote = None;
                out.push(c);
            }
            (None, '?') => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

/// A blocking Postgres connection.
pub struct PgConnection {
    runtime: Arc<Runtime>,
    client: Arc<Client>,
    in_transaction: bool,
    attributes: BTreeMap<String, Value>,
    last_error: Option<ErrorInfo>,
}

impl fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("in_transaction", &self.in_transaction)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    /// Connect; usable directly as a [`crate::ConnectionRegistry`] driver.
    pub fn connect(params: &ConnectionParams) -> DalResult<Self> {
        let config = client_config(params)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DalError::configuration(format!("cannot start runtime: {e}")))?;

        let (client, connection) = runtime
            .block_on(config.connect(NoTls))
            .map_err(DalError::from_db_error)?;

        runtime.spawn(async move {
            if let Err(err) = connection.await {
                #[cfg(feature = "tracing")]
                tracing::warn!(target: "dalq.connection", error = %err, "postgres connection ended");
                #[cfg(not(feature = "tracing"))]
                let _ = err;
            }
        });

        Ok(Self {
            runtime: Arc::new(runtime),
            client: Arc::new(client),
            in_transaction: false,
            attributes: BTreeMap::new(),
            last_error: None,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn batch(&mut self, sql: &str) -> DalResult<bool> {
        let result = self
            .runtime
            .block_on(self.client.batch_execute(sql))
            .map(|()| true)
            .map_err(DalError::from_db_error);
        record_error(&mut self.last_error, result)
    }
}

impl Connection for PgConnection {
    type Statement = PgStatement;

    fn prepare(&mut self, sql: &str, _options: &PrepareOptions) -> DalResult<PgStatement> {
        let sql = number_placeholders(sql);
        let prepared = self
            .runtime
            .block_on(self.client.prepare(&sql))
            .map_err(DalError::from_db_error);
        let statement = record_error(&mut self.last_error, prepared)?;

        let columns = statement
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();

        Ok(PgStatement {
            runtime: Arc::clone(&self.runtime),
            client: Arc::clone(&self.client),
            statement,
            columns,
            params: BTreeMap::new(),
            buffer: None,
            affected: 0,
            last_error: None,
        })
    }

    fn query(&mut self, sql: &str) -> DalResult<PgStatement> {
        let mut statement = self.prepare(sql, &PrepareOptions::new())?;
        let executed = statement.execute(&[]);
        record_error(&mut self.last_error, executed)?;
        Ok(statement)
    }

    fn begin_transaction(&mut self) -> DalResult<bool> {
        if self.in_transaction {
            return Err(DalError::driver("25001", 0, "There is already an active transaction"));
        }
        self.batch("BEGIN")?;
        self.in_transaction = true;
        Ok(true)
    }

    fn commit(&mut self) -> DalResult<bool> {
        if !self.in_transaction {
            return Err(DalError::driver("25P01", 0, "There is no active transaction"));
        }
        self.in_transaction = false;
        self.batch("COMMIT")
    }

    fn roll_back(&mut self) -> DalResult<bool> {
        if !self.in_transaction {
            return Err(DalError::driver("25P01", 0, "There is no active transaction"));
        }
        self.in_transaction = false;
        self.batch("ROLLBACK")
    }

    fn last_insert_id(&mut self, sequence: Option<&str>) -> DalResult<String> {
        let result = match sequence {
            Some(name) => self.runtime.block_on(
                self.client
                    .query_one("SELECT currval($1::text::regclass)::text", &[&name]),
            ),
            None => self
                .runtime
                .block_on(self.client.query_one("SELECT lastval()::text", &[])),
        };
        let id = result
            .and_then(|row| row.try_get::<_, String>(0))
            .map_err(DalError::from_db_error);
        record_error(&mut self.last_error, id)
    }

    fn get_attribute(&self, name: &str) -> DalResult<Value> {
        match name {
            "driver_name" => Ok(Value::from("pgsql")),
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
        vec!["pgsql".to_string()]
    }

    fn cursor_kind(&self) -> DalResult<CursorKind> {
        Ok(CursorKind::Scrollable)
    }
}

/// A prepared Postgres statement with a buffered result.
#[derive(Debug)]
pub struct PgStatement {
    runtime: Arc<Runtime>,
    client: Arc<Client>,
    statement: Statement,
    columns: Arc<[String]>,
    params: BTreeMap<usize, Value>,
    buffer: Option<RowBuffer>,
    affected: u64,
    last_error: Option<ErrorInfo>,
}

impl PgStatement {
    fn buffer(&mut self) -> DalResult<&mut RowBuffer> {
        self.buffer
            .as_mut()
            .ok_or_else(|| DalError::driver("HY010", 0, "statement is not executed"))
    }
}

async fn run_statement(
    client: &Client,
    statement: &Statement,
    values: &[Value],
) -> DalResult<(Vec<Vec<Value>>, u64)> {
    let stream = client
        .query_raw(statement, values.iter().map(|v| v as &dyn ToSql))
        .await
        .map_err(DalError::from_db_error)?;
    pin_mut!(stream);

    let mut rows = Vec::new();
    while let Some(row) = stream.try_next().await.map_err(DalError::from_db_error)? {
        rows.push(decode_row(&row)?);
    }
    let affected = stream.rows_affected().unwrap_or(rows.len() as u64);
    Ok((rows, affected))
}

fn decode_row(row: &tokio_postgres::Row) -> DalResult<Vec<Value>> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn get<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, idx: usize) -> DalResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| DalError::decode(row.columns()[idx].name(), e.to_string()))
}

/// Decode one column by its Postgres type. Types without a native
/// [`Value`] variant are rendered as text; anything else must be cast in SQL.
fn decode_value(row: &tokio_postgres::Row, idx: usize) -> DalResult<Value> {
    let ty = row.columns()[idx].type_();
    let value = if *ty == Type::BOOL {
        get::<bool>(row, idx)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx)?.map(Value::from)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx)?.map(Value::from)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx)?.map(Value::Int)
    } else if *ty == Type::OID {
        get::<u32>(row, idx)?.map(Value::from)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx)?.map(Value::from)
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx)?.map(Value::Float)
    } else if *ty == Type::BYTEA {
        get::<Vec<u8>>(row, idx)?.map(Value::Blob)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<serde_json::Value>(row, idx)?.map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::UUID {
        get::<uuid::Uuid>(row, idx)?.map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMP {
        get::<chrono::NaiveDateTime>(row, idx)?.map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(|v| Value::Text(v.to_rfc3339()))
    } else if *ty == Type::DATE {
        get::<chrono::NaiveDate>(row, idx)?.map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::TIME {
        get::<chrono::NaiveTime>(row, idx)?.map(|v| Value::Text(v.to_string()))
    } else {
        get::<String>(row, idx)?.map(Value::Text)
    };
    Ok(value.unwrap_or(Value::Null))
}

impl StatementHandle for PgStatement {
    fn execute(&mut self, params: &[Value]) -> DalResult<bool> {
        let values: Vec<Value> = if params.is_empty() {
            self.params.values().cloned().collect()
        } else {
            params.to_vec()
        };

        let result = self
            .runtime
            .block_on(run_statement(&self.client, &self.statement, &values))
            .map(|(rows, affected)| {
                self.buffer = Some(RowBuffer::new(Arc::clone(&self.columns), rows));
                self.affected = affected;
                true
            });
        record_error(&mut self.last_error, result)
    }

    fn bind_parameter(
        &mut self,
        param: Param,
        value: Value,
        kind: Option<ParamType>,
        _length: Option<usize>,
    ) -> DalResult<bool> {
        let Param::Position(position) = param else {
            return Err(DalError::unsupported("named parameters"));
        };
        let value = match kind {
            Some(ParamType::Null) => Value::Null,
            _ => value,
        };
        self.params.insert(position, value);
        Ok(true)
    }

    fn fetch(&mut self, orientation: Orientation) -> DalResult<Option<Row>> {
        Ok(self.buffer()?.fetch(orientation))
    }

    fn fetch_all(&mut self) -> DalResult<Vec<Row>> {
        Ok(self.buffer()?.fetch_rest())
    }

    fn fetch_column(&mut self, index: usize) -> DalResult<Option<Value>> {
        Ok(self.buffer()?.fetch_column(index))
    }

    fn row_count(&mut self) -> DalResult<u64> {
        self.buffer()?;
        Ok(self.affected)
    }

    fn column_count(&self) -> usize {
        self.columns.len()
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

    #[test]
    fn placeholders_are_numbered_outside_quotes() {
        assert_eq!(
            number_placeholders("SELECT * FROM t WHERE a = ? AND b = '?' AND \"c?\" = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND \"c?\" = $2"
        );
        assert_eq!(number_placeholders("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn pdo_style_dsn_is_accepted() {
        let params = ConnectionParams::new("pgsql", "pgsql:host=db;port=5433;dbname=app")
            .credentials("app", "secret");
        let config = client_config(&params).unwrap();
        assert_eq!(config.get_dbname(), Some("app"));
        assert_eq!(config.get_user(), Some("app"));
        assert_eq!(config.get_ports(), &[5433]);
    }

    #[test]
    fn url_dsn_is_accepted() {
        let params = ConnectionParams::new("pgsql", "postgres://u@localhost/app");
        let config = client_config(&params).unwrap();
        assert_eq!(config.get_user(), Some("u"));
    }

    #[test]
    fn malformed_dsn_is_a_configuration_error() {
        let params = ConnectionParams::new("pgsql", "pgsql:port=notanumber");
        let err = client_config(&params).unwrap_err();
        assert!(matches!(err, DalError::Configuration(_)));
    }
}
