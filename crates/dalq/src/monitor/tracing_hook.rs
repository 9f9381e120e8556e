use std::borrow::Cow;

use super::truncate_sql_bytes;
use super::types::{QueryContext, SqlHook};
use tracing::Level;

/// `tracing::event!` needs a constant level, so pick the macro per variant.
macro_rules! event_at {
    ($level:expr, $($rest:tt)*) => {
        if $level == Level::ERROR {
            tracing::error!($($rest)*)
        } else if $level == Level::WARN {
            tracing::warn!($($rest)*)
        } else if $level == Level::INFO {
            tracing::info!($($rest)*)
        } else if $level == Level::DEBUG {
            tracing::debug!($($rest)*)
        } else {
            tracing::trace!($($rest)*)
        }
    };
}

/// Logs each statement on the `dalq.sql` target before the driver sees it.
///
/// ```
/// use std::sync::Arc;
/// use dalq::memory::MemoryConnection;
/// use dalq::{Dal, TracingSqlHook};
///
/// let hook = TracingSqlHook::new().level(tracing::Level::INFO).max_sql_length(80);
/// let dal = Dal::new("main", MemoryConnection::new()).with_hook(Arc::new(hook));
/// # drop(dal);
/// ```
#[derive(Debug, Clone)]
pub struct TracingSqlHook {
    level: Level,
    limit: Option<usize>,
}

impl Default for TracingSqlHook {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingSqlHook {
    /// Debug level, SQL cut after 200 bytes.
    pub fn new() -> Self {
        Self {
            level: Level::DEBUG,
            limit: Some(200),
        }
    }

    pub fn level(self, level: Level) -> Self {
        Self { level, ..self }
    }

    /// Cut logged SQL after `bytes` bytes and mark the cut with `...`.
    pub fn max_sql_length(self, bytes: usize) -> Self {
        Self {
            limit: Some(bytes),
            ..self
        }
    }

    pub fn no_truncate(self) -> Self {
        Self { limit: None, ..self }
    }

    pub(crate) fn truncate_sql<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self.limit {
            Some(limit) if sql.len() > limit => {
                Cow::Owned(format!("{}...", truncate_sql_bytes(sql, limit)))
            }
            _ => Cow::Borrowed(sql),
        }
    }
}

impl SqlHook for TracingSqlHook {
    fn before_statement(&self, ctx: &QueryContext) {
        let sql = self.truncate_sql(&ctx.sql);
        event_at!(
            self.level,
            target: "dalq.sql",
            connection = %ctx.connection,
            operation = ?ctx.operation,
            query_type = ?ctx.query_type,
            fields = ?ctx.fields,
            "{sql}"
        );
    }
}
