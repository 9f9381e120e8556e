//! Connection configuration.
//!
//! # Example
//! ```
//! use dalq::DalConfig;
//!
//! let config = DalConfig::from_json_str(r#"{
//!     "connections": {
//!         "main": { "dal": "memory", "dsn": "memory:", "username": "app" }
//!     },
//!     "autoload": "main"
//! }"#)?;
//! assert_eq!(config.connections["main"].username, "app");
//! # Ok::<(), dalq::DalError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DalError, DalResult};

/// Parameters needed to open one connection.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionParams {
    /// Name of the registered driver that opens this connection.
    pub dal: String,
    pub dsn: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Driver-specific options.
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ConnectionParams {
    pub fn new(dal: impl Into<String>, dsn: impl Into<String>) -> Self {
        Self {
            dal: dal.into(),
            dsn: dsn.into(),
            username: String::new(),
            password: String::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("dal", &self.dal)
            .field("dsn", &self.dsn)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

/// Every known connection plus the one opened on demand.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DalConfig {
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionParams>,
    /// Connection opened by [`crate::ConnectionRegistry::last`] when none is open yet.
    #[serde(default)]
    pub autoload: Option<String>,
}

impl DalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> DalResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DalError::configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn connection(mut self, id: impl Into<String>, params: ConnectionParams) -> Self {
        self.connections.insert(id.into(), params);
        self
    }

    pub fn autoload(mut self, id: impl Into<String>) -> Self {
        self.autoload = Some(id.into());
        self
    }

    /// The autoload target must be a configured connection.
    pub fn validate(&self) -> DalResult<()> {
        match &self.autoload {
            Some(id) if !self.connections.contains_key(id) => Err(DalError::configuration(
                format!("autoload connection `{id}` is not configured"),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let config =
            DalConfig::from_json_str(r#"{"connections":{"a":{"dal":"memory","dsn":"x"}}}"#)
                .unwrap();
        let params = &config.connections["a"];
        assert_eq!(params.username, "");
        assert!(params.options.is_empty());
        assert_eq!(config.autoload, None);
    }

    #[test]
    fn rejects_unknown_autoload() {
        let err = DalConfig::from_json_str(r#"{"autoload":"missing"}"#).unwrap_err();
        assert!(matches!(err, DalError::Configuration(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(DalConfig::from_json_str("{").is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let params = ConnectionParams::new("pgsql", "host=db").credentials("app", "hunter2");
        let printed = format!("{params:?}");
        assert!(printed.contains("app"));
        assert!(!printed.contains("hunter2"));
    }
}
