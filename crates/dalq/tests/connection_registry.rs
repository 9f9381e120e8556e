//! Named connections opened from configuration.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dalq::memory::MemoryConnection;
use dalq::{Connection, ConnectionParams, ConnectionRegistry, DalConfig, DalError, Value};

fn config() -> DalConfig {
    DalConfig::from_json_str(
        r#"{
            "connections": {
                "main": { "dal": "memory", "dsn": "memory:main", "username": "app" },
                "reports": { "dal": "memory", "dsn": "memory:reports" },
                "legacy": { "dal": "odbc", "dsn": "odbc:legacy" }
            },
            "autoload": "main"
        }"#,
    )
    .unwrap()
}

fn registry() -> ConnectionRegistry<MemoryConnection> {
    let mut registry = ConnectionRegistry::new().with_config(config());
    registry.register_driver("memory", |params| {
        let mut conn = MemoryConnection::new();
        conn.set_attribute("dsn", Value::from(params.dsn.as_str()))?;
        Ok(conn)
    });
    registry
}

#[test]
fn last_falls_back_to_autoload() {
    let mut registry = registry();
    assert!(registry.is_empty());

    let dal = registry.last().unwrap();
    assert_eq!(dal.id(), "main");
    assert_eq!(dal.get_attribute("dsn").unwrap(), Value::from("memory:main"));
    assert!(registry.contains("main"));
}

#[test]
fn last_tracks_the_most_recent_open() {
    let mut registry = registry();
    registry.open("main").unwrap();
    registry.open("reports").unwrap();
    assert_eq!(registry.last().unwrap().id(), "reports");
    assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["main", "reports"]);

    registry.open("main").unwrap();
    assert_eq!(registry.last().unwrap().id(), "main");
    assert_eq!(registry.len(), 2);
}

#[test]
fn open_reuses_an_open_connection() {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);

    let mut registry = ConnectionRegistry::new().with_config(config());
    registry.register_driver("memory", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection::new())
    });

    registry.open("main").unwrap();
    registry.open("main").unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    registry
        .open_with("main", ConnectionParams::new("memory", "memory:other"))
        .unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    assert_eq!(registry.len(), 1);
}

#[test]
fn unknown_connection_and_driver_are_configuration_errors() {
    let mut registry = registry();

    let err = registry.open("missing").unwrap_err();
    assert!(matches!(err, DalError::Configuration(_)));

    let err = registry.open("legacy").unwrap_err();
    assert!(matches!(err, DalError::Configuration(_)));
    assert!(!registry.contains("legacy"));
}

#[test]
fn without_autoload_last_needs_an_open_connection() {
    let mut registry: ConnectionRegistry<MemoryConnection> = ConnectionRegistry::new();
    assert!(matches!(registry.last(), Err(DalError::Configuration(_))));
}

#[test]
fn close_forgets_the_connection() {
    let mut registry = registry();
    registry.open("reports").unwrap();

    let closed = registry.close("reports").unwrap();
    assert_eq!(closed.id(), "reports");
    assert!(registry.close("reports").is_none());
    assert!(registry.get("reports").is_none());

    // The last-opened marker is gone, so autoload applies again.
    assert_eq!(registry.last().unwrap().id(), "main");
}

#[test]
fn driver_failures_propagate() {
    let mut registry: ConnectionRegistry<MemoryConnection> =
        ConnectionRegistry::new().with_config(config());
    registry.register_driver("memory", |_| Err(DalError::driver("08001", 0, "refused")));

    let err = registry.open("main").unwrap_err();
    assert_eq!(err.sqlstate(), Some("08001"));
    assert!(registry.is_empty());
}
