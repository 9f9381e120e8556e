//! Builders feeding connections: rendered SQL goes to the driver verbatim and
//! comes back through a cursor.

use std::sync::{Arc, Mutex};

use dalq::memory::MemoryConnection;
use dalq::monitor::{Operation, QueryContext, QueryType, SqlHook};
use dalq::{
    Dal, DalResult, FetchMode, FetchStyle, FromRow, PrepareOptions, QueryRegistry, Row, Select,
    Value, delete, insert, select, update,
};

#[derive(Debug, PartialEq)]
struct Order {
    user: String,
    total: i64,
}

impl FromRow for Order {
    fn from_row(row: &Row) -> DalResult<Self> {
        Ok(Self {
            user: row.try_get("name")?,
            total: row.try_get("total")?,
        })
    }
}

fn orders_query() -> Select {
    let mut q = select(["u.name", "o.total"]);
    q.from("users u")
        .inner_join("orders o")
        .unwrap()
        .on("o.user_id = u.id")
        .where_("o.total > ?")
        .order_by(["o.total DESC"]);
    q
}

#[test]
fn rendered_select_runs_through_a_cursor() {
    let q = orders_query();
    assert_eq!(
        q.to_sql(),
        "SELECT u.name, o.total FROM users u INNER JOIN orders o ON o.user_id = u.id \
         WHERE o.total > ? ORDER BY o.total DESC"
    );

    let conn = MemoryConnection::new().with_result(
        &q.to_sql(),
        ["name", "total"],
        vec![
            vec![Value::from("ada"), Value::Int(300)],
            vec![Value::from("bob"), Value::Int(150)],
        ],
    );
    let mut dal = Dal::new("main", conn);

    let mut cursor = dal.prepare(&q.to_sql(), &PrepareOptions::new()).unwrap();
    cursor.execute(&[Value::Int(100)]).unwrap();
    assert_eq!(cursor.handle().last_params(), &[Value::Int(100)]);

    let orders: Vec<Order> = cursor.fetch_all_as().unwrap();
    assert_eq!(
        orders,
        vec![
            Order {
                user: "ada".to_string(),
                total: 300
            },
            Order {
                user: "bob".to_string(),
                total: 150
            },
        ]
    );
}

#[test]
fn registered_builder_is_rendered_after_mutation() {
    let mut registry = QueryRegistry::new();
    let shared = registry.set_id("active").select(["id"]);
    shared.lock().unwrap().from("users").where_("active = 1");

    let sql = registry.get_statement("active").unwrap().to_string();
    assert_eq!(sql, "SELECT id FROM users WHERE active = 1");

    let conn = MemoryConnection::new().with_result(&sql, ["id"], vec![vec![Value::Int(7)]]);
    let mut dal = Dal::new("main", conn);
    let mut cursor = dal.query(&sql).unwrap();
    cursor.set_fetching_style(FetchStyle::new().mode(FetchMode::Set));

    let ids: Vec<Vec<Value>> = cursor
        .fetch_all()
        .unwrap()
        .iter()
        .map(|record| record.as_set().unwrap().to_vec())
        .collect();
    assert_eq!(ids, vec![vec![Value::Int(7)]]);
}

#[test]
fn writes_report_affected_rows() {
    let mut ins = insert();
    ins.into_table("users").on(["name"]).values(["?"]).values(["?"]);
    let mut upd = update();
    upd.table("users").set("name", "?").where_("id = ?");
    let mut del = delete();
    del.from("users").where_("id = ?");

    let conn = MemoryConnection::new()
        .with_affected(&ins.to_sql(), 2)
        .with_affected(&upd.to_sql(), 1)
        .with_affected(&del.to_sql(), 0);
    let mut dal = Dal::new("main", conn);

    assert_eq!(dal.exec(&ins.to_sql()).unwrap(), 2);
    assert_eq!(dal.last_insert_id(None).unwrap(), "2");
    assert_eq!(dal.exec(&upd.to_sql()).unwrap(), 1);
    assert_eq!(dal.exec(&del.to_sql()).unwrap(), 0);
}

#[derive(Default)]
struct Recorder(Mutex<Vec<QueryContext>>);

impl SqlHook for Recorder {
    fn before_statement(&self, ctx: &QueryContext) {
        self.0.lock().unwrap().push(ctx.clone());
    }
}

#[test]
fn hooks_see_every_statement() {
    let q = orders_query();
    let conn = MemoryConnection::new().with_result(&q.to_sql(), ["name", "total"], Vec::new());
    let recorder = Arc::new(Recorder::default());
    let mut dal = Dal::new("reports", conn).with_hook(recorder.clone());

    dal.prepare(&q.to_sql(), &PrepareOptions::new()).unwrap();
    dal.query(&q.to_sql()).unwrap();
    assert!(dal.query("DELETE FROM nowhere").is_err());

    let seen = recorder.0.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].operation, Operation::Prepare);
    assert_eq!(seen[1].operation, Operation::Query);
    assert_eq!(seen[0].connection, "reports");
    assert_eq!(seen[0].query_type, QueryType::Select);
    assert_eq!(seen[2].query_type, QueryType::Delete);
    assert_eq!(dal.error_code().as_deref(), Some("42S02"));
}
