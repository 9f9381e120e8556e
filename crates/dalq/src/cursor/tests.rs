//! Cache behaviour of the result cursor over the in-memory driver.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::cursor::{
    CursorKind, Direction, FetchMode, FetchStyle, Orientation, Record, ResultCursor, StartOffset,
};
use crate::dal::{Dal, Param, PrepareOptions};
use crate::error::DalError;
use crate::memory::{FetchStats, MemoryConnection, MemoryStatement};
use crate::row::Value;

const SQL: &str = "SELECT id, name FROM users";

fn users(count: i64) -> MemoryConnection {
    MemoryConnection::new().with_result(
        SQL,
        ["id", "name"],
        (1..=count).map(|id| vec![Value::Int(id), Value::Text(format!("user{id}"))]),
    )
}

fn open(conn: MemoryConnection) -> ResultCursor<MemoryStatement> {
    Dal::new("test", conn).query(SQL).unwrap()
}

fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|record| record.get("id").and_then(|id| id.as_i64()).unwrap())
        .collect()
}

fn id_of(record: Option<Record>) -> Option<i64> {
    record.and_then(|record| record.get("id")).and_then(|id| id.as_i64())
}

fn stats(cursor: &ResultCursor<MemoryStatement>) -> FetchStats {
    cursor.handle().stats()
}

#[test]
fn sequential_walk() {
    let mut cursor = open(users(3));
    assert_eq!(cursor.kind(), CursorKind::Scrollable);

    let records: Vec<Record> = cursor.rows().collect::<Result<_, _>>().unwrap();
    assert_eq!(ids(&records), vec![1, 2, 3]);
    assert!(!cursor.valid());
    assert_eq!(cursor.key(), None);
}

#[test]
fn first_last_and_all_agree_with_count_when_scrollable() {
    let mut cursor = open(users(3));

    assert_eq!(id_of(cursor.fetch_last().unwrap()), Some(3));
    assert_eq!(id_of(cursor.fetch_first().unwrap()), Some(1));
    assert_eq!(cursor.key(), Some(0));

    let all = cursor.fetch_all().unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3]);
    assert_eq!(all.len() as u64, cursor.count().unwrap());

    // Last, First, then a single Next for the hole at 1.
    assert_eq!(stats(&cursor).fetches, 3);
    assert_eq!(stats(&cursor).bulk_fetches, 0);
}

#[test]
fn first_last_and_all_agree_with_count_when_forward_only() {
    let mut cursor = open(users(3).forward_only());
    assert_eq!(cursor.kind(), CursorKind::ForwardOnly);
    assert!(!cursor.handle().is_scrollable());

    assert_eq!(id_of(cursor.fetch_last().unwrap()), Some(3));
    assert_eq!(id_of(cursor.fetch_first().unwrap()), Some(1));

    let all = cursor.fetch_all().unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3]);
    assert_eq!(cursor.count().unwrap(), 3);

    // Three rows plus the fetch that found the end; nothing fetched twice.
    assert_eq!(stats(&cursor).fetches, 4);
    assert_eq!(stats(&cursor).bulk_fetches, 0);
}

#[test]
fn fetch_all_after_partial_iteration_reuses_cached_rows() {
    for conn in [users(5), users(5).forward_only()] {
        let mut cursor = open(conn);
        assert_eq!(id_of(cursor.fetch_next().unwrap()), Some(1));
        assert_eq!(id_of(cursor.fetch_next().unwrap()), Some(2));

        let all = cursor.fetch_all().unwrap();
        assert_eq!(ids(&all), vec![1, 2, 3, 4, 5]);
        assert_eq!(stats(&cursor).fetches, 2);
        assert_eq!(stats(&cursor).bulk_fetches, 1);

        // The walk restarts at the first row and is now served from cache.
        assert_eq!(cursor.key(), Some(0));
        let walked: Vec<Record> = cursor.rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(ids(&walked), vec![1, 2, 3, 4, 5]);
        assert_eq!(stats(&cursor).fetches, 2);
    }
}

#[test]
fn fetch_all_fills_holes_below_the_last_row() {
    let mut cursor = open(users(5));
    assert_eq!(id_of(cursor.fetch_last().unwrap()), Some(5));

    let all = cursor.fetch_all().unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3, 4, 5]);
    // Last, a relative jump back to 0, then Next for 1..=3.
    assert_eq!(stats(&cursor).fetches, 5);
    assert_eq!(stats(&cursor).bulk_fetches, 0);
}

#[test]
fn fetch_all_is_idempotent() {
    let mut cursor = open(users(4));
    let first = cursor.fetch_all().unwrap();
    let second = cursor.fetch_all().unwrap();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(stats(&cursor).bulk_fetches, 1);
}

#[test]
fn execute_discards_cached_rows() {
    let mut dal = Dal::new("test", users(3));
    let mut cursor = dal.prepare(SQL, &PrepareOptions::new()).unwrap();
    cursor.execute(&[]).unwrap();
    assert_eq!(cursor.fetch_all().unwrap().len(), 3);
    assert_eq!(cursor.count().unwrap(), 3);

    dal.connection().set_result(
        SQL,
        ["id", "name"],
        vec![vec![Value::Int(10), Value::from("x")]],
    );
    cursor.execute(&[]).unwrap();
    assert_eq!(cursor.key(), None);
    assert_eq!(ids(&cursor.fetch_all().unwrap()), vec![10]);
    assert_eq!(cursor.count().unwrap(), 1);
    assert_eq!(stats(&cursor).executions, 2);
}

#[test]
fn walk_from_the_end_backwards() {
    for conn in [users(3), users(3).forward_only()] {
        let mut cursor = open(conn);
        cursor.set_fetching_style(
            FetchStyle::new()
                .offset(StartOffset::FromEnd)
                .direction(Direction::Backward),
        );

        let records: Vec<Record> = cursor.rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(ids(&records), vec![3, 2, 1]);
    }
}

#[test]
fn backward_walk_uses_prior_on_scrollable_handles() {
    let mut cursor = open(users(3));
    cursor.set_fetching_style(
        FetchStyle::new()
            .offset(StartOffset::FromEnd)
            .direction(Direction::Backward),
    );
    cursor.rewind().unwrap();
    assert_eq!(cursor.key(), Some(2));
    cursor.next().unwrap();
    cursor.next().unwrap();
    assert_eq!(id_of(cursor.current()), Some(1));
    // Last plus two Prior fetches.
    assert_eq!(stats(&cursor).fetches, 3);
}

#[test]
fn fetch_all_from_end_positions_on_the_last_row() {
    let mut cursor = open(users(3));
    cursor.set_fetching_style(FetchStyle::new().offset(StartOffset::FromEnd));
    cursor.fetch_all().unwrap();
    assert_eq!(cursor.key(), Some(2));
}

#[test]
fn fetch_prior_steps_back() {
    let mut cursor = open(users(3));
    cursor.fetch_last().unwrap();
    assert_eq!(id_of(cursor.fetch_prior().unwrap()), Some(2));
    assert_eq!(id_of(cursor.fetch_prior().unwrap()), Some(1));
    assert!(cursor.fetch_prior().unwrap().is_none());
    assert!(!cursor.valid());
}

#[test]
fn stepping_back_onto_the_last_row_after_the_end() {
    for conn in [users(3), users(3).forward_only()] {
        let mut cursor = open(conn);
        assert_eq!(cursor.rows().count(), 3);
        assert!(!cursor.valid());

        // Further steps forward stay past the end.
        assert!(cursor.fetch_next().unwrap().is_none());
        assert_eq!(id_of(cursor.fetch_prior().unwrap()), Some(3));
        assert_eq!(id_of(cursor.fetch_prior().unwrap()), Some(2));
        assert_eq!(id_of(cursor.fetch_next().unwrap()), Some(3));
    }
}

#[test]
fn stepping_forward_onto_the_first_row_before_the_start() {
    for conn in [users(3), users(3).forward_only()] {
        let mut cursor = open(conn);
        assert_eq!(id_of(cursor.fetch_first().unwrap()), Some(1));
        assert!(cursor.fetch_prior().unwrap().is_none());
        assert!(cursor.fetch_prior().unwrap().is_none());
        assert_eq!(cursor.key(), None);

        assert_eq!(id_of(cursor.fetch_next().unwrap()), Some(1));
        assert_eq!(id_of(cursor.fetch_next().unwrap()), Some(2));
    }
}

#[test]
fn backward_walk_can_turn_around_at_either_end() {
    for conn in [users(3), users(3).forward_only()] {
        let mut cursor = open(conn);
        cursor.set_fetching_style(
            FetchStyle::new()
                .offset(StartOffset::FromEnd)
                .direction(Direction::Backward),
        );

        let records: Vec<Record> = cursor.rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(ids(&records), vec![3, 2, 1]);
        assert!(cursor.fetch_next().unwrap().is_none());
        assert_eq!(id_of(cursor.fetch_prior().unwrap()), Some(1));

        cursor.fetch_last().unwrap();
        assert!(cursor.fetch_prior().unwrap().is_none());
        assert_eq!(id_of(cursor.fetch_next().unwrap()), Some(3));
    }
}

#[test]
fn nearby_rows_are_reached_relative_to_the_native_position() {
    let mut cursor = open(users(40));
    cursor.fetch_last().unwrap();

    assert!(cursor.load(36).unwrap());
    assert_eq!(stats(&cursor).last_orientation, Some(Orientation::Relative(-3)));
    assert!(cursor.load(2).unwrap());
    assert_eq!(stats(&cursor).last_orientation, Some(Orientation::Absolute(2)));

    let expected: Vec<i64> = (1..=40).collect();
    assert_eq!(ids(&cursor.fetch_all().unwrap()), expected);
}

#[test]
fn column_fetch_past_the_end_keeps_scrollable_positions_right() {
    let mut cursor = open(users(2));
    assert_eq!(cursor.fetch_column(0).unwrap(), Some(Value::Int(1)));
    assert_eq!(cursor.fetch_column(0).unwrap(), Some(Value::Int(2)));
    assert_eq!(cursor.fetch_column(0).unwrap(), None);

    let records: Vec<Record> = cursor.rows().collect::<Result<_, _>>().unwrap();
    assert_eq!(ids(&records), vec![1, 2]);
}

#[test]
fn last_row_is_found_when_the_driver_counts_no_rows() {
    let mut cursor = open(users(3).without_select_counts());
    assert_eq!(cursor.kind(), CursorKind::Scrollable);

    assert_eq!(id_of(cursor.fetch_last().unwrap()), Some(3));
    assert_eq!(cursor.count().unwrap(), 0);
    assert_eq!(id_of(cursor.fetch_prior().unwrap()), Some(2));
    assert_eq!(stats(&cursor).bulk_fetches, 1);

    let mut empty = open(users(0).without_select_counts());
    assert!(empty.fetch_last().unwrap().is_none());
    assert!(empty.fetch_first().unwrap().is_none());
}

#[test]
fn empty_result() {
    for conn in [users(0), users(0).forward_only()] {
        let mut cursor = open(conn);
        assert!(cursor.fetch_first().unwrap().is_none());
        assert!(cursor.fetch_last().unwrap().is_none());
        assert!(cursor.fetch_all().unwrap().is_empty());
        assert_eq!(cursor.rows().count(), 0);
        assert_eq!(cursor.count().unwrap(), 0);
    }
}

#[test]
fn map_mode_keeps_the_last_duplicate() {
    let conn = MemoryConnection::new().with_result(
        SQL,
        ["id", "id", "name"],
        vec![vec![Value::Int(1), Value::Int(2), Value::from("a")]],
    );
    let mut cursor = open(conn);
    let record = cursor.fetch_first().unwrap().unwrap();
    assert_eq!(record.get("id"), Some(json!(2)));
    assert_eq!(record.to_json(), json!({"id": 2, "name": "a"}));

    cursor.set_fetching_style(FetchStyle::new().mode(FetchMode::DebugMap));
    let record = cursor.current().unwrap();
    assert_eq!(record.get("id"), Some(json!([1, 2])));

    cursor.set_fetching_style(FetchStyle::new().mode(FetchMode::Set));
    let record = cursor.current().unwrap();
    assert_eq!(
        record.as_set(),
        Some(&[Value::Int(1), Value::Int(2), Value::from("a")][..])
    );
}

#[test]
fn class_mode_carries_name_and_arguments() {
    let mut cursor = open(users(1));
    cursor.set_fetching_style(FetchStyle::new().mode(FetchMode::Class {
        name: "User".to_string(),
        args: vec![json!("admin")],
    }));

    let record = cursor.fetch_first().unwrap().unwrap();
    assert_eq!(record.class(), Some("User"));
    assert_eq!(record.get("name"), Some(json!("user1")));
    match record {
        Record::Instance { args, .. } => assert_eq!(args, vec![json!("admin")]),
        other => panic!("unexpected record: {other:?}"),
    }
}

#[test]
fn reusable_mode_refills_one_object() {
    let mut cursor = open(users(2));
    let mode = FetchMode::reusable();
    let FetchMode::Reusable(target) = &mode else {
        unreachable!()
    };
    let target = Arc::clone(target);
    cursor.set_fetching_style(FetchStyle::new().mode(mode));

    let records = cursor.fetch_all().unwrap();
    for record in &records {
        match record {
            Record::Reused(shared) => assert!(Arc::ptr_eq(shared, &target)),
            other => panic!("unexpected record: {other:?}"),
        }
    }
    assert_eq!(records[0].get("id"), Some(json!(2)));
}

#[test]
fn records_deserialize_into_serde_types() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    let mut cursor = open(users(2));
    let loaded: Vec<User> = cursor
        .fetch_all()
        .unwrap()
        .iter()
        .map(Record::deserialize)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        loaded[1],
        User {
            id: 2,
            name: "user2".to_string()
        }
    );

    let tuples: Vec<(i64, String)> = cursor.fetch_all_as().unwrap();
    assert_eq!(tuples[0], (1, "user1".to_string()));
}

#[test]
fn column_fetch_skips_the_row_on_forward_only_handles() {
    let mut cursor = open(users(3).forward_only());
    assert_eq!(cursor.fetch_column(1).unwrap(), Some(Value::from("user1")));

    let err = cursor.fetch_first().unwrap_err();
    assert!(matches!(err, DalError::RowUnavailable(0)));
    let err = cursor.fetch_all().unwrap_err();
    assert!(matches!(err, DalError::RowUnavailable(0)));

    let mut rows = cursor.rows();
    assert!(matches!(rows.next(), Some(Err(DalError::RowUnavailable(0)))));
    assert!(rows.next().is_none());
}

#[test]
fn column_fetch_is_recoverable_on_scrollable_handles() {
    let mut cursor = open(users(3));
    assert_eq!(cursor.fetch_column(0).unwrap(), Some(Value::Int(1)));
    assert_eq!(id_of(cursor.fetch_first().unwrap()), Some(1));
    assert_eq!(ids(&cursor.fetch_all().unwrap()), vec![1, 2, 3]);
    assert_eq!(stats(&cursor).column_fetches, 1);
}

#[test]
fn closed_cursor_rejects_fetches_until_executed() {
    let mut cursor = open(users(3));
    cursor.fetch_first().unwrap();
    assert!(cursor.close_cursor().unwrap());

    assert!(matches!(cursor.fetch_next(), Err(DalError::Closed)));
    assert!(matches!(cursor.fetch_all(), Err(DalError::Closed)));
    assert!(matches!(cursor.count(), Err(DalError::Closed)));
    assert!(cursor.current().is_none());

    cursor.execute(&[]).unwrap();
    assert_eq!(cursor.fetch_all().unwrap().len(), 3);
}

#[test]
fn forward_only_can_be_requested_explicitly() {
    let mut dal = Dal::new("test", users(2));
    let options = PrepareOptions::new().cursor(CursorKind::ForwardOnly);
    let mut cursor = dal.prepare(SQL, &options).unwrap();
    assert_eq!(cursor.kind(), CursorKind::ForwardOnly);
    assert!(!cursor.handle().is_scrollable());

    cursor.execute(&[]).unwrap();
    assert_eq!(id_of(cursor.fetch_last().unwrap()), Some(2));
}

#[test]
fn driver_errors_surface_through_the_cursor() {
    let mut dal = Dal::new("test", users(1));

    let mut cursor = dal.prepare(SQL, &PrepareOptions::new()).unwrap();
    let err = cursor.fetch_next().unwrap_err();
    assert_eq!(err.sqlstate(), Some("HY010"));
    assert_eq!(cursor.error_info().sqlstate, "HY010");

    let mut cursor = dal.prepare("SELECT 1", &PrepareOptions::new()).unwrap();
    assert!(cursor.execute(&[]).is_err());
    assert_eq!(cursor.error_code().as_deref(), Some("42S02"));
}

#[test]
fn parameters_reach_the_handle() {
    let mut dal = Dal::new("test", users(1));
    let mut cursor = dal.prepare(SQL, &PrepareOptions::new()).unwrap();

    cursor
        .bind_parameter(Param::Position(1), Value::Int(7), None, None)
        .unwrap();
    cursor.execute(&[]).unwrap();
    assert_eq!(cursor.handle().last_params(), &[Value::Int(7)]);

    cursor.execute(&[Value::Int(9)]).unwrap();
    assert_eq!(cursor.handle().last_params(), &[Value::Int(9)]);
}
