//! End-to-end statement scenarios against the in-memory store.

use dynasql_driver::{Config, Connection, ExecContext, Params, Row, SqlValue};
use dynasql_model::AttributeValue;

use crate::memory_connection;

async fn exec(conn: &Connection, sql: &str) {
    conn.prepare(sql)
        .unwrap_or_else(|e| panic!("failed to prepare {sql:?}: {e}"))
        .execute(Params::None, &ExecContext::new())
        .await
        .unwrap_or_else(|e| panic!("failed to execute {sql:?}: {e}"));
}

async fn collect(conn: &Connection, sql: &str, params: Params) -> Vec<Row> {
    let statement = conn
        .prepare(sql)
        .unwrap_or_else(|e| panic!("failed to prepare {sql:?}: {e}"));
    let mut rows = statement
        .query(params, &ExecContext::new())
        .await
        .unwrap_or_else(|e| panic!("failed to query {sql:?}: {e}"));
    let mut out = Vec::new();
    while let Some(row) = rows.next().await.unwrap() {
        out.push(row);
    }
    out
}

fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_owned())
}

fn number(value: &str) -> SqlValue {
    SqlValue::Number(value.to_owned())
}

#[tokio::test]
async fn test_should_point_get_with_projection() {
    let conn = memory_connection(Config::default());
    exec(&conn, "CREATE TABLE Users (id STRING HASH KEY)").await;
    exec(
        &conn,
        r#"INSERT INTO Users VALUES ({"id": "u1", "name": "Ada", "age": 36})"#,
    )
    .await;

    let rows = collect(
        &conn,
        "SELECT name FROM Users WHERE id = :id",
        Params::named([("id", "u1")]),
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&text("Ada")));
    // The projection narrows the item to the selected column.
    assert!(rows[0].get("age").is_none());
}

#[tokio::test]
async fn test_should_query_index_with_positional_filter() {
    let conn = memory_connection(Config::default());
    exec(
        &conn,
        "CREATE TABLE Orders (id STRING HASH KEY, user_id STRING, \
         GLOBAL SECONDARY INDEX ByUser HASH(user_id) PROJECTION ALL)",
    )
    .await;
    for (id, user, total) in [("o1", "u1", 50), ("o2", "u1", 150), ("o3", "u2", 500)] {
        exec(
            &conn,
            &format!(r#"INSERT INTO Orders VALUES ({{"id": "{id}", "user_id": "{user}", "total": {total}}})"#),
        )
        .await;
    }

    let rows = collect(
        &conn,
        "SELECT * FROM Orders USE INDEX (ByUser) WHERE user_id = ? AND total > ?",
        Params::positional([
            AttributeValue::S("u1".to_owned()),
            AttributeValue::N("100".to_owned()),
        ]),
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&text("o2")));
}

#[tokio::test]
async fn test_should_apply_sort_range_direction_and_limit() {
    let conn = memory_connection(Config::default());
    exec(
        &conn,
        "CREATE TABLE Events (tenant STRING HASH KEY, ts NUMBER RANGE KEY)",
    )
    .await;
    for ts in [1, 3, 5, 9, 12] {
        exec(
            &conn,
            &format!(r#"INSERT INTO Events VALUES ({{"tenant": "t", "ts": {ts}}})"#),
        )
        .await;
    }

    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't' AND ts BETWEEN 1 AND 10 DESC LIMIT 2",
        Params::None,
    )
    .await;
    // The range keeps 1..=10, DESC reverses sort-key order, LIMIT keeps two.
    let seen: Vec<_> = rows.iter().map(|r| r.get("ts").cloned().unwrap()).collect();
    assert_eq!(seen, vec![number("9"), number("5")]);
}

#[tokio::test]
async fn test_should_scan_when_no_key_matches() {
    let conn = memory_connection(Config::default());
    exec(&conn, "CREATE TABLE Logs (id STRING HASH KEY)").await;
    for (id, level) in [("l1", "INFO"), ("l2", "ERROR"), ("l3", "ERROR")] {
        exec(
            &conn,
            &format!(r#"INSERT INTO Logs VALUES ({{"id": "{id}", "level": "{level}"}})"#),
        )
        .await;
    }

    let rows = collect(
        &conn,
        "SELECT * FROM Logs WHERE level = 'ERROR'",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.get("level") == Some(&text("ERROR"))));
}

#[tokio::test]
async fn test_should_filter_with_disjunction_and_negation() {
    let conn = memory_connection(Config::default());
    exec(&conn, "CREATE TABLE Logs (id STRING HASH KEY)").await;
    for (id, level) in [("l1", "INFO"), ("l2", "ERROR"), ("l3", "WARN")] {
        exec(
            &conn,
            &format!(r#"INSERT INTO Logs VALUES ({{"id": "{id}", "level": "{level}"}})"#),
        )
        .await;
    }

    let rows = collect(
        &conn,
        "SELECT * FROM Logs WHERE (level = 'ERROR' OR level = 'WARN')",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 2);

    let rows = collect(
        &conn,
        "SELECT * FROM Logs WHERE NOT level = 'INFO'",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.get("level") != Some(&text("INFO"))));
}

#[tokio::test]
async fn test_should_filter_with_membership_list() {
    let conn = memory_connection(Config::default());
    exec(&conn, "CREATE TABLE Logs (id STRING HASH KEY)").await;
    for (id, level) in [("l1", "INFO"), ("l2", "ERROR"), ("l3", "WARN")] {
        exec(
            &conn,
            &format!(r#"INSERT INTO Logs VALUES ({{"id": "{id}", "level": "{level}"}})"#),
        )
        .await;
    }

    let rows = collect(
        &conn,
        "SELECT * FROM Logs WHERE level IN ('ERROR', 'FATAL')",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&text("l2")));
}

#[tokio::test]
async fn test_should_filter_on_attribute_presence() {
    let conn = memory_connection(Config::default());
    exec(
        &conn,
        "CREATE TABLE Events (tenant STRING HASH KEY, ts NUMBER RANGE KEY)",
    )
    .await;
    exec(
        &conn,
        r#"INSERT INTO Events VALUES ({"tenant": "t", "ts": 1, "flag": TRUE})"#,
    )
    .await;
    exec(
        &conn,
        r#"INSERT INTO Events VALUES ({"tenant": "t", "ts": 2})"#,
    )
    .await;

    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't' AND attribute_exists(flag)",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("ts"), Some(&number("1")));

    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't' AND attribute_not_exists(flag)",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("ts"), Some(&number("2")));
}

#[tokio::test]
async fn test_should_filter_with_contains() {
    let conn = memory_connection(Config::default());
    exec(
        &conn,
        "CREATE TABLE Events (tenant STRING HASH KEY, ts NUMBER RANGE KEY)",
    )
    .await;
    exec(
        &conn,
        r#"INSERT INTO Events VALUES ({"tenant": "t", "ts": 1, "tags": ["alpha", "beta"], "msg": "disk full"})"#,
    )
    .await;
    exec(
        &conn,
        r#"INSERT INTO Events VALUES ({"tenant": "t", "ts": 2, "tags": ["gamma"], "msg": "ok"})"#,
    )
    .await;

    // List membership.
    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't' AND contains(tags, 'beta')",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("ts"), Some(&number("1")));

    // Substring match.
    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't' AND contains(msg, 'disk')",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("ts"), Some(&number("1")));
}

#[tokio::test]
async fn test_should_compare_collection_sizes() {
    let conn = memory_connection(Config::default());
    exec(
        &conn,
        "CREATE TABLE Events (tenant STRING HASH KEY, ts NUMBER RANGE KEY)",
    )
    .await;
    exec(
        &conn,
        r#"INSERT INTO Events VALUES ({"tenant": "t", "ts": 1, "tags": ["a", "b", "c"]})"#,
    )
    .await;
    exec(
        &conn,
        r#"INSERT INTO Events VALUES ({"tenant": "t", "ts": 2, "tags": ["a"]})"#,
    )
    .await;

    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't' AND size(tags) > 2",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("ts"), Some(&number("1")));
}

#[tokio::test]
async fn test_should_insert_and_read_back_nested_documents() {
    let conn = memory_connection(Config::default());
    exec(&conn, "CREATE TABLE Users (id STRING HASH KEY)").await;
    exec(
        &conn,
        r#"INSERT INTO Users VALUES ({"id": "u1", "tags": ["a", "b"], "info": {"rating": 4.5}})"#,
    )
    .await;

    let rows = collect(
        &conn,
        "SELECT * FROM Users WHERE id = 'u1'",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("tags"),
        Some(&SqlValue::List(vec![text("a"), text("b")]))
    );
    assert_eq!(
        rows[0].get("info"),
        Some(&SqlValue::Map(vec![("rating".to_owned(), number("4.5"))]))
    );
}

#[tokio::test]
async fn test_should_reject_duplicate_table_creation() {
    let conn = memory_connection(Config::default());
    let sql = "CREATE TABLE T (id STRING HASH KEY, ts NUMBER RANGE KEY, \
               PROVISIONED THROUGHPUT READ 5 WRITE 5)";
    exec(&conn, sql).await;

    let err = conn
        .prepare(sql)
        .unwrap()
        .execute(Params::None, &ExecContext::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        dynasql_driver::Error::Store { source, .. } if !source.is_retryable()
    ));
}

#[tokio::test]
async fn test_should_paginate_transparently_with_small_pages() {
    let conn = memory_connection(Config {
        max_page_size: Some(2),
        ..Default::default()
    });
    exec(
        &conn,
        "CREATE TABLE Events (tenant STRING HASH KEY, ts NUMBER RANGE KEY)",
    )
    .await;
    for ts in 0..7 {
        exec(
            &conn,
            &format!(r#"INSERT INTO Events VALUES ({{"tenant": "t", "ts": {ts}}})"#),
        )
        .await;
    }

    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't'",
        Params::None,
    )
    .await;
    assert_eq!(rows.len(), 7);
    let seen: Vec<_> = rows.iter().map(|r| r.get("ts").cloned().unwrap()).collect();
    let expected: Vec<_> = (0..7).map(|ts| number(&ts.to_string())).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_should_replace_and_return_prior_item() {
    let conn = memory_connection(Config::default());
    exec(&conn, "CREATE TABLE Users (id STRING HASH KEY)").await;
    exec(
        &conn,
        r#"INSERT INTO Users VALUES ({"id": "u1", "name": "Ada"})"#,
    )
    .await;

    let result = conn
        .prepare(r#"REPLACE INTO Users VALUES ({"id": "u1", "name": "Grace"}) RETURNING ALL_OLD"#)
        .unwrap()
        .execute(Params::None, &ExecContext::new())
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 1);
    assert_eq!(
        result.returned_item.unwrap().get("name"),
        Some(&text("Ada"))
    );

    let rows = collect(&conn, "SELECT * FROM Users WHERE id = 'u1'", Params::None).await;
    assert_eq!(rows[0].get("name"), Some(&text("Grace")));
}

#[tokio::test]
async fn test_should_return_no_rows_for_limit_zero() {
    let conn = memory_connection(Config::default());
    exec(
        &conn,
        "CREATE TABLE Events (tenant STRING HASH KEY, ts NUMBER RANGE KEY)",
    )
    .await;
    exec(
        &conn,
        r#"INSERT INTO Events VALUES ({"tenant": "t", "ts": 1})"#,
    )
    .await;

    let rows = collect(
        &conn,
        "SELECT * FROM Events WHERE tenant = 't' LIMIT 0",
        Params::None,
    )
    .await;
    assert!(rows.is_empty());
}
