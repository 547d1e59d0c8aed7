use rankboard_core::db::migrations::latest_version;
use rankboard_core::db::{open_db, open_db_in_memory, open_db_with_options, DbError, DbOptions};
use rankboard_core::{RankStoreError, SqliteRankStore};
use rusqlite::Connection;
use std::time::Duration;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "containers");
    assert_table_exists(&conn, "members");
}

#[test]
fn reopening_file_database_keeps_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "members");
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rank_store_refuses_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteRankStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RankStoreError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn rank_uniqueness_is_enforced_by_schema() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO containers (container_uuid) VALUES ('c');
         INSERT INTO members (member_uuid, container_uuid, sort_order) VALUES ('a', 'c', 0);",
    )
    .unwrap();
    let duplicate = conn.execute(
        "INSERT INTO members (member_uuid, container_uuid, sort_order) VALUES ('b', 'c', 0);",
        [],
    );
    assert!(duplicate.is_err());
}

#[test]
fn options_apply_busy_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db_with_options(
        dir.path().join("timeout.db"),
        &DbOptions {
            busy_timeout: Duration::from_millis(250),
        },
    )
    .unwrap();
    let timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 250);

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
