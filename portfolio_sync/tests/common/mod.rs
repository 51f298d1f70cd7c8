#![allow(dead_code)]

use std::{io::Write, path::PathBuf};

use chrono::NaiveDate;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use portfolio_sync::db::{connection, migrate};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}
#[derive(QueryableByName)]
struct Cnt {
    #[diesel(sql_type = BigInt)]
    cnt: i64,
}

pub struct TestDb {
    pub dir: TempDir, // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

impl TestDb {
    /// Writes `contents` to a file inside the test directory.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut f = std::fs::File::create(&path).expect("create file");
        f.write_all(contents.as_bytes()).expect("write file");
        path
    }
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("test.db").to_string_lossy().to_string();

    let mut conn = connection::connect_sqlite(&path).expect("connect");
    migrate::ensure_schema(&mut conn).expect("schema");
    (TestDb { dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

/// `SELECT COUNT(*)` over any table, view or filtered expression.
pub fn count(conn: &mut SqliteConnection, from: &str) -> i64 {
    let q = format!("SELECT COUNT(*) AS cnt FROM {from}");
    diesel::sql_query(q).get_result::<Cnt>(conn).unwrap().cnt
}

pub fn fk_check_empty(conn: &mut SqliteConnection) {
    #[derive(QueryableByName)]
    struct FkRow {
        #[diesel(sql_type = Text)]
        table: String,
    }
    let rows: Vec<FkRow> = diesel::sql_query("PRAGMA foreign_key_check;")
        .load(conn)
        .unwrap();
    assert!(
        rows.is_empty(),
        "foreign key violations in: {:?}",
        rows.iter().map(|r| &r.table).collect::<Vec<_>>()
    );
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub const REFERENCE_CSV: &str = "\
symbol,organ_name,icb_name,exchange,website
AAA,Acme Corp,Banking,HOSE,acme.vn
BBB, Beta Steel ,Materials,HNX,
CCC,Gamma Retail,Retail,UPCOM,
AAA,Acme Corp Renamed,Banking,HOSE,
DDD,,Retail,HOSE,
";
