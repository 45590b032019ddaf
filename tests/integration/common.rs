//! Shared fixtures for the integration tests.

use db_sqlvet::config::ConnectionDescriptor;
use db_sqlvet::db::Dialect;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

/// Creates a SQLite database with `customers` and `orders` tables and
/// returns a descriptor pointing at it. The file lives as long as `dir`.
pub async fn seeded_sqlite(dir: &TempDir) -> ConnectionDescriptor {
    let path = dir.path().join("shop.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();

    let mut seed = String::from(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE orders (id INTEGER PRIMARY KEY, cid INTEGER REFERENCES customers(id), total REAL);
         INSERT INTO customers (name) VALUES ('ada'), ('grace');",
    );
    for i in 0..20 {
        seed.push_str(&format!(
            "INSERT INTO orders (cid, total) VALUES ({}, {}.5);",
            i % 2 + 1,
            i
        ));
    }

    sqlx::raw_sql(&seed).execute(&mut conn).await.unwrap();
    conn.close().await.unwrap();

    ConnectionDescriptor::new(Dialect::Sqlite, path.to_string_lossy().into_owned())
}

/// Reads a live server URL from the environment.
pub fn live_url(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|url| !url.is_empty())
}
