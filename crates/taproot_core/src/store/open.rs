//! Document database bootstrap.
//!
//! # Responsibility
//! - Open file or in-memory document databases.
//! - Configure pragmas and apply migrations before handing the connection out.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and migrations applied.

use super::migrations::apply_migrations;
use super::StoreResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a document database file, migrating it as needed.
pub fn open_document_db(path: impl AsRef<Path>) -> StoreResult<Connection> {
    bootstrap(Connection::open(path), "file")
}

/// Opens an in-memory document database, mainly for tests and scratch work.
pub fn open_document_db_in_memory() -> StoreResult<Connection> {
    bootstrap(Connection::open_in_memory(), "memory")
}

fn bootstrap(
    opened: Result<Connection, rusqlite::Error>,
    mode: &'static str,
) -> StoreResult<Connection> {
    let started_at = Instant::now();
    info!("event=document_db_open module=store status=start mode={mode}");

    let outcome = opened.map_err(Into::into).and_then(|mut conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &outcome {
        Ok(_) => info!(
            "event=document_db_open module=store status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=document_db_open module=store status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
    outcome
}
