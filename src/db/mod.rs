//! Database module for the image archive
//!
//! Provides SQLite database access via Diesel ORM.

pub mod models;
pub mod repository;
pub mod schema;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;

use crate::config::Settings;
use crate::error::{ArchiveError, Result};

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Per-connection pragmas. SQLite keeps these per connection, so they are
/// applied whenever the pool opens a new one.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Establish a connection pool to the SQLite database
pub fn establish_connection(database_url: &str, settings: &Settings) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(settings.pool_size)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: settings.busy_timeout_ms,
        }))
        .build(manager)?;
    Ok(pool)
}

/// Run pending database migrations
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ArchiveError::Migration(e.to_string()))?;
    if !applied.is_empty() {
        log::info!("Applied {} database migration(s)", applied.len());
    }
    Ok(())
}

/// Initialize the database with a connection pool
pub fn init_database(database_path: &Path, settings: &Settings) -> Result<DbPool> {
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let database_url = database_path.to_string_lossy();
    let pool = establish_connection(&database_url, settings)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    log::info!("Image archive opened at {}", database_path.display());
    Ok(pool)
}
