//! Archive database context
//!
//! Owns the connection pool for the lifetime of the application. Components
//! that need persistence borrow it; nothing reaches the database through
//! global state.

use crate::config::Settings;
use crate::db::{self, DbConnection, DbPool};
use crate::error::Result;

/// Handle to an opened image archive
#[derive(Clone)]
pub struct ArchiveDb {
    /// Database connection pool
    pool: DbPool,
    settings: Settings,
}

impl ArchiveDb {
    /// Open (creating if needed) the archive described by `settings` and bring
    /// its schema up to date.
    pub fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let pool = db::init_database(&settings.database_path, &settings)?;
        Ok(Self { pool, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Check a connection out of the pool
    pub fn conn(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Release all pooled connections.
    pub fn close(self) {
        let state = self.pool.state();
        log::info!(
            "Closing image archive {} ({} connection(s), {} idle)",
            self.settings.database_path.display(),
            state.connections,
            state.idle_connections
        );
    }
}

impl std::fmt::Debug for ArchiveDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveDb")
            .field("database_path", &self.settings.database_path)
            .finish()
    }
}
