//! SQLite connection helpers.

use std::{
    ops::{Deref, DerefMut},
    path::Path,
};

use diesel::{Connection, ConnectionError, SqliteConnection, connection::SimpleConnection};
use tracing::{debug, info};

use crate::error::StoreError;

/// Accepts bare paths as well as `sqlite:` / `sqlite://` URLs.
pub fn sqlite_path(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}

/// Open a SQLite connection and apply connection-wide PRAGMAs.
///
/// The parent directory of a file database is created when missing.
pub fn connect_sqlite(database_url: &str) -> Result<SqliteConnection, StoreError> {
    let path = sqlite_path(database_url);
    let fail = |source| StoreError::Connection {
        url: database_url.to_string(),
        source,
    };

    if path != ":memory:" {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| fail(ConnectionError::BadConnection(e.to_string())))?;
        }
    }

    let mut conn = SqliteConnection::establish(path).map_err(fail)?;
    conn.batch_execute("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
        .map_err(|e| fail(ConnectionError::CouldntSetupConfiguration(e)))?;
    debug!(path, "sqlite connection opened");
    Ok(conn)
}

/// The single store handle held for one run. Released (and logged) when dropped,
/// whichever way the run ends.
pub struct StoreSession {
    conn: SqliteConnection,
    url: String,
}

impl StoreSession {
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        let conn = connect_sqlite(database_url)?;
        info!(url = database_url, "store session opened");
        Ok(Self {
            conn,
            url: database_url.to_string(),
        })
    }
}

impl Deref for StoreSession {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for StoreSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        info!(url = %self.url, "store session released");
    }
}
