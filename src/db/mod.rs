use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::error::{NewsgraphError, Result};

pub mod migrate;
pub mod runs;

pub use runs::{delete_run, list_runs, load_run, save_run, RunSummary, StoredRun};

/// Database connection wrapper
///
/// Connections are opened per call on the blocking pool; the run history is
/// small and written once per graph build.
pub struct Db {
    path: PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new database connection with pragmas applied
    pub fn open_connection(&self) -> Result<Connection> {
        open(&self.path)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| NewsgraphError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    /// Apply pending migrations from `migrations_dir`
    pub async fn migrate(&self, migrations_dir: &Path) -> Result<()> {
        let dir = migrations_dir.to_path_buf();
        self.with_connection(move |conn| migrate::run_migrations(conn, &dir))
            .await
    }
}

fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;

    // WAL so the server can read history while a run is being saved;
    // foreign keys for the node/edge cascade.
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA temp_store = MEMORY;",
    )?;

    Ok(conn)
}

#[cfg(test)]
pub(crate) async fn test_db(dir: &tempfile::TempDir) -> Db {
    let db = Db::new(dir.path().join("test.db"));
    db.migrate(&Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await
        .unwrap();
    db
}
