//! Fixed-size SQLite connection pool
//!
//! `rusqlite::Connection` is `Send` but not `Sync`, so each worker checks out
//! its own connection and returns it when the guard drops. A semaphore bounds
//! the number of connections in use at once.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

use super::{StoreError, StoreResult};

pub const DEFAULT_POOL_SIZE: usize = 4;

/// Pool of connections to one SQLite database file
pub struct SqlitePool {
    path: PathBuf,
    size: usize,
    idle: Mutex<Vec<Connection>>,
    permits: Semaphore,
}

impl SqlitePool {
    /// Open `size` connections to the database at `path`
    pub fn open(path: impl AsRef<Path>, size: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let size = size.max(1);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Pool(format!("cannot create {}: {e}", parent.display())))?;
            }
        }

        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            idle.push(open_connection(&path)?);
        }

        debug!(path = %path.display(), size, "SQLite pool opened");

        Ok(Self {
            path,
            size,
            idle: Mutex::new(idle),
            permits: Semaphore::new(size),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of connections currently checked in
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Wait for a free connection
    pub async fn checkout(&self) -> StoreResult<PooledConnection<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::Pool("pool closed".to_string()))?;

        let conn = {
            let mut idle = self
                .idle
                .lock()
                .map_err(|_| StoreError::Pool("pool mutex poisoned".to_string()))?;
            idle.pop()
        };

        // A connection dropped by a panicking holder is replaced here.
        let conn = match conn {
            Some(conn) => conn,
            None => open_connection(&self.path)?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self,
            _permit: permit,
        })
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
        }
    }
}

fn open_connection(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/// A checked-out connection, returned to the pool on drop
pub struct PooledConnection<'a> {
    conn: Option<Connection>,
    pool: &'a SqlitePool,
    _permit: SemaphorePermit<'a>,
}

impl PooledConnection<'_> {
    /// Take the connection out, e.g. to move it onto a blocking thread
    ///
    /// The permit stays held until the guard drops. If the connection is
    /// never re-attached the pool opens a replacement on a later checkout.
    pub fn detach(&mut self) -> Option<Connection> {
        self.conn.take()
    }

    pub fn attach(&mut self, conn: Connection) {
        self.conn = Some(conn);
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `None` while detached or after drop has taken it.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection detached"))
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("connection detached"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
    }
}
