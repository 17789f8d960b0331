//! A small blocking pool of SQLite connections.
//!
//! Connections are opened on first demand, up to `max_open_connections`, and
//! handed out as [`PooledConnection`] guards that return them on drop. Callers
//! block while the pool is exhausted. The pool is safe to share across threads
//! behind an `Arc`; accessors rely on that.

use std::ops::Deref;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use crate::config::SqliteConfig;
use crate::error::{Result, StorageError};

#[derive(Default)]
struct PoolState {
    idle: Vec<Connection>,
    open: usize,
}

pub struct ConnectionPool {
    config: SqliteConfig,
    state: Mutex<PoolState>,
    released: Condvar,
}

impl ConnectionPool {
    /// Creates the pool without opening any connection.
    ///
    /// An in-memory database lives inside a single connection, so such pools
    /// are capped at one connection whatever the config asks for.
    pub fn new(mut config: SqliteConfig) -> Self {
        if config.is_in_memory() {
            config.max_open_connections = 1;
        }
        Self {
            config,
            state: Mutex::new(PoolState::default()),
            released: Condvar::new(),
        }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Number of connections currently open, idle or checked out.
    pub fn open_connections(&self) -> usize {
        self.lock().open
    }

    /// Checks out a connection, opening one if the pool is below its limit.
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        let mut state = self.lock();
        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection::new(self, conn));
            }
            let max = self.config.max_open_connections;
            if max == 0 || state.open < max {
                state.open += 1;
                drop(state);
                return match self.open_connection() {
                    Ok(conn) => Ok(PooledConnection::new(self, conn)),
                    Err(err) => {
                        self.lock().open -= 1;
                        self.released.notify_one();
                        Err(err)
                    }
                };
            }
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn open_connection(&self) -> Result<Connection> {
        let conn = if self.config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.config.db_path)
        }
        .map_err(StorageError::Connection)?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))
            .map_err(StorageError::Connection)?;
        info!(db_path = %self.config.db_path, "opened sqlite connection");
        Ok(conn)
    }

    fn release(&self, conn: Connection) {
        self.lock().idle.push(conn);
        self.released.notify_one();
    }

    // The state is a list and a counter; a panic elsewhere cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("open", &state.open)
            .field("idle", &state.idle.len())
            .finish()
    }
}

/// A checked-out connection; goes back to the pool when dropped.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl<'a> PooledConnection<'a> {
    fn new(pool: &'a ConnectionPool, conn: Connection) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("connection is only taken out in drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
