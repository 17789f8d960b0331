use serde::{Deserialize, Serialize};

const IN_MEMORY: &str = ":memory:";

/// SQLite connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: String,
    /// Upper bound on simultaneously open connections; 0 means unbounded
    pub max_open_connections: usize,
    /// How long a connection waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            db_path: IN_MEMORY.to_string(),
            max_open_connections: 10,
            busy_timeout_ms: 5_000,
        }
    }
}

impl SqliteConfig {
    /// Create a new SQLite config for a database file
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// An in-memory database.
    ///
    /// Every SQLite connection to `:memory:` gets its own database, so the pool
    /// is limited to one connection.
    pub fn in_memory() -> Self {
        Self {
            max_open_connections: 1,
            ..Self::default()
        }
    }

    pub fn with_max_open_connections(mut self, max: usize) -> Self {
        self.max_open_connections = max;
        self
    }

    pub fn with_busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY
    }
}
