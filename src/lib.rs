//! Record-type storage accessors over SQLite.
//!
//! # Intention
//!
//! - Describe a record type once (columns, identity, update and insert roles).
//! - Compile its SELECT/UPDATE/INSERT/DELETE statements once per accessor.
//! - Marshal rows into records and records into bound parameters.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No query planning, transactions, migrations or row caching.
//! - The connection pool is injected; accessors never open connections on their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rust_sqlite_storage::{storage_record, ConnectionPool, SqliteConfig, Storage, Value};
//!
//! #[derive(Debug, Default, Clone)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! storage_record!(User {
//!     id => "id" [identity, auto_generated],
//!     name => "name",
//! });
//!
//! let pool = Arc::new(ConnectionPool::new(SqliteConfig::new("app.db")));
//! let users = Storage::<User>::table(pool, "users")?;
//! let found = users.get(&["id"], &[Value::from(42)])?;
//! ```

pub mod config;
pub mod error;
pub mod marshal;
pub mod pool;
pub mod record;
pub mod schema;
pub mod statement;
pub mod storage;
pub mod value;

pub use config::SqliteConfig;
pub use error::{DecodeError, Result, StorageError};
pub use marshal::{extract_params, marshal_row, Params};
pub use pool::{ConnectionPool, PooledConnection};
pub use record::{FieldAnnotation, FieldMut, Record};
pub use schema::{FieldDescriptor, Schema};
pub use statement::{Source, StatementKind, StatementSet};
pub use storage::{BatchLimits, Outcome, Storage};
pub use value::Value;
