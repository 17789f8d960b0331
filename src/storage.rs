//! Storage accessors: one per record type and table (or view).
//!
//! An accessor compiles its statements at construction and then only
//! assembles the count-dependent parts per call. Every call checks out a
//! pooled connection, prepares its statement right before executing it, and
//! releases both before returning. Nothing is retried.

use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::params_from_iter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::marshal::{extract_into, extract_params, marshal_row, Params};
use crate::pool::ConnectionPool;
use crate::record::Record;
use crate::schema::Schema;
use crate::statement::{Source, StatementKind, StatementSet};
use crate::value::Value;

/// Per-call caps on batch writes, checked before any connection is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    /// Records per multi-row insert
    pub insert: usize,
    /// Identities per bulk delete
    pub remove: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            insert: 1000,
            remove: 1000,
        }
    }
}

/// What a write reported back.
///
/// `last_insert_id` is only meaningful for inserts; other writes report 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(rename = "LastInsertId")]
    pub last_insert_id: i64,
    #[serde(rename = "RowsAffected")]
    pub rows_affected: i64,
}

/// Reads and writes records of type `R`.
///
/// Accessors hold no locks; concurrent use from several threads is as safe as
/// the shared [`ConnectionPool`] makes it.
pub struct Storage<R> {
    pool: Arc<ConnectionPool>,
    source: Source,
    schema: Schema,
    statements: StatementSet,
    limits: BatchLimits,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Storage<R> {
    /// Accessor over a writable table.
    pub fn table(pool: Arc<ConnectionPool>, name: impl Into<String>) -> Result<Self> {
        Self::new(pool, Source::table(name))
    }

    /// Read-only accessor whose rows come from `query`.
    pub fn view(
        pool: Arc<ConnectionPool>,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> Result<Self> {
        Self::new(pool, Source::view(name, query))
    }

    /// Extracts the record schema and compiles its statements.
    ///
    /// Fails with [`StorageError::NoIdentity`] when `R` marks no identity field.
    pub fn new(pool: Arc<ConnectionPool>, source: Source) -> Result<Self> {
        let schema = Schema::extract(source.name(), R::template())?;
        let statements = StatementSet::compile(&source, &schema);
        debug!(
            source = source.name(),
            select = statements.select_prefix(),
            update = statements.update().unwrap_or("-"),
            insert = statements.insert_prefix(),
            "compiled storage statements"
        );
        Ok(Self {
            pool,
            source,
            schema,
            statements,
            limits: BatchLimits::default(),
            _record: PhantomData,
        })
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    pub fn insert_limit(&self) -> usize {
        self.limits.insert
    }

    pub fn set_insert_limit(&mut self, limit: usize) {
        self.limits.insert = limit;
    }

    pub fn remove_limit(&self) -> usize {
        self.limits.remove
    }

    pub fn set_remove_limit(&mut self, limit: usize) {
        self.limits.remove = limit;
    }

    pub fn is_view(&self) -> bool {
        self.source.is_view()
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn statements(&self) -> &StatementSet {
        &self.statements
    }

    /// Records whose `keys` columns equal `values`; all records when `keys` is empty.
    pub fn get(&self, keys: &[&str], values: &[Value]) -> Result<Vec<R>> {
        self.check_keys("get", keys, values)?;
        let sql = self.statements.select_sql(keys);
        self.query(&sql, &Params::from(values))
    }

    /// Records matching a caller-built WHERE expression.
    ///
    /// The expression is appended verbatim and must only take input through
    /// `values`.
    pub fn get_where(&self, expression: &str, values: &[Value]) -> Result<Vec<R>> {
        let sql = self.statements.select_where_sql(expression);
        self.query(&sql, &Params::from(values))
    }

    pub fn update(&self, record: &R) -> Result<Outcome> {
        self.ensure_writable("update")?;
        let sql = self
            .statements
            .update()
            .ok_or_else(|| StorageError::NothingToUpdate {
                source_name: self.source.name().to_string(),
            })?;
        let params = extract_params(record, self.statements.update_fields())?;
        self.execute(StatementKind::Update, sql, &params)
    }

    /// Inserts all `records` with a single multi-row statement.
    pub fn insert(&self, records: &[R]) -> Result<Outcome> {
        const OPERATION: &str = "insert";
        self.ensure_writable(OPERATION)?;
        if records.is_empty() {
            return Err(StorageError::InvalidArgument {
                operation: OPERATION,
                message: "expected at least 1 record, got 0".to_string(),
            });
        }
        self.check_limit(OPERATION, self.limits.insert, records.len())?;

        let fields = self.statements.insert_fields();
        if fields.is_empty() {
            return Err(StorageError::NothingToInsert {
                source_name: self.source.name().to_string(),
            });
        }
        let mut params = Params::new();
        for record in records {
            extract_into(&mut params, record, fields)?;
        }
        let sql = self.statements.insert_sql(records.len());
        self.execute(StatementKind::Insert, &sql, &params)
    }

    /// Deletes by the primary identity column: `=` for one value, `IN` for more.
    pub fn remove_by_identity(&self, identities: &[Value]) -> Result<Outcome> {
        const OPERATION: &str = "remove_by_identity";
        self.ensure_writable(OPERATION)?;
        let params = Params::from(identities);
        match identities.len() {
            0 => Err(StorageError::InvalidArgument {
                operation: OPERATION,
                message: "expected at least 1 identity, got 0".to_string(),
            }),
            1 => self.execute(StatementKind::Delete, self.statements.delete_one(), &params),
            n => {
                self.check_limit(OPERATION, self.limits.remove, n)?;
                let sql = self.statements.delete_in_sql(n);
                self.execute(StatementKind::Delete, &sql, &params)
            }
        }
    }

    /// Deletes rows whose `keys` columns equal `values`.
    pub fn remove(&self, keys: &[&str], values: &[Value]) -> Result<Outcome> {
        const OPERATION: &str = "remove";
        self.ensure_writable(OPERATION)?;
        if keys.is_empty() {
            return Err(StorageError::InvalidArgument {
                operation: OPERATION,
                message: "expected at least 1 key, got 0".to_string(),
            });
        }
        self.check_keys(OPERATION, keys, values)?;
        let sql = self.statements.delete_by_keys_sql(keys);
        self.execute(StatementKind::Delete, &sql, &Params::from(values))
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        match &self.source {
            Source::View { name, .. } => Err(StorageError::ReadOnlyView {
                view: name.clone(),
                operation,
            }),
            Source::Table(_) => Ok(()),
        }
    }

    fn check_limit(&self, operation: &'static str, limit: usize, got: usize) -> Result<()> {
        if got > limit {
            warn!(source = self.source.name(), operation, limit, got, "batch over limit");
            return Err(StorageError::BatchLimit {
                operation,
                limit,
                got,
            });
        }
        Ok(())
    }

    fn check_keys(&self, operation: &'static str, keys: &[&str], values: &[Value]) -> Result<()> {
        if keys.len() != values.len() {
            return Err(StorageError::InvalidArgument {
                operation,
                message: format!("got {} keys and {} values", keys.len(), values.len()),
            });
        }
        // Keys may name columns the record does not map; they are spliced into
        // the statement text, so only identifiers get through.
        if let Some(invalid) = keys.iter().find(|k| !is_column_identifier(k)) {
            return Err(StorageError::InvalidColumn {
                column: invalid.to_string(),
            });
        }
        Ok(())
    }

    fn query(&self, sql: &str, params: &Params) -> Result<Vec<R>> {
        let kind = StatementKind::Select;
        debug!(%kind, sql, params = params.len(), "executing statement");

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql).map_err(StorageError::execution(kind))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(StorageError::execution(kind))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(StorageError::execution(kind))? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::execution(kind))?;
            records.push(marshal_row(&self.schema, &columns, values)?);
        }
        Ok(records)
    }

    fn execute(&self, kind: StatementKind, sql: &str, params: &Params) -> Result<Outcome> {
        debug!(%kind, sql, params = params.len(), "executing statement");

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql).map_err(StorageError::execution(kind))?;
        let affected = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(StorageError::execution(kind))?;
        let last_insert_id = match kind {
            StatementKind::Insert => conn.last_insert_rowid(),
            _ => 0,
        };
        Ok(Outcome {
            last_insert_id,
            rows_affected: i64::try_from(affected).unwrap_or(i64::MAX),
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_.]*`
fn is_column_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
