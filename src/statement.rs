//! Statement templates compiled once per accessor.
//!
//! Only the parts that depend on a call's argument count are assembled per
//! call: the number of insert value groups, the IN-list arity, and ad-hoc
//! equality keys.

use std::fmt;

use crate::schema::Schema;

/// Where an accessor reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Table(String),
    /// Read-only; rows come from `query`, exposed under `name`.
    View { name: String, query: String },
}

impl Source {
    pub fn table(name: impl Into<String>) -> Self {
        Source::Table(name.into())
    }

    pub fn view(name: impl Into<String>, query: impl Into<String>) -> Self {
        Source::View {
            name: name.into(),
            query: query.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Source::Table(name) | Source::View { name, .. } => name,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Source::View { .. })
    }

    fn read_expression(&self) -> String {
        match self {
            Source::Table(name) => name.clone(),
            Source::View { name, query } => {
                let query = query.trim_end_matches([' ', ';']);
                format!("({query}) AS {name}")
            }
        }
    }
}

/// Statement family, reported with execution errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Update,
    Insert,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Select => "SELECT",
            StatementKind::Update => "UPDATE",
            StatementKind::Insert => "INSERT",
            StatementKind::Delete => "DELETE",
        })
    }
}

/// The compiled statement text and bind orders for one record type.
#[derive(Debug, Clone)]
pub struct StatementSet {
    source_name: String,
    select_prefix: String,
    update: Option<String>,
    update_fields: Vec<&'static str>,
    insert_prefix: String,
    insert_group: String,
    insert_fields: Vec<&'static str>,
    identity_field: &'static str,
    delete_one: String,
    delete_in_prefix: String,
}

impl StatementSet {
    pub fn compile(source: &Source, schema: &Schema) -> Self {
        let name = source.name();

        let select_columns = join(schema.descriptors().iter().map(|d| d.column), ", ");
        let select_prefix = format!(
            "SELECT {select_columns} FROM {}",
            source.read_expression()
        );

        let set: Vec<_> = schema.update_fields().collect();
        let keys = schema.update_keys();
        let update = (!set.is_empty()).then(|| {
            format!(
                "UPDATE {name} SET {} WHERE {};",
                join(set.iter().map(|d| format!("{} = ?", d.column)), ", "),
                equality_clause(keys.iter().map(|d| d.column)),
            )
        });
        let update_fields = set
            .iter()
            .chain(keys.iter())
            .map(|d| d.field)
            .collect();

        let insert: Vec<_> = schema.insert_fields().collect();
        let insert_prefix = format!(
            "INSERT INTO {name} ({}) VALUES ",
            join(insert.iter().map(|d| d.column), ", ")
        );
        let insert_group = format!("({})", placeholders(insert.len()));
        let insert_fields = insert.iter().map(|d| d.field).collect();

        let identity = schema.primary_identity();
        let delete_one = format!("DELETE FROM {name} WHERE {} = ?;", identity.column);
        let delete_in_prefix = format!("DELETE FROM {name} WHERE {} IN (", identity.column);

        Self {
            source_name: name.to_string(),
            select_prefix,
            update,
            update_fields,
            insert_prefix,
            insert_group,
            insert_fields,
            identity_field: identity.field,
            delete_one,
            delete_in_prefix,
        }
    }

    pub fn select_prefix(&self) -> &str {
        &self.select_prefix
    }

    /// `None` when the record type has nothing to SET.
    pub fn update(&self) -> Option<&str> {
        self.update.as_deref()
    }

    /// SET fields followed by WHERE fields, in bind order.
    pub fn update_fields(&self) -> &[&'static str] {
        &self.update_fields
    }

    pub fn insert_prefix(&self) -> &str {
        &self.insert_prefix
    }

    pub fn insert_group(&self) -> &str {
        &self.insert_group
    }

    pub fn insert_fields(&self) -> &[&'static str] {
        &self.insert_fields
    }

    pub fn identity_field(&self) -> &'static str {
        self.identity_field
    }

    pub fn delete_one(&self) -> &str {
        &self.delete_one
    }

    pub fn select_sql(&self, keys: &[&str]) -> String {
        if keys.is_empty() {
            format!("{};", self.select_prefix)
        } else {
            format!(
                "{} WHERE {};",
                self.select_prefix,
                equality_clause(keys.iter().copied())
            )
        }
    }

    /// Appends a caller-built WHERE expression verbatim.
    pub fn select_where_sql(&self, expression: &str) -> String {
        format!("{} WHERE {expression};", self.select_prefix)
    }

    pub fn insert_sql(&self, records: usize) -> String {
        let groups = vec![self.insert_group.as_str(); records];
        format!("{}{};", self.insert_prefix, groups.join(", "))
    }

    pub fn delete_in_sql(&self, identities: usize) -> String {
        format!("{}{});", self.delete_in_prefix, placeholders(identities))
    }

    pub fn delete_by_keys_sql(&self, keys: &[&str]) -> String {
        format!(
            "DELETE FROM {} WHERE {};",
            self.source_name,
            equality_clause(keys.iter().copied())
        )
    }
}

fn join<S: AsRef<str>>(parts: impl IntoIterator<Item = S>, separator: &str) -> String {
    let mut out = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        out.push_str(part.as_ref());
    }
    out
}

fn equality_clause<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    join(columns.into_iter().map(|c| format!("{c} = ?")), " AND ")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
