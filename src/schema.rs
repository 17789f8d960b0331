use std::collections::HashMap;

use crate::error::{Result, StorageError};
use crate::record::FieldAnnotation;

/// Normalized storage roles of one stored field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub column: &'static str,
    pub field: &'static str,
    pub identity: bool,
    pub auto_generated: bool,
    pub in_update: bool,
    pub update_key: bool,
    pub in_insert: bool,
}

impl FieldDescriptor {
    fn from_annotation(annotation: &FieldAnnotation) -> Self {
        let identity = annotation.identity;
        let auto_generated = annotation.auto_generated;
        Self {
            column: annotation.column,
            field: annotation.field,
            identity,
            auto_generated,
            // Identity columns are only ever matched on, never SET.
            in_update: !identity
                && !annotation.exclude_from_update
                && !annotation.update_key
                && !auto_generated,
            update_key: annotation.update_key,
            in_insert: !annotation.exclude_from_insert && !auto_generated,
        }
    }
}

/// The stored fields of a record type, in declaration order.
#[derive(Debug, Clone)]
pub struct Schema {
    descriptors: Vec<FieldDescriptor>,
    by_column: HashMap<&'static str, usize>,
    primary_identity: usize,
}

impl Schema {
    /// Builds descriptors for every annotation that names a column.
    ///
    /// `source_name` only labels errors.
    pub fn extract(source_name: &str, template: &[FieldAnnotation]) -> Result<Self> {
        let mut descriptors = Vec::with_capacity(template.len());
        let mut by_column = HashMap::with_capacity(template.len());

        for annotation in template.iter().filter(|a| !a.column.is_empty()) {
            if by_column
                .insert(annotation.column, descriptors.len())
                .is_some()
            {
                return Err(StorageError::DuplicateColumn {
                    source_name: source_name.to_string(),
                    column: annotation.column.to_string(),
                });
            }
            descriptors.push(FieldDescriptor::from_annotation(annotation));
        }

        let primary_identity = descriptors
            .iter()
            .position(|d| d.identity)
            .ok_or_else(|| StorageError::NoIdentity {
                source_name: source_name.to_string(),
            })?;

        Ok(Self {
            descriptors,
            by_column,
            primary_identity,
        })
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    pub fn by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.by_column.get(column).map(|&i| &self.descriptors[i])
    }

    pub fn identities(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().filter(|d| d.identity)
    }

    /// The first declared identity; used by delete-by-identity.
    pub fn primary_identity(&self) -> &FieldDescriptor {
        &self.descriptors[self.primary_identity]
    }

    /// WHERE keys for UPDATE: the update keys if any are marked, else the identities.
    pub fn update_keys(&self) -> Vec<&FieldDescriptor> {
        let keys: Vec<_> = self.descriptors.iter().filter(|d| d.update_key).collect();
        if keys.is_empty() {
            self.identities().collect()
        } else {
            keys
        }
    }

    pub fn update_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().filter(|d| d.in_update)
    }

    pub fn insert_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().filter(|d| d.in_insert)
    }
}
