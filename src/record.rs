//! Record type templates.
//!
//! A record type describes itself through a static table of [`FieldAnnotation`]s
//! and exposes its fields by identifier, once for reading ([`Record::field_value`])
//! and once for writing ([`Record::field_mut`]). The [`storage_record!`] macro
//! writes all three for a plain struct.
//!
//! [`storage_record!`]: crate::storage_record

use crate::value::Value;

/// Storage metadata for one field of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAnnotation {
    pub field: &'static str,
    /// Empty when the field is not stored.
    pub column: &'static str,
    pub identity: bool,
    pub update_key: bool,
    pub exclude_from_update: bool,
    pub exclude_from_insert: bool,
    pub auto_generated: bool,
}

impl FieldAnnotation {
    pub const fn new(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            identity: false,
            update_key: false,
            exclude_from_update: false,
            exclude_from_insert: false,
            auto_generated: false,
        }
    }

    /// A field that lives on the record but has no column.
    pub const fn unmapped(field: &'static str) -> Self {
        Self::new(field, "")
    }

    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Use this field instead of the identity in the UPDATE's WHERE clause.
    pub const fn update_key(mut self) -> Self {
        self.update_key = true;
        self
    }

    pub const fn exclude_from_update(mut self) -> Self {
        self.exclude_from_update = true;
        self
    }

    pub const fn exclude_from_insert(mut self) -> Self {
        self.exclude_from_insert = true;
        self
    }

    /// Assigned by the engine; never inserted or updated.
    pub const fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }
}

/// Mutable access to one record field, tagged with the field's kind.
#[derive(Debug)]
pub enum FieldMut<'a> {
    Integer(&'a mut i64),
    Int32(&'a mut i32),
    Float(&'a mut f64),
    Bool(&'a mut bool),
    Text(&'a mut String),
    Bytes(&'a mut Vec<u8>),
    OptInteger(&'a mut Option<i64>),
    OptInt32(&'a mut Option<i32>),
    OptBool(&'a mut Option<bool>),
    OptFloat(&'a mut Option<f64>),
    OptText(&'a mut Option<String>),
    OptBytes(&'a mut Option<Vec<u8>>),
}

impl FieldMut<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldMut::Integer(_) | FieldMut::OptInteger(_) => "integer",
            FieldMut::Int32(_) | FieldMut::OptInt32(_) => "int32",
            FieldMut::Float(_) | FieldMut::OptFloat(_) => "float",
            FieldMut::Bool(_) | FieldMut::OptBool(_) => "bool",
            FieldMut::Text(_) | FieldMut::OptText(_) => "text",
            FieldMut::Bytes(_) | FieldMut::OptBytes(_) => "bytes",
        }
    }
}

macro_rules! field_mut_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a mut $ty> for FieldMut<'a> {
                fn from(slot: &'a mut $ty) -> Self {
                    FieldMut::$variant(slot)
                }
            }
        )*
    };
}

field_mut_from! {
    i64 => Integer,
    i32 => Int32,
    f64 => Float,
    bool => Bool,
    String => Text,
    Vec<u8> => Bytes,
    Option<i64> => OptInteger,
    Option<i32> => OptInt32,
    Option<bool> => OptBool,
    Option<f64> => OptFloat,
    Option<String> => OptText,
    Option<Vec<u8>> => OptBytes,
}

/// A storage-backed record type.
pub trait Record: Default {
    /// Annotations in declaration order. Statement column order follows it.
    fn template() -> &'static [FieldAnnotation];

    /// Current value of `field`, or `None` if the record has no such field.
    fn field_value(&self, field: &str) -> Option<Value>;

    fn field_mut(&mut self, field: &str) -> Option<FieldMut<'_>>;
}

/// Implements [`Record`] for a struct from a list of `field => "column" [flags]`.
///
/// Flags are the [`FieldAnnotation`] builder methods: `identity`, `update_key`,
/// `exclude_from_update`, `exclude_from_insert`, `auto_generated`. Fields left
/// out of the list are not stored.
///
/// ```rust,ignore
/// storage_record!(Account {
///     id => "id" [identity, auto_generated],
///     email => "email" [update_key],
///     balance => "balance",
/// });
/// ```
#[macro_export]
macro_rules! storage_record {
    ($record:ty { $($field:ident => $column:literal $([$($flag:ident),* $(,)?])?),* $(,)? }) => {
        impl $crate::Record for $record {
            fn template() -> &'static [$crate::FieldAnnotation] {
                const TEMPLATE: &[$crate::FieldAnnotation] = &[
                    $(
                        $crate::FieldAnnotation::new(stringify!($field), $column)
                            $($(.$flag())*)?
                    ),*
                ];
                TEMPLATE
            }

            fn field_value(&self, field: &str) -> ::std::option::Option<$crate::Value> {
                $(
                    if field == stringify!($field) {
                        return ::std::option::Option::Some($crate::Value::from(
                            ::std::clone::Clone::clone(&self.$field),
                        ));
                    }
                )*
                ::std::option::Option::None
            }

            fn field_mut(&mut self, field: &str) -> ::std::option::Option<$crate::FieldMut<'_>> {
                $(
                    if field == stringify!($field) {
                        return ::std::option::Option::Some($crate::FieldMut::from(&mut self.$field));
                    }
                )*
                ::std::option::Option::None
            }
        }
    };
}
