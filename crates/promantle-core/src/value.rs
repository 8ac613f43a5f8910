use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::Error;

///
/// Value
///
/// A small tagged dynamic value used only at the core/adapter boundary.
/// Keys and aggregate values are converted to and from `Value` so that a
/// single bucket row, whose aggregate columns may each hold a different
/// Rust type, can flow through one non-generic `TableAdapter` trait.
///
/// This is a strongly-typed replacement for reflection-driven dynamic
/// dispatch: every conversion back to a caller's expected type goes through
/// `ColumnValue::from_value`, which is the sole place a `TypeMismatch` can
/// be raised.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl Value {
    /// Short tag name used in `TypeMismatch` messages and adapter
    /// diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F64(_) => "f64",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
        }
    }
}

///
/// StorageType
///
/// Declares how a key or aggregate column should be materialized by the
/// adapter. The core never interprets this beyond carrying it from the
/// builder to `ensure_table`; only the adapter's DDL generation reads it.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageType {
    Bool,
    Int4,
    Int8,
    Float8,
    Numeric,
    Text,
    Bytea,
    TimestampTz,
    Date,
}

impl StorageType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int4 => "int4",
            Self::Int8 => "int8",
            Self::Float8 => "float8",
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Bytea => "bytea",
            Self::TimestampTz => "timestamptz",
            Self::Date => "date",
        }
    }
}

///
/// ColumnValue
///
/// Implemented by every Rust type usable as a key type `K` or aggregate
/// value type `A`. Conversion is total in one direction (`to_value` never
/// fails) and fallible in the other (`from_value` fails with
/// `Error::TypeMismatch` when the stored tag doesn't match `Self`).
///

pub trait ColumnValue: Clone + Send + Sync + 'static {
    /// The storage type the adapter should materialize this column as.
    fn storage_type() -> StorageType;

    /// Convert this value into the dynamic wire representation.
    fn to_value(&self) -> Value;

    /// Recover a typed value from its dynamic representation, failing with
    /// `Error::TypeMismatch` (tagged with `aggregate`) if the tag is wrong.
    fn from_value(value: Value, aggregate: &str) -> Result<Self, Error>;
}

macro_rules! impl_column_value {
    ($ty:ty, $storage:expr, $variant:ident) => {
        impl ColumnValue for $ty {
            fn storage_type() -> StorageType {
                $storage
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value, aggregate: &str) -> Result<Self, Error> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(Error::TypeMismatch {
                        aggregate: aggregate.to_string(),
                        detail: format!(
                            "expected {}, found {}",
                            stringify!($ty),
                            other.type_name()
                        ),
                    }),
                }
            }
        }
    };
}

impl_column_value!(bool, StorageType::Bool, Bool);
impl_column_value!(i32, StorageType::Int4, I32);
impl_column_value!(i64, StorageType::Int8, I64);
impl_column_value!(f64, StorageType::Float8, F64);
impl_column_value!(Decimal, StorageType::Numeric, Decimal);
impl_column_value!(String, StorageType::Text, Text);
impl_column_value!(Vec<u8>, StorageType::Bytea, Bytes);
impl_column_value!(DateTime<Utc>, StorageType::TimestampTz, Timestamp);
impl_column_value!(NaiveDate, StorageType::Date, Date);
