use chrono::{DateTime, NaiveDate, Utc};
use promantle_core::value::{StorageType, Value};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::error::PostgresAdapterError;

/// The Postgres column type used to materialize each `StorageType`.
#[must_use]
pub const fn column_type_sql(storage_type: StorageType) -> &'static str {
    match storage_type {
        StorageType::Bool => "BOOLEAN",
        StorageType::Int4 => "INTEGER",
        StorageType::Int8 => "BIGINT",
        StorageType::Float8 => "DOUBLE PRECISION",
        StorageType::Numeric => "NUMERIC",
        StorageType::Text => "TEXT",
        StorageType::Bytea => "BYTEA",
        StorageType::TimestampTz => "TIMESTAMPTZ",
        StorageType::Date => "DATE",
    }
}

/// Decode one column of `row` into a dynamic `Value`, given the column's
/// declared `StorageType`.
pub fn decode_column(row: &Row, index: usize, storage_type: StorageType) -> Result<Value, PostgresAdapterError> {
    Ok(match storage_type {
        StorageType::Bool => Value::Bool(row.try_get::<_, bool>(index)?),
        StorageType::Int4 => Value::I32(row.try_get::<_, i32>(index)?),
        StorageType::Int8 => Value::I64(row.try_get::<_, i64>(index)?),
        StorageType::Float8 => Value::F64(row.try_get::<_, f64>(index)?),
        StorageType::Numeric => Value::Decimal(row.try_get::<_, Decimal>(index)?),
        StorageType::Text => Value::Text(row.try_get::<_, String>(index)?),
        StorageType::Bytea => Value::Bytes(row.try_get::<_, Vec<u8>>(index)?),
        StorageType::TimestampTz => Value::Timestamp(row.try_get::<_, DateTime<Utc>>(index)?),
        StorageType::Date => Value::Date(row.try_get::<_, NaiveDate>(index)?),
    })
}

/// Decode a possibly-`NULL` column, used for the `<agg>_count`/`<agg>_value`
/// pair, which stays `NULL` until the first write for that aggregate lands
/// on a row another aggregate created first.
pub fn decode_column_opt(row: &Row, index: usize, storage_type: StorageType) -> Result<Option<Value>, PostgresAdapterError> {
    Ok(match storage_type {
        StorageType::Bool => row.try_get::<_, Option<bool>>(index)?.map(Value::Bool),
        StorageType::Int4 => row.try_get::<_, Option<i32>>(index)?.map(Value::I32),
        StorageType::Int8 => row.try_get::<_, Option<i64>>(index)?.map(Value::I64),
        StorageType::Float8 => row.try_get::<_, Option<f64>>(index)?.map(Value::F64),
        StorageType::Numeric => row.try_get::<_, Option<Decimal>>(index)?.map(Value::Decimal),
        StorageType::Text => row.try_get::<_, Option<String>>(index)?.map(Value::Text),
        StorageType::Bytea => row.try_get::<_, Option<Vec<u8>>>(index)?.map(Value::Bytes),
        StorageType::TimestampTz => row.try_get::<_, Option<DateTime<Utc>>>(index)?.map(Value::Timestamp),
        StorageType::Date => row.try_get::<_, Option<NaiveDate>>(index)?.map(Value::Date),
    })
}

/// Box a dynamic `Value` as a bindable query parameter.
#[must_use]
pub fn encode_param(value: &Value) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Bool(v) => Box::new(*v),
        Value::I32(v) => Box::new(*v),
        Value::I64(v) => Box::new(*v),
        Value::F64(v) => Box::new(*v),
        Value::Decimal(v) => Box::new(*v),
        Value::Text(v) => Box::new(v.clone()),
        Value::Bytes(v) => Box::new(v.clone()),
        Value::Timestamp(v) => Box::new(*v),
        Value::Date(v) => Box::new(*v),
    }
}
