use promantle_core::adapter::TableSpec;
use promantle_core::sanitize::{aggregate_column_names, sanitize_identifier};

use crate::codec::column_type_sql;

/// Every identifier this module emits is double-quoted, since a sanitized
/// group name is still free to start with a digit or collide with a
/// reserved word once it reaches DDL.
fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

#[must_use]
pub fn create_table_sql(spec: &TableSpec) -> String {
    let table = quote(&spec.location.table_name());
    let key_type = column_type_sql(spec.key_type);

    let mut columns = vec![
        "position BIGINT PRIMARY KEY".to_string(),
        "parent_position BIGINT NOT NULL".to_string(),
        format!("lower_bound {key_type} NOT NULL"),
        format!("upper_bound {key_type} NOT NULL"),
    ];

    for aggregate in &spec.aggregates {
        let (count_column, value_column) = aggregate_column_names(&aggregate.name);
        let value_type = column_type_sql(aggregate.storage_type);
        columns.push(format!("{} BIGINT", quote(&count_column)));
        columns.push(format!("{} {value_type}", quote(&value_column)));
    }

    format!("CREATE TABLE IF NOT EXISTS {table} (\n  {}\n)", columns.join(",\n  "))
}

#[must_use]
pub fn create_parent_position_index_sql(table_name: &str) -> String {
    let table = quote(table_name);
    let index = quote(&sanitize_identifier(&format!("{table_name}_parent_position_idx")));
    format!("CREATE INDEX IF NOT EXISTS {index} ON {table} (parent_position)")
}

#[must_use]
pub fn drop_table_sql(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote(table_name))
}

/// Upsert-by-position for one aggregate's `(count, value)` pair. Every other
/// aggregate's columns are left untouched by the `DO UPDATE SET` clause, so
/// concurrent per-aggregate writes to the same `position` never clobber each
/// other's value column.
#[must_use]
pub fn upsert_sql(table_name: &str, aggregate_name: &str) -> String {
    let table = quote(table_name);
    let (count_column, value_column) = aggregate_column_names(aggregate_name);
    format!(
        "INSERT INTO {table} (position, parent_position, lower_bound, upper_bound, {count_col}, {value_col}) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (position) DO UPDATE SET \
         parent_position = EXCLUDED.parent_position, \
         lower_bound = EXCLUDED.lower_bound, \
         upper_bound = EXCLUDED.upper_bound, \
         {count_col} = EXCLUDED.{count_col}, \
         {value_col} = EXCLUDED.{value_col}",
        count_col = quote(&count_column),
        value_col = quote(&value_column),
    )
}

#[must_use]
pub fn select_at_sql(table_name: &str, aggregate_name: &str) -> String {
    let table = quote(table_name);
    let (count_column, value_column) = aggregate_column_names(aggregate_name);
    format!(
        "SELECT position, parent_position, lower_bound, upper_bound, {}, {} FROM {table} WHERE position = $1",
        quote(&count_column),
        quote(&value_column),
    )
}

#[must_use]
pub fn select_range_sql(table_name: &str, aggregate_name: &str) -> String {
    let table = quote(table_name);
    let (count_column, value_column) = aggregate_column_names(aggregate_name);
    format!(
        "SELECT position, parent_position, lower_bound, upper_bound, {}, {} FROM {table} \
         WHERE position BETWEEN $1 AND $2 ORDER BY position ASC",
        quote(&count_column),
        quote(&value_column),
    )
}

#[must_use]
pub fn select_children_sql(table_name: &str, aggregate_name: &str) -> String {
    let table = quote(table_name);
    let (count_column, value_column) = aggregate_column_names(aggregate_name);
    format!(
        "SELECT position, parent_position, lower_bound, upper_bound, {}, {} FROM {table} \
         WHERE parent_position = $1 ORDER BY position ASC",
        quote(&count_column),
        quote(&value_column),
    )
}

#[must_use]
pub fn max_position_sql(table_name: &str) -> String {
    format!("SELECT COALESCE(MAX(position), 0) FROM {}", quote(table_name))
}

#[must_use]
pub fn count_rows_sql(table_name: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quote(table_name))
}
