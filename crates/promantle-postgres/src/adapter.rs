use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use futures::stream;
use promantle_core::adapter::{BucketStream, BucketWrite, RankReport, RawBucket, TableAdapter, TableLocation, TableSpec};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::codec::{decode_column, decode_column_opt, encode_param};
use crate::ddl;
use crate::error::PostgresAdapterError;

///
/// PostgresAdapter
///
/// The reference `TableAdapter` targeting any PostgreSQL-compatible backend.
/// Holds a connection pool (checked out and returned per call, matching the
/// engine's single-writer, no-internal-caching resource model) and a small
/// in-process catalog of the `TableSpec` each `ensure_table` call last saw,
/// since later calls identify columns only by `(table, aggregate)` and need
/// to know how to decode them.
///

pub struct PostgresAdapter {
    pool: Pool,
    schemas: RwLock<HashMap<String, TableSpec>>,
}

impl PostgresAdapter {
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    fn schema_for(&self, table_name: &str) -> Result<TableSpec, PostgresAdapterError> {
        self.schemas
            .read()
            .unwrap()
            .get(table_name)
            .cloned()
            .ok_or_else(|| PostgresAdapterError::Ddl(format!("table '{table_name}' was never materialized by ensure_table")))
    }

    fn aggregate_storage_type(spec: &TableSpec, aggregate_name: &str) -> Result<promantle_core::value::StorageType, PostgresAdapterError> {
        spec.aggregates
            .iter()
            .find(|a| a.name == aggregate_name)
            .map(|a| a.storage_type)
            .ok_or_else(|| PostgresAdapterError::ColumnMismatch {
                column: aggregate_name.to_string(),
                expected: "a registered aggregate",
            })
    }

    fn decode_row(row: &Row, spec: &TableSpec, aggregate_name: &str) -> Result<Option<RawBucket>, PostgresAdapterError> {
        let value_type = Self::aggregate_storage_type(spec, aggregate_name)?;
        let Some(count) = row.try_get::<_, Option<i64>>(4)? else {
            return Ok(None);
        };
        let Some(value) = decode_column_opt(row, 5, value_type)? else {
            return Ok(None);
        };
        Ok(Some(RawBucket {
            position: row.try_get(0)?,
            parent_position: row.try_get(1)?,
            lower_bound: decode_column(row, 2, spec.key_type)?,
            upper_bound: decode_column(row, 3, spec.key_type)?,
            count,
            value,
        }))
    }
}

#[async_trait]
impl TableAdapter for PostgresAdapter {
    type Error = PostgresAdapterError;

    async fn ensure_table(&self, spec: &TableSpec) -> Result<bool, Self::Error> {
        let table_name = spec.location.table_name();
        let client = self.pool.get().await?;

        let already_known = self.schemas.read().unwrap().contains_key(&table_name);
        client.batch_execute(&ddl::create_table_sql(spec)).await?;
        client
            .batch_execute(&ddl::create_parent_position_index_sql(&table_name))
            .await?;

        self.schemas.write().unwrap().insert(table_name, spec.clone());
        Ok(!already_known)
    }

    async fn write_at(&self, location: &TableLocation, write: BucketWrite<'_>) -> Result<(), Self::Error> {
        let table_name = location.table_name();
        let client = self.pool.get().await?;
        let sql = ddl::upsert_sql(&table_name, write.aggregate_name);

        let position_param = encode_param(&promantle_core::value::Value::I64(write.position));
        let parent_param = encode_param(&promantle_core::value::Value::I64(write.parent_position));
        let count_param = encode_param(&promantle_core::value::Value::I64(write.count));
        let lower_param = encode_param(&write.lower_bound);
        let upper_param = encode_param(&write.upper_bound);
        let value_param = encode_param(&write.value);

        let params: Vec<&(dyn ToSql + Sync)> = vec![
            position_param.as_ref(),
            parent_param.as_ref(),
            lower_param.as_ref(),
            upper_param.as_ref(),
            count_param.as_ref(),
            value_param.as_ref(),
        ];

        client.execute(&sql, &params).await?;
        Ok(())
    }

    async fn read_at(&self, location: &TableLocation, aggregate_name: &str, position: i64) -> Result<Option<RawBucket>, Self::Error> {
        let table_name = location.table_name();
        let spec = self.schema_for(&table_name)?;
        let client = self.pool.get().await?;
        let sql = ddl::select_at_sql(&table_name, aggregate_name);

        let row = client.query_opt(&sql, &[&position]).await?;
        row.map(|row| Self::decode_row(&row, &spec, aggregate_name)).transpose().map(Option::flatten)
    }

    async fn read_range(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        start: i64,
        end: i64,
    ) -> Result<BucketStream<'static, Self::Error>, Self::Error> {
        let table_name = location.table_name();
        let spec = self.schema_for(&table_name)?;
        let client = self.pool.get().await?;
        let sql = ddl::select_range_sql(&table_name, aggregate_name);

        let rows = client.query(&sql, &[&start, &end]).await?;
        let aggregate_name = aggregate_name.to_string();
        let buckets: Vec<Result<RawBucket, Self::Error>> = rows
            .into_iter()
            .filter_map(|row| Self::decode_row(&row, &spec, &aggregate_name).transpose())
            .collect();
        Ok(Box::pin(stream::iter(buckets)))
    }

    async fn read_children(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        parent_position: i64,
    ) -> Result<BucketStream<'static, Self::Error>, Self::Error> {
        let table_name = location.table_name();
        let spec = self.schema_for(&table_name)?;
        let client = self.pool.get().await?;
        let sql = ddl::select_children_sql(&table_name, aggregate_name);

        let rows = client.query(&sql, &[&parent_position]).await?;
        let aggregate_name = aggregate_name.to_string();
        let buckets: Vec<Result<RawBucket, Self::Error>> = rows
            .into_iter()
            .filter_map(|row| Self::decode_row(&row, &spec, &aggregate_name).transpose())
            .collect();
        Ok(Box::pin(stream::iter(buckets)))
    }

    async fn max_position(&self, location: &TableLocation) -> i64 {
        let table_name = location.table_name();
        let Ok(client) = self.pool.get().await else {
            tracing::warn!(table = %table_name, "max_position: could not acquire a connection");
            return 0;
        };
        let sql = ddl::max_position_sql(&table_name);
        match client.query_one(&sql, &[]).await {
            Ok(row) => row.try_get::<_, i64>(0).unwrap_or(0),
            Err(error) => {
                tracing::warn!(table = %table_name, %error, "max_position: query failed, assuming empty table");
                0
            }
        }
    }

    async fn dump_rank(&self, location: &TableLocation) -> Result<RankReport, Self::Error> {
        let table_name = location.table_name();
        let client = self.pool.get().await?;
        let row_count: i64 = client.query_one(&ddl::count_rows_sql(&table_name), &[]).await?.try_get(0)?;
        let max_position: i64 = client.query_one(&ddl::max_position_sql(&table_name), &[]).await?.try_get(0)?;
        Ok(RankReport {
            rank: location.rank,
            row_count,
            max_position,
        })
    }

    async fn drop_table(&self, location: &TableLocation) -> Result<(), Self::Error> {
        let table_name = location.table_name();
        let client = self.pool.get().await?;
        client.batch_execute(&ddl::drop_table_sql(&table_name)).await?;
        self.schemas.write().unwrap().remove(&table_name);
        Ok(())
    }
}
