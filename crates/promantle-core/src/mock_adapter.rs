use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use thiserror::Error as ThisError;

use crate::adapter::{BucketWrite, RankReport, RawBucket, TableAdapter, TableLocation, TableSpec};
use crate::value::Value;

#[derive(Debug, ThisError)]
pub enum MockError {
    #[error("table not found: {0}")]
    NotFound(String),
}

struct Row {
    parent_position: i64,
    lower_bound: Value,
    upper_bound: Value,
    aggregates: HashMap<String, (i64, Value)>,
}

#[derive(Default)]
struct Table {
    rows: HashMap<i64, Row>,
}

/// An in-memory `TableAdapter` used by this crate's own tests. Not a real
/// backend, just enough of the contract to drive the rank-walk algorithm
/// without a real database.
#[derive(Default)]
pub struct MockAdapter {
    tables: Mutex<HashMap<String, Table>>,
}

#[async_trait]
impl TableAdapter for MockAdapter {
    type Error = MockError;

    async fn ensure_table(&self, spec: &TableSpec) -> Result<bool, Self::Error> {
        let mut tables = self.tables.lock().unwrap();
        let name = spec.location.table_name();
        if tables.contains_key(&name) {
            Ok(false)
        } else {
            tables.insert(name, Table::default());
            Ok(true)
        }
    }

    async fn write_at(&self, location: &TableLocation, write: BucketWrite<'_>) -> Result<(), Self::Error> {
        let mut tables = self.tables.lock().unwrap();
        let name = location.table_name();
        let table = tables.entry(name).or_default();
        let row = table.rows.entry(write.position).or_insert_with(|| Row {
            parent_position: write.parent_position,
            lower_bound: write.lower_bound.clone(),
            upper_bound: write.upper_bound.clone(),
            aggregates: HashMap::new(),
        });
        row.parent_position = write.parent_position;
        row.lower_bound = write.lower_bound.clone();
        row.upper_bound = write.upper_bound.clone();
        row.aggregates
            .insert(write.aggregate_name.to_string(), (write.count, write.value));
        Ok(())
    }

    async fn read_at(&self, location: &TableLocation, aggregate_name: &str, position: i64) -> Result<Option<RawBucket>, Self::Error> {
        let tables = self.tables.lock().unwrap();
        let Some(table) = tables.get(&location.table_name()) else {
            return Ok(None);
        };
        Ok(table.rows.get(&position).and_then(|row| to_raw(position, row, aggregate_name)))
    }

    async fn read_range(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        start: i64,
        end: i64,
    ) -> Result<crate::adapter::BucketStream<'static, Self::Error>, Self::Error> {
        let tables = self.tables.lock().unwrap();
        let Some(table) = tables.get(&location.table_name()) else {
            return Ok(Box::pin(stream::iter(Vec::new())));
        };
        let mut rows: Vec<RawBucket> = table
            .rows
            .iter()
            .filter(|(position, _)| **position >= start && **position <= end)
            .filter_map(|(position, row)| to_raw(*position, row, aggregate_name))
            .collect();
        rows.sort_by_key(|b| b.position);
        Ok(Box::pin(stream::iter(rows.into_iter().map(Ok))))
    }

    async fn read_children(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        parent_position: i64,
    ) -> Result<crate::adapter::BucketStream<'static, Self::Error>, Self::Error> {
        let tables = self.tables.lock().unwrap();
        let Some(table) = tables.get(&location.table_name()) else {
            return Ok(Box::pin(stream::iter(Vec::new())));
        };
        let mut rows: Vec<RawBucket> = table
            .rows
            .iter()
            .filter(|(_, row)| row.parent_position == parent_position)
            .filter_map(|(position, row)| to_raw(*position, row, aggregate_name))
            .collect();
        rows.sort_by_key(|b| b.position);
        Ok(Box::pin(stream::iter(rows.into_iter().map(Ok))))
    }

    async fn max_position(&self, location: &TableLocation) -> i64 {
        let tables = self.tables.lock().unwrap();
        tables
            .get(&location.table_name())
            .and_then(|table| table.rows.keys().max().copied())
            .unwrap_or(0)
    }

    async fn dump_rank(&self, location: &TableLocation) -> Result<RankReport, Self::Error> {
        let tables = self.tables.lock().unwrap();
        let table = tables
            .get(&location.table_name())
            .ok_or_else(|| MockError::NotFound(location.table_name()))?;
        Ok(RankReport {
            rank: location.rank,
            row_count: table.rows.len() as i64,
            max_position: table.rows.keys().max().copied().unwrap_or(0),
        })
    }

    async fn drop_table(&self, location: &TableLocation) -> Result<(), Self::Error> {
        let mut tables = self.tables.lock().unwrap();
        tables.remove(&location.table_name());
        Ok(())
    }
}

fn to_raw(position: i64, row: &Row, aggregate_name: &str) -> Option<RawBucket> {
    let (count, value) = row.aggregates.get(aggregate_name)?;
    Some(RawBucket {
        position,
        parent_position: row.parent_position,
        lower_bound: row.lower_bound.clone(),
        upper_bound: row.upper_bound.clone(),
        count: *count,
        value: value.clone(),
    })
}
