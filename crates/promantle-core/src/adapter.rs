use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::value::{StorageType, Value};

///
/// TableLocation
///
/// Identifies one `(group, rank, rank_count)` triple. The adapter must
/// derive a deterministic table identifier from this triple; the reference
/// scheme (`<group>_<rank>_of_<rank_count>`, sanitized) lives in
/// `crate::sanitize::table_name`, but adapters are free to use any scheme as
/// long as it is deterministic and collision-free across groups.
///

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableLocation {
    pub group: String,
    pub rank: i64,
    pub rank_count: i64,
}

impl TableLocation {
    #[must_use]
    pub const fn new(group: String, rank: i64, rank_count: i64) -> Self {
        Self {
            group,
            rank,
            rank_count,
        }
    }

    /// The reference `<group>_<rank>_of_<rank_count>` table name.
    #[must_use]
    pub fn table_name(&self) -> String {
        crate::sanitize::table_name(&self.group, self.rank, self.rank_count)
    }
}

///
/// AggregateColumn
///
/// One aggregate's declared storage type, as passed to `ensure_table`. The
/// adapter derives the `<name>_count`/`<name>_value` column pair from
/// `name` via the same sanitizer the core uses on the write/read paths.
///

#[derive(Clone, Debug)]
pub struct AggregateColumn {
    pub name: String,
    pub storage_type: StorageType,
}

///
/// TableSpec
///
/// Everything `ensure_table` needs to materialize (or confirm) one rank's
/// table: its location, the key column's storage type, and every
/// aggregate's `(name, storage_type)` pair.
///

#[derive(Clone, Debug)]
pub struct TableSpec {
    pub location: TableLocation,
    pub key_type: StorageType,
    pub aggregates: Vec<AggregateColumn>,
}

///
/// BucketWrite
///
/// One upsert-by-position call. When multiple aggregates share a row, later
/// calls for the same `position` update only that aggregate's `count`/
/// `value` columns; `parent_position`/bounds must stay consistent across
/// aggregates sharing a bucket, and the adapter is responsible for that
/// consistency since it owns the row.
///

#[derive(Clone, Debug)]
pub struct BucketWrite<'a> {
    pub aggregate_name: &'a str,
    pub parent_position: i64,
    pub position: i64,
    pub count: i64,
    pub value: Value,
    pub lower_bound: Value,
    pub upper_bound: Value,
}

///
/// RawBucket
///
/// The dynamic (adapter-facing) counterpart of `crate::bucket::Bucket`. The
/// engine recovers typed values from this via `ColumnValue::from_value`,
/// which is where a `TypeMismatch` can surface.
///

#[derive(Clone, Debug)]
pub struct RawBucket {
    pub position: i64,
    pub parent_position: i64,
    pub lower_bound: Value,
    pub upper_bound: Value,
    pub count: i64,
    pub value: Value,
}

///
/// RankReport
///
/// Diagnostic summary for one rank's table, returned by `dump_rank`.
///

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankReport {
    pub rank: i64,
    pub row_count: i64,
    pub max_position: i64,
}

/// A lazily-produced sequence of bucket rows, ordered by `position`
/// ascending, as returned by `read_range`/`read_children`.
pub type BucketStream<'a, E> = BoxStream<'a, Result<RawBucket, E>>;

///
/// TableAdapter
///
/// The abstract persistence contract that isolates the engine from any
/// specific SQL dialect (or, in principle, any ordered key-value store that
/// can satisfy these eight operations). All operations are scoped by
/// `(group, rank, rank_count)` via `TableLocation`.
///
/// Adapters open and close their own connection per call; there is no
/// connection pooling contract here, matching the single-writer,
/// cooperative-blocking resource model the engine assumes.
///

#[async_trait]
pub trait TableAdapter: Send + Sync {
    /// The adapter's own error type, wrapped opaquely into
    /// `Error::AdapterFailure` by the engine.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Idempotently create the table described by `spec`. Returns `true`
    /// iff this call created it (it did not already exist).
    async fn ensure_table(&self, spec: &TableSpec) -> Result<bool, Self::Error>;

    /// Upsert-by-position: insert the row if absent, otherwise replace the
    /// columns named in `write` (plus parent/bounds) in place.
    async fn write_at(&self, location: &TableLocation, write: BucketWrite<'_>) -> Result<(), Self::Error>;

    /// Fetch the row at `position`, or `None` if absent.
    async fn read_at(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        position: i64,
    ) -> Result<Option<RawBucket>, Self::Error>;

    /// All rows in `[start, end]` inclusive, ordered by `position` ascending.
    async fn read_range(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        start: i64,
        end: i64,
    ) -> Result<BucketStream<'static, Self::Error>, Self::Error>;

    /// All rows whose `parent_position` equals `parent_position`, ordered by
    /// `position` ascending.
    async fn read_children(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        parent_position: i64,
    ) -> Result<BucketStream<'static, Self::Error>, Self::Error>;

    /// The largest `position` at this table, or `0` if empty/missing.
    /// Errors are swallowed here by convention (used during construction
    /// against a table that may not exist yet); implementors should log and
    /// return `0` rather than propagate.
    async fn max_position(&self, location: &TableLocation) -> i64;

    /// Row count and max position, for diagnostics.
    async fn dump_rank(&self, location: &TableLocation) -> Result<RankReport, Self::Error>;

    /// Drop the table entirely. Called once per rank by
    /// `delete_all_tables_and_data`.
    async fn drop_table(&self, location: &TableLocation) -> Result<(), Self::Error>;
}

/// Lets an `Arc<A>` stand in for `A` itself, so one adapter instance can be
/// shared across multiple `TriangularList`s pointed at the same group, per
/// the shared-resource policy in the concurrency model.
#[async_trait]
impl<T> TableAdapter for Arc<T>
where
    T: TableAdapter,
{
    type Error = T::Error;

    async fn ensure_table(&self, spec: &TableSpec) -> Result<bool, Self::Error> {
        T::ensure_table(self, spec).await
    }

    async fn write_at(&self, location: &TableLocation, write: BucketWrite<'_>) -> Result<(), Self::Error> {
        T::write_at(self, location, write).await
    }

    async fn read_at(&self, location: &TableLocation, aggregate_name: &str, position: i64) -> Result<Option<RawBucket>, Self::Error> {
        T::read_at(self, location, aggregate_name, position).await
    }

    async fn read_range(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        start: i64,
        end: i64,
    ) -> Result<BucketStream<'static, Self::Error>, Self::Error> {
        T::read_range(self, location, aggregate_name, start, end).await
    }

    async fn read_children(
        &self,
        location: &TableLocation,
        aggregate_name: &str,
        parent_position: i64,
    ) -> Result<BucketStream<'static, Self::Error>, Self::Error> {
        T::read_children(self, location, aggregate_name, parent_position).await
    }

    async fn max_position(&self, location: &TableLocation) -> i64 {
        T::max_position(self, location).await
    }

    async fn dump_rank(&self, location: &TableLocation) -> Result<RankReport, Self::Error> {
        T::dump_rank(self, location).await
    }

    async fn drop_table(&self, location: &TableLocation) -> Result<(), Self::Error> {
        T::drop_table(self, location).await
    }
}
