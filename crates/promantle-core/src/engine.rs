use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc,
};

use futures::StreamExt;

use crate::{
    adapter::{AggregateColumn, TableAdapter, TableLocation, TableSpec},
    aggregate::ErasedAggregate,
    bucket::Bucket,
    error::Error,
    rank::Rank,
    value::{ColumnValue, Value},
};

/// A lazily-produced `(position, value)` sequence, as returned by
/// `read_aggregate_range`.
pub type AggregateStream<'a, Agg> = futures::stream::BoxStream<'a, Result<(i64, Agg), Error>>;

/// A lazily-produced `(position, bucket)` sequence, as returned by
/// `read_points_over_range`.
pub type PointStream<'a, Agg, K> = futures::stream::BoxStream<'a, Result<(i64, Bucket<Agg, K>), Error>>;

///
/// TriangularList
///
/// The rank-walk aggregation engine. Holds one table adapter, the
/// caller-supplied key/aggregate closures, and the renumbered rank set
/// produced by `TriangularListBuilder::build`.
///
/// Construction (`materialize`) ensures every rank's table exists (rank `0`
/// through rank `N`) and seeds the monotonic item-position counter from the
/// adapter's own `max_position`, so reopening a `TriangularList` against an
/// existing store resumes numbering rather than restarting it.
///

pub struct TriangularList<V, K, A>
where
    A: TableAdapter,
{
    group: String,
    adapter: A,
    key_fn: Arc<dyn Fn(&V) -> K + Send + Sync>,
    min_max_fn: Arc<dyn Fn(K, K) -> (K, K) + Send + Sync>,
    ranks: Vec<Rank<K>>,
    aggregates: Vec<Box<dyn ErasedAggregate<V>>>,
    rank_count: i64,
    next_position: AtomicI64,
    deleted: AtomicBool,
}

impl<V, K, A> TriangularList<V, K, A>
where
    V: 'static,
    K: ColumnValue,
    A: TableAdapter,
{
    pub(crate) async fn materialize(
        group: String,
        adapter: A,
        key_fn: Arc<dyn Fn(&V) -> K + Send + Sync>,
        min_max_fn: Arc<dyn Fn(K, K) -> (K, K) + Send + Sync>,
        ranks: Vec<Rank<K>>,
        aggregates: Vec<Box<dyn ErasedAggregate<V>>>,
    ) -> Result<Self, Error> {
        let rank_count = ranks.len() as i64;
        let columns: Vec<AggregateColumn> = aggregates
            .iter()
            .map(|a| AggregateColumn {
                name: a.name().to_string(),
                storage_type: a.storage_type(),
            })
            .collect();

        for rank in 0..=rank_count {
            let location = TableLocation::new(group.clone(), rank, rank_count);
            let spec = TableSpec {
                location,
                key_type: K::storage_type(),
                aggregates: columns.clone(),
            };
            adapter.ensure_table(&spec).await.map_err(Error::adapter)?;
        }

        let item_location = TableLocation::new(group.clone(), 0, rank_count);
        let next_position = adapter.max_position(&item_location).await + 1;

        tracing::debug!(group = %group, rank_count, "triangular list materialized");

        Ok(Self {
            group,
            adapter,
            key_fn,
            min_max_fn,
            ranks,
            aggregates,
            rank_count,
            next_position: AtomicI64::new(next_position),
            deleted: AtomicBool::new(false),
        })
    }

    fn ensure_alive(&self) -> Result<(), Error> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(Error::EngineDeleted);
        }
        Ok(())
    }

    fn aggregate(&self, name: &str) -> Result<&dyn ErasedAggregate<V>, Error> {
        self.aggregates
            .iter()
            .find(|a| a.name() == name)
            .map(AsRef::as_ref)
            .ok_or_else(|| Error::UnknownAggregate(name.to_string()))
    }

    /// Resolve a caller-given rank name to its registered `Rank`. Rank `0`
    /// (individual items) is never named and cannot be looked up here; it
    /// is only reachable through `read_children_of_point` at rank `1`.
    fn rank_by_name(&self, name: &str) -> Result<&Rank<K>, Error> {
        self.ranks
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::UnknownRank(name.to_string()))
    }

    fn location_for(&self, rank: i64) -> TableLocation {
        TableLocation::new(self.group.clone(), rank, self.rank_count)
    }

    fn fold_bounds(&self, lower: Value, upper: Value, next_lower: Value, next_upper: Value) -> Result<(Value, Value), Error> {
        let lower_k = K::from_value(lower, "bounds")?;
        let next_lower_k = K::from_value(next_lower, "bounds")?;
        let upper_k = K::from_value(upper, "bounds")?;
        let next_upper_k = K::from_value(next_upper, "bounds")?;
        let (min, _) = (self.min_max_fn)(lower_k, next_lower_k);
        let (_, max) = (self.min_max_fn)(upper_k, next_upper_k);
        Ok((min.to_value(), max.to_value()))
    }

    /// Insert one item, walking every rank from `1` to `N` and re-folding
    /// each affected bucket from its rank `r-1` children. Returns the total
    /// number of child rows scanned during the recompute (a diagnostic, not
    /// the item's assigned position).
    pub async fn write_item(&self, item: &V) -> Result<i64, Error> {
        self.ensure_alive()?;

        let key = (self.key_fn)(item);
        let position = self.next_position.fetch_add(1, Ordering::SeqCst);
        let rank_one_position = self.ranks[0].position(&key);
        let item_location = self.location_for(0);
        let mut children_scanned = 0_i64;

        for aggregate in &self.aggregates {
            let value = aggregate.select(item);
            let bound = key.to_value();
            self.adapter
                .write_at(
                    &item_location,
                    crate::adapter::BucketWrite {
                        aggregate_name: aggregate.name(),
                        parent_position: rank_one_position,
                        position,
                        count: 1,
                        value,
                        lower_bound: bound.clone(),
                        upper_bound: bound,
                    },
                )
                .await
                .map_err(Error::adapter)?;
        }

        for index in 0..self.ranks.len() {
            let rank_number = index as i64 + 1;
            let this_position = self.ranks[index].position(&key);
            let parent_position = if index + 1 < self.ranks.len() {
                self.ranks[index + 1].position(&key)
            } else {
                0
            };

            let child_location = self.location_for(rank_number - 1);
            let this_location = self.location_for(rank_number);

            for aggregate in &self.aggregates {
                let mut children = self
                    .adapter
                    .read_children(&child_location, aggregate.name(), this_position)
                    .await
                    .map_err(Error::adapter)?;

                let mut count = 0_i64;
                let mut folded: Option<(Value, Value, Value)> = None;

                while let Some(row) = children.next().await {
                    let row = row.map_err(Error::adapter)?;
                    children_scanned += 1;
                    count += row.count;
                    folded = Some(match folded {
                        None => (row.value, row.lower_bound, row.upper_bound),
                        Some((value, lower, upper)) => {
                            let value = aggregate.combine(value, row.value)?;
                            let (lower, upper) = self.fold_bounds(lower, upper, row.lower_bound, row.upper_bound)?;
                            (value, lower, upper)
                        }
                    });
                }

                // No children to fold cannot happen after the rank-0 write above, but
                // guards against unusual adapter behavior: skip this aggregate rather
                // than fail the whole write.
                let (value, lower_bound, upper_bound) = match folded {
                    Some(values) => values,
                    None => continue,
                };

                self.adapter
                    .write_at(
                        &this_location,
                        crate::adapter::BucketWrite {
                            aggregate_name: aggregate.name(),
                            parent_position,
                            position: this_position,
                            count,
                            value,
                            lower_bound,
                            upper_bound,
                        },
                    )
                    .await
                    .map_err(Error::adapter)?;
            }
        }

        Ok(children_scanned)
    }

    /// Read just one aggregate's value at the bucket containing `key` at
    /// `rank_name`.
    pub async fn read_aggregate_at<Agg>(&self, aggregate_name: &str, rank_name: &str, key: &K) -> Result<Option<Agg>, Error>
    where
        Agg: ColumnValue,
    {
        self.ensure_alive()?;
        self.aggregate(aggregate_name)?;
        let rank = self.rank_by_name(rank_name)?;
        let location = self.location_for(rank.number);
        let position = rank.position(key);

        let raw = self
            .adapter
            .read_at(&location, aggregate_name, position)
            .await
            .map_err(Error::adapter)?;

        raw.map(|row| Agg::from_value(row.value, aggregate_name)).transpose()
    }

    /// Read the full bucket (value, count, key bounds) containing `key` at
    /// `rank_name`.
    pub async fn read_point_at<Agg>(&self, aggregate_name: &str, rank_name: &str, key: &K) -> Result<Option<Bucket<Agg, K>>, Error>
    where
        Agg: ColumnValue,
    {
        self.ensure_alive()?;
        self.aggregate(aggregate_name)?;
        let rank = self.rank_by_name(rank_name)?;
        let location = self.location_for(rank.number);
        let position = rank.position(key);

        let raw = self
            .adapter
            .read_at(&location, aggregate_name, position)
            .await
            .map_err(Error::adapter)?;

        raw.map(|row| row_to_bucket::<Agg, K>(row, aggregate_name)).transpose()
    }

    /// Read every bucket at the rank immediately below `rank_name` whose
    /// `parent_position` is the bucket containing `key` at `rank_name`. When
    /// `rank_name` names rank `1`, this yields the original rank-0 items
    /// folded into that bucket.
    pub async fn read_children_of_point<Agg>(&self, aggregate_name: &str, rank_name: &str, key: &K) -> Result<Vec<Bucket<Agg, K>>, Error>
    where
        Agg: ColumnValue,
    {
        self.ensure_alive()?;
        self.aggregate(aggregate_name)?;
        let rank = self.rank_by_name(rank_name)?;
        let parent_position = rank.position(key);
        let location = self.location_for(rank.number - 1);

        let mut stream = self
            .adapter
            .read_children(&location, aggregate_name, parent_position)
            .await
            .map_err(Error::adapter)?;

        let mut buckets = Vec::new();
        while let Some(row) = stream.next().await {
            let row = row.map_err(Error::adapter)?;
            buckets.push(row_to_bucket::<Agg, K>(row, aggregate_name)?);
        }
        Ok(buckets)
    }

    /// Lazily read one aggregate's value across every bucket at `rank_name`
    /// from the bucket containing `start` through the bucket containing
    /// `end`, inclusive.
    pub async fn read_aggregate_range<Agg>(
        &self,
        aggregate_name: &str,
        rank_name: &str,
        start: &K,
        end: &K,
    ) -> Result<AggregateStream<'static, Agg>, Error>
    where
        Agg: ColumnValue,
    {
        self.ensure_alive()?;
        self.aggregate(aggregate_name)?;
        let rank = self.rank_by_name(rank_name)?;
        let location = self.location_for(rank.number);
        let start_pos = rank.position(start);
        let end_pos = rank.position(end);
        if end_pos < start_pos {
            return Err(Error::InvalidRange { start: start_pos, end: end_pos });
        }

        let stream = self
            .adapter
            .read_range(&location, aggregate_name, start_pos, end_pos)
            .await
            .map_err(Error::adapter)?;

        let aggregate_name = aggregate_name.to_string();
        let mapped = stream.map(move |row| {
            let row = row.map_err(Error::adapter)?;
            let value = Agg::from_value(row.value, &aggregate_name)?;
            Ok((row.position, value))
        });
        Ok(Box::pin(mapped))
    }

    /// Lazily read full buckets across every bucket at `rank_name` from the
    /// bucket containing `start` through the bucket containing `end`,
    /// inclusive.
    pub async fn read_points_over_range<Agg>(
        &self,
        aggregate_name: &str,
        rank_name: &str,
        start: &K,
        end: &K,
    ) -> Result<PointStream<'static, Agg, K>, Error>
    where
        Agg: ColumnValue,
    {
        self.ensure_alive()?;
        self.aggregate(aggregate_name)?;
        let rank = self.rank_by_name(rank_name)?;
        let location = self.location_for(rank.number);
        let start_pos = rank.position(start);
        let end_pos = rank.position(end);
        if end_pos < start_pos {
            return Err(Error::InvalidRange { start: start_pos, end: end_pos });
        }

        let stream = self
            .adapter
            .read_range(&location, aggregate_name, start_pos, end_pos)
            .await
            .map_err(Error::adapter)?;

        let aggregate_name = aggregate_name.to_string();
        let mapped = stream.map(move |row| {
            let row = row.map_err(Error::adapter)?;
            let position = row.position;
            let bucket = row_to_bucket::<Agg, K>(row, &aggregate_name)?;
            Ok((position, bucket))
        });
        Ok(Box::pin(mapped))
    }

    /// Row count and max position for every rank, `0` through `N`.
    pub async fn dump_tables(&self) -> Result<Vec<crate::adapter::RankReport>, Error> {
        self.ensure_alive()?;
        let mut reports = Vec::with_capacity(self.rank_count as usize + 1);
        for rank in 0..=self.rank_count {
            let location = self.location_for(rank);
            reports.push(self.adapter.dump_rank(&location).await.map_err(Error::adapter)?);
        }
        Ok(reports)
    }

    /// Drop every rank's table and permanently mark this engine unusable.
    /// Every subsequent call fails with `Error::EngineDeleted`.
    pub async fn delete_all_tables_and_data(&self) -> Result<(), Error> {
        self.ensure_alive()?;
        for rank in 0..=self.rank_count {
            let location = self.location_for(rank);
            self.adapter.drop_table(&location).await.map_err(Error::adapter)?;
        }
        self.deleted.store(true, Ordering::Release);
        Ok(())
    }
}

fn row_to_bucket<Agg, K>(row: crate::adapter::RawBucket, aggregate_name: &str) -> Result<Bucket<Agg, K>, Error>
where
    Agg: ColumnValue,
    K: ColumnValue,
{
    Ok(Bucket {
        value: Agg::from_value(row.value, aggregate_name)?,
        count: row.count,
        lower_bound: K::from_value(row.lower_bound, "bounds")?,
        upper_bound: K::from_value(row.upper_bound, "bounds")?,
    })
}
