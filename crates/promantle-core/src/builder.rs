use std::{collections::HashSet, marker::PhantomData, sync::Arc};

use crate::{
    adapter::TableAdapter,
    aggregate::{self, ErasedAggregate},
    engine::TriangularList,
    error::Error,
    rank::RankDef,
    value::ColumnValue,
};

type KeyFn<V, K> = Arc<dyn Fn(&V) -> K + Send + Sync>;
type MinMaxFn<K> = Arc<dyn Fn(K, K) -> (K, K) + Send + Sync>;

///
/// TriangularListBuilder
///
/// Accumulates configuration for one `TriangularList<V, K, A>`: a group
/// name, a table adapter, the key function/min-max pair, the rank set, and
/// the aggregate set. Mirrors the fluent, `mut self -> Self` configuration
/// style used throughout the engine's query/session surface.
///
/// Builder state conceptually moves `Empty -> Configured -> Built`.
/// Re-setting `using_storage`/`key_on`, or registering a rank/aggregate name
/// twice, does not panic or silently overwrite; it is recorded and surfaces
/// as `Error::ConfigInvalid` from `build()`, so a long fluent chain never
/// has to be interrupted with early returns.
///

pub struct TriangularListBuilder<V, K, A>
where
    A: TableAdapter,
{
    group: Option<String>,
    adapter: Option<A>,
    key_fn: Option<KeyFn<V, K>>,
    min_max_fn: Option<MinMaxFn<K>>,
    ranks: Vec<RankDef<K>>,
    rank_names: HashSet<String>,
    aggregates: Vec<Box<dyn ErasedAggregate<V>>>,
    aggregate_names: HashSet<String>,
    errors: Vec<String>,
    _marker: PhantomData<fn() -> V>,
}

impl<V, K, A> Default for TriangularListBuilder<V, K, A>
where
    A: TableAdapter,
{
    fn default() -> Self {
        Self {
            group: None,
            adapter: None,
            key_fn: None,
            min_max_fn: None,
            ranks: Vec::new(),
            rank_names: HashSet::new(),
            aggregates: Vec::new(),
            aggregate_names: HashSet::new(),
            errors: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<V, K, A> TriangularListBuilder<V, K, A>
where
    V: 'static,
    K: ColumnValue,
    A: TableAdapter,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the group name and table adapter. May only be called once.
    #[must_use]
    pub fn using_storage(mut self, group: impl Into<String>, adapter: A) -> Self {
        if self.group.is_some() || self.adapter.is_some() {
            self.errors
                .push("using_storage was already configured".to_string());
            return self;
        }
        self.group = Some(group.into());
        self.adapter = Some(adapter);
        self
    }

    /// Set the key function and the key-range `min_max` reducer. May only be
    /// called once. The key's storage type is derived from `K: ColumnValue`.
    #[must_use]
    pub fn key_on(
        mut self,
        key_fn: impl Fn(&V) -> K + Send + Sync + 'static,
        min_max_fn: impl Fn(K, K) -> (K, K) + Send + Sync + 'static,
    ) -> Self {
        if self.key_fn.is_some() {
            self.errors.push("key_on was already configured".to_string());
            return self;
        }
        self.key_fn = Some(Arc::new(key_fn));
        self.min_max_fn = Some(Arc::new(min_max_fn));
        self
    }

    /// Register one aggregate. `name` must be unique across the whole
    /// builder (case-sensitive; sanitization/case-folding happens once at
    /// the adapter boundary, not here).
    #[must_use]
    pub fn aggregate<Agg>(
        mut self,
        name: impl Into<String>,
        select: impl Fn(&V) -> Agg + Send + Sync + 'static,
        combine: impl Fn(Agg, Agg) -> Agg + Send + Sync + 'static,
    ) -> Self
    where
        Agg: ColumnValue,
    {
        let name = name.into();
        if name.is_empty() {
            self.errors.push("aggregate name must not be empty".to_string());
            return self;
        }
        if !self.aggregate_names.insert(name.clone()) {
            self.errors
                .push(format!("aggregate '{name}' is already registered"));
            return self;
        }
        self.aggregates.push(aggregate::erase(name, select, combine));
        self
    }

    /// Register one rank. `external_number` only needs to be unique and
    /// gapless when every registered rank is sorted; it is discarded in
    /// favor of a contiguous `1..=n` internal numbering at `build()`.
    #[must_use]
    pub fn rank(
        mut self,
        external_number: i64,
        name: impl Into<String>,
        position_fn: impl Fn(&K) -> i64 + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        if external_number < 0 {
            self.errors
                .push(format!("rank numbers must be non-negative, got {external_number}"));
            return self;
        }
        if name.is_empty() {
            self.errors.push("rank name must not be empty".to_string());
            return self;
        }
        if !self.rank_names.insert(name.clone()) {
            self.errors.push(format!("rank name '{name}' is already registered"));
            return self;
        }
        if self.ranks.iter().any(|r| r.external_number == external_number) {
            self.errors
                .push(format!("rank number {external_number} is already registered"));
            return self;
        }
        self.ranks.push(RankDef::new(external_number, name, position_fn));
        self
    }

    /// Validate and assemble the configured engine, materializing every
    /// rank's table (including the implicit rank 0) via the adapter.
    pub async fn build(mut self) -> Result<TriangularList<V, K, A>, Error> {
        if !self.errors.is_empty() {
            return Err(Error::config_invalid(self.errors.join("; ")));
        }

        let group = self
            .group
            .take()
            .ok_or_else(|| Error::config_invalid("using_storage was never called"))?;
        let adapter = self
            .adapter
            .take()
            .ok_or_else(|| Error::config_invalid("using_storage was never called"))?;
        let key_fn = self
            .key_fn
            .take()
            .ok_or_else(|| Error::config_invalid("key_on was never called"))?;
        let min_max_fn = self
            .min_max_fn
            .take()
            .ok_or_else(|| Error::config_invalid("key_on was never called"))?;

        if self.ranks.is_empty() {
            return Err(Error::config_invalid("at least one rank is required"));
        }
        if self.aggregates.is_empty() {
            return Err(Error::config_invalid("at least one aggregate is required"));
        }

        let mut sorted = std::mem::take(&mut self.ranks);
        sorted.sort_by_key(|r| r.external_number);
        for pair in sorted.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.external_number == b.external_number {
                return Err(Error::config_invalid(format!(
                    "duplicate rank number {}",
                    a.external_number
                )));
            }
            if b.external_number - a.external_number != 1 {
                return Err(Error::config_invalid(format!(
                    "gap in rank numbers between {} and {}",
                    a.external_number, b.external_number
                )));
            }
        }

        let ranks = sorted
            .into_iter()
            .enumerate()
            .map(|(index, def)| crate::rank::Rank {
                number: index as i64 + 1,
                name: def.name,
                position_fn: def.position_fn,
            })
            .collect();

        TriangularList::materialize(group, adapter, key_fn, min_max_fn, ranks, self.aggregates)
            .await
    }
}
