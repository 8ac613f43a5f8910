use std::sync::Arc;

///
/// RankDef
///
/// A rank as supplied to the builder: an externally numbered granularity
/// level with a name and a key-to-position function. External numbers only
/// need to be unique and gapless when sorted; they are discarded once the
/// engine is built in favor of contiguous internal numbering `1..=n`.
///

#[derive(Clone)]
pub struct RankDef<K> {
    pub(crate) external_number: i64,
    pub(crate) name: String,
    pub(crate) position_fn: Arc<dyn Fn(&K) -> i64 + Send + Sync>,
}

impl<K> RankDef<K> {
    pub fn new(
        external_number: i64,
        name: impl Into<String>,
        position_fn: impl Fn(&K) -> i64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            external_number,
            name: name.into(),
            position_fn: Arc::new(position_fn),
        }
    }
}

///
/// Rank
///
/// A rank after the builder has renumbered it into the engine's internal
/// `1..=n` scheme, preserving the caller-given order. Rank `0` (individual
/// items) is implicit and is never represented by a `Rank` value; it is
/// handled directly by the engine.
///

pub(crate) struct Rank<K> {
    pub number: i64,
    pub name: String,
    pub position_fn: Arc<dyn Fn(&K) -> i64 + Send + Sync>,
}

impl<K> Rank<K> {
    pub fn position(&self, key: &K) -> i64 {
        (self.position_fn)(key)
    }
}

impl<K> Clone for Rank<K> {
    fn clone(&self) -> Self {
        Self {
            number: self.number,
            name: self.name.clone(),
            position_fn: Arc::clone(&self.position_fn),
        }
    }
}
