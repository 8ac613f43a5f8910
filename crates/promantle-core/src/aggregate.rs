use std::sync::Arc;

use crate::{
    error::Error,
    value::{ColumnValue, StorageType, Value},
};

///
/// ErasedAggregate
///
/// Rather than a type-erased aggregator that casts boxed values via
/// reflection, each aggregate closes over a concrete `A: ColumnValue` and is
/// only erased behind this trait so a set of differently-typed aggregates
/// can live in one `TriangularList<V>`. The concrete type is never lost;
/// `ColumnValue` is what performs (and can fail) the conversion back from
/// the wire `Value`.
///

pub(crate) trait ErasedAggregate<V>: Send + Sync {
    fn name(&self) -> &str;
    fn storage_type(&self) -> StorageType;

    /// Project a source item to this aggregate's value domain.
    fn select(&self, item: &V) -> Value;

    /// Combine two already-selected values. Associative; not assumed
    /// commutative. Fails with `Error::TypeMismatch` only if the adapter
    /// handed back a value of the wrong dynamic tag (a corrupted store).
    fn combine(&self, left: Value, right: Value) -> Result<Value, Error>;
}

struct Aggregate<V, A> {
    name: String,
    select: Arc<dyn Fn(&V) -> A + Send + Sync>,
    combine: Arc<dyn Fn(A, A) -> A + Send + Sync>,
}

impl<V, A> ErasedAggregate<V> for Aggregate<V, A>
where
    A: ColumnValue,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn storage_type(&self) -> StorageType {
        A::storage_type()
    }

    fn select(&self, item: &V) -> Value {
        (self.select)(item).to_value()
    }

    fn combine(&self, left: Value, right: Value) -> Result<Value, Error> {
        let left = A::from_value(left, &self.name)?;
        let right = A::from_value(right, &self.name)?;
        Ok((self.combine)(left, right).to_value())
    }
}

/// Build a boxed, erased aggregate from a concrete `select`/`combine` pair.
///
/// `select` projects a source item onto the aggregate's value domain;
/// `combine` must be associative over that domain (commutativity is not
/// required; `max`/`min` are valid combiners).
pub(crate) fn erase<V, A>(
    name: impl Into<String>,
    select: impl Fn(&V) -> A + Send + Sync + 'static,
    combine: impl Fn(A, A) -> A + Send + Sync + 'static,
) -> Box<dyn ErasedAggregate<V>>
where
    V: 'static,
    A: ColumnValue,
{
    Box::new(Aggregate {
        name: name.into(),
        select: Arc::new(select),
        combine: Arc::new(combine),
    })
}
