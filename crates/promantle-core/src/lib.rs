//! Dialect-agnostic rank-walk aggregation engine.
//!
//! This crate implements the triangular-list algorithm, a pre-aggregated
//! hierarchical rollup over an arbitrary ordered key-value store reachable
//! through a [`TableAdapter`](adapter::TableAdapter), without committing to
//! any particular SQL dialect. A concrete adapter (Postgres, or any other
//! backend satisfying the eight-operation contract in [`adapter`]) supplies
//! the actual storage.

pub mod adapter;
pub mod aggregate;
pub mod bucket;
pub mod builder;
pub mod engine;
pub mod error;
pub mod rank;
pub mod sanitize;
pub mod value;

#[cfg(test)]
mod mock_adapter;
#[cfg(test)]
mod tests;

pub mod prelude {
    //! Re-exports of the types most callers need in scope.
    pub use crate::adapter::{
        AggregateColumn, BucketStream, BucketWrite, RankReport, RawBucket, TableAdapter, TableLocation, TableSpec,
    };
    pub use crate::bucket::Bucket;
    pub use crate::builder::TriangularListBuilder;
    pub use crate::engine::{AggregateStream, PointStream, TriangularList};
    pub use crate::error::Error;
    pub use crate::value::{ColumnValue, StorageType, Value};
}
