//! # promantle
//!
//! `promantle` is the public facade crate for the Promantle pre-aggregated
//! hierarchical log store. It is the recommended dependency for downstream
//! projects; the dialect-agnostic engine and the reference dialect adapter
//! live in separate crates and are exposed here behind one surface.
//!
//! ## Crate layout
//!
//! - `core`: re-export of `promantle-core`, the rank/aggregate model, the
//!   rank-walk engine, the builder, and the abstract `TableAdapter` contract.
//! - `postgres` *(feature `postgres`, default-on)*: re-export of
//!   `promantle-postgres`, the reference `TableAdapter` for PostgreSQL-
//!   compatible backends.
//! - `prelude`: the types most callers need glob-imported to configure and
//!   run an engine.

pub use promantle_core as core;

#[cfg(feature = "postgres")]
pub use promantle_postgres as postgres;

pub use promantle_core::error::Error;

pub mod prelude {
    pub use promantle_core::adapter::TableAdapter;
    pub use promantle_core::builder::TriangularListBuilder;
    pub use promantle_core::bucket::Bucket;
    pub use promantle_core::error::Error;
    pub use promantle_core::value::{ColumnValue, StorageType, Value};

    #[cfg(feature = "postgres")]
    pub use promantle_postgres::PostgresAdapter;
}
