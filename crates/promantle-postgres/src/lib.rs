//! Reference PostgreSQL `TableAdapter` for Promantle.
//!
//! Everything the engine needs beyond the abstract contract (identifier
//! quoting, DDL templates, and dynamic value (en/de)coding) lives here,
//! isolated from `promantle-core` so the engine itself stays dialect-agnostic.

pub mod adapter;
pub mod codec;
pub mod ddl;
pub mod error;

pub mod prelude {
    pub use crate::adapter::PostgresAdapter;
    pub use crate::error::PostgresAdapterError;
}

pub use adapter::PostgresAdapter;
pub use error::PostgresAdapterError;
