use thiserror::Error as ThisError;

///
/// PostgresAdapterError
///
/// Everything a `PostgresAdapter` can fail with. Wrapped opaquely into
/// `promantle_core::Error::AdapterFailure` by the engine; callers never
/// match on this type directly unless they hold a concrete `PostgresAdapter`.
///

#[derive(Debug, ThisError)]
pub enum PostgresAdapterError {
    /// Acquiring or returning a pooled connection failed.
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The driver itself rejected a statement (bad SQL, constraint
    /// violation, connection reset mid-query, …).
    #[error("postgres error: {0}")]
    Driver(#[from] tokio_postgres::Error),

    /// `ensure_table` was asked to materialize a spec whose identifiers
    /// sanitize to something the adapter cannot express as DDL (e.g. an
    /// empty table name).
    #[error("cannot generate DDL: {0}")]
    Ddl(String),

    /// A row came back with a column whose declared type didn't match what
    /// the adapter expected to decode for a given `StorageType`.
    #[error("column '{column}' mismatched storage type {expected}")]
    ColumnMismatch { column: String, expected: &'static str },
}
