use std::fmt;

use thiserror::Error as ThisError;

///
/// Error
///
/// The full set of failure kinds a `TriangularList` or `Builder` can surface.
/// None are retried internally.
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// The builder was assembled with a missing/duplicate field, a gap in
    /// rank numbers, or an empty/duplicate name.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A query referenced an aggregate name that was never registered.
    #[error("unknown aggregate: {0}")]
    UnknownAggregate(String),

    /// A query referenced a rank name that was never registered.
    #[error("unknown rank: {0}")]
    UnknownRank(String),

    /// The value read back from the adapter did not match the caller's
    /// expected result type. This is the only runtime guard against
    /// mis-typed queries when the adapter returns weakly typed values.
    #[error("type mismatch reading aggregate '{aggregate}': {detail}")]
    TypeMismatch { aggregate: String, detail: String },

    /// A range query's end position mapped below its start position.
    #[error("invalid range: end position {end} is before start position {start}")]
    InvalidRange { start: i64, end: i64 },

    /// Any operation issued after `delete_all_tables_and_data`.
    #[error("engine has been deleted and is no longer usable")]
    EngineDeleted,

    /// Anything raised by the table adapter (connection failure, DDL
    /// rejected, etc). The adapter's own error is preserved as the source.
    #[error("adapter failure: {message}")]
    AdapterFailure {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl Error {
    /// Wrap an adapter error, preserving it as the error source.
    pub fn adapter<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::AdapterFailure {
            message: source.to_string(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn config_invalid(message: impl fmt::Display) -> Self {
        Self::ConfigInvalid(message.to_string())
    }
}
