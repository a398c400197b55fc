//! Error types for Sift.

use thiserror::Error as ThisError;

/// Boxed failure reported by a data source.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for Sift operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A single-result query matched more than one row
    #[error("ambiguous result: expected at most one row, found {found}")]
    AmbiguousResult { found: usize },

    /// Projection target does not fit the selected columns
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A field reference does not resolve against entity metadata
    #[error("unresolved field reference `{path}.{field}`")]
    UnresolvedField { path: String, field: String },

    /// Entity missing from the schema
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    /// Malformed query description
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Failure reported by the data source, passed through unchanged
    #[error("data source failure: {0}")]
    Source(#[source] SourceError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A lock was poisoned (internal error)
    #[error("lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Wraps a data source failure.
    pub fn from_source<E>(err: E) -> Self
    where
        E: Into<SourceError>,
    {
        Error::Source(err.into())
    }

    /// Shape mismatch raised by a property-assignment target for an attribute it does not have.
    pub fn unknown_attribute(target: &str, attribute: &str) -> Self {
        Error::ShapeMismatch(format!("`{target}` has no settable attribute `{attribute}`"))
    }
}

/// A specialized `Result` type for Sift operations.
pub type Result<T> = std::result::Result<T, Error>;
