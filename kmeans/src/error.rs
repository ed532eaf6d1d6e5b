//! Error taxonomy for the clustering engine.
//! Every variant aborts the whole run; nothing here is retried.

use thiserror::Error;

/// Errors returned by parsing, rendering and the clustering loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KMeansError {
    /// Record does not split into the expected number of fields.
    #[error("malformed record: expected {expected} fields, found {found} in `{record}`")]
    MalformedRecord {
        record: String,
        expected: usize,
        found: usize,
    },

    /// A non-categorical field is not a number.
    #[error("invalid numeric field in column {column}: `{token}` in `{record}`")]
    InvalidNumericField {
        column: usize,
        token: String,
        record: String,
    },

    /// Categorical token missing from the column dictionary.
    #[error("unknown token `{token}` in categorical column {column}")]
    UnknownToken { column: usize, token: String },

    /// Rounded code has no token in the column dictionary.
    #[error("code {code} out of range for categorical column {column}")]
    CodeOutOfRange { column: usize, code: i64 },

    /// Two vectors (or a vector and the schema) disagree on length.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// k is zero or larger than the number of distinct points.
    #[error("no centroids: requested {requested}, but only {available} distinct points available")]
    NoCentroids { requested: usize, available: usize },

    /// Assignment was asked to pick from an empty centroid set.
    #[error("cannot assign a point: the centroid set is empty")]
    EmptyCentroidSet,

    /// A centroid lost all of its points.
    #[error("cluster {label} has no assigned points")]
    EmptyCluster { label: usize },

    /// Reduce was called on an empty dataset.
    #[error("reduce over an empty collection")]
    EmptyCollection,

    /// Failure inside the execution engine.
    #[error("execution engine failure: {0}")]
    Substrate(String),

    /// Schema description is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, KMeansError>;
