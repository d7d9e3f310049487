use datafusion::error::DataFusionError;
use thiserror::Error;

/// Failure taxonomy of the digest column type.
///
/// None of these are transient: they indicate a malformed record or a
/// misconfigured query, never something worth retrying.
#[derive(Debug, Error)]
pub enum SketchError {
    /// An encoded record does not have the four declared fields.
    #[error("invalid digest record schema: {0}")]
    Schema(String),
    /// Centroid and mass storage disagree at a decode boundary.
    #[error("inconsistent digest record: {0}")]
    Consistency(String),
    /// An input value or column is not convertible to the numeric domain.
    #[error("input not convertible to f64: {0}")]
    Type(String),
    /// Invalid `compression` or `max_discrete` at construction.
    #[error("invalid digest configuration: {0}")]
    Configuration(String),
}

impl From<SketchError> for DataFusionError {
    fn from(error: SketchError) -> Self {
        DataFusionError::External(Box::new(error))
    }
}
