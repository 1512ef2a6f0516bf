use fp::matrix::MatrixError;
use thiserror::Error;

/// Locations are recorded by their display form, so that the error type does not depend on the
/// grading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SseqError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error("invariant violated at {location}: {reason}")]
    InvariantViolation { location: String, reason: String },
    #[error("the d_{page} differential out of {location} has conflicting partial definitions")]
    Inconsistent { location: String, page: i32 },
    #[error("the product of {left} and {right} is not known")]
    UndefinedProduct { left: String, right: String },
    #[error("the d_{page} differential out of {location} is not known")]
    UndefinedDifferential { location: String, page: i32 },
    #[error("there is no term at {0}")]
    MissingTerm(String),
    #[error("no generator is named {0}")]
    UnknownGenerator(String),
    #[error("a generator named {0} already exists")]
    DuplicateGenerator(String),
    #[error("the spectral sequence has no polynomial structure")]
    NotPolynomial,
}
