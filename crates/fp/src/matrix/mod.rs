mod column_reduce;
mod matrix_inner;
mod partial;

#[cfg(feature = "proptest")]
pub mod arbitrary;

pub use column_reduce::ColumnReduction;
pub use matrix_inner::Matrix;
pub use partial::{assemble_presentation, Assembly, Definedness, PartialDefinition};

use thiserror::Error;

/// Errors from matrix operations. These always indicate a bug in the caller: the inputs had the
/// wrong shape, lived over different primes, or were not invertible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("dimension mismatch in {op}: {left:?} against {right:?}")]
    DimensionMismatch {
        op: &'static str,
        /// `(height, width)` of the left operand
        left: (usize, usize),
        /// `(height, width)` of the right operand
        right: (usize, usize),
    },
    #[error("matrix is not invertible")]
    NotInvertible,
    #[error("matrices are defined over different primes ({0} and {1})")]
    PrimeMismatch(u32, u32),
}
