//! Spectral sequences whose differentials and products are only partially known.
//!
//! A [`SpectralSequence`] owns a [`Term`] at every [`Location`] where the $E_1$ page is nonzero,
//! together with [`Differential`]s and a [`MultiplicationTable`]. Both differentials and products
//! are recorded as lists of [`fp::matrix::PartialDefinition`]s and only assembled into matrices
//! when they are read. The Leibniz rule derives further partial definitions from known ones, and
//! an optional [`PolynomialBacking`] presents the $E_1$ page as a truncated polynomial algebra.
#![deny(clippy::use_self)]

pub mod chart;
mod differential;
mod error;
mod leibniz;
pub mod location;
mod multiplication;
mod persist;
mod polynomial;
mod sseq;
mod tensor;
mod term;
mod zero_range;

pub use differential::*;
pub use error::SseqError;
pub use location::{Location, Pair, Triple};
pub use multiplication::*;
pub use polynomial::*;
pub use term::Term;
pub use zero_range::ZeroRange;

pub use crate::sseq::*;
