//! Gradings of a spectral sequence.
//!
//! A [`Location`] is an element of a free abelian group, together with a convention for the
//! direction of the differentials. The differential $d_r$ out of `a` lands in
//! `a.follow_diffl(r)`, and this is required to be affine in `a`, i.e.
//! `(a + b).follow_diffl(r) == a.follow_diffl(r) + b`. The Leibniz rule and tensor products rely
//! on this.
use std::{
    fmt::{Debug, Display},
    hash::Hash,
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

mod pair;
mod triple;

pub use pair::Pair;
pub use triple::Triple;

pub trait Location:
    Copy
    + Eq
    + Hash
    + Ord
    + Debug
    + Display
    + FromStr<Err = ParseLocationError>
    + Serialize
    + DeserializeOwned
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// The name of the grading in saved documents.
    const NAME: &'static str;

    fn identity() -> Self;

    fn scale(self, n: i32) -> Self;

    /// The location hit by a $d_r$ differential out of `self`.
    fn follow_diffl(self, page: i32) -> Self;

    /// The location a $d_r$ differential into `self` comes from.
    fn reverse_diffl(self, page: i32) -> Self;

    /// The page of a differential from `start` to `end`, if there is one. Pages start at 1.
    fn calculate_diffl_page(start: Self, end: Self) -> Option<i32>;

    /// The degree whose parity governs signs when an element of this degree is commuted past
    /// another element or past a differential.
    fn koszul_degree(self) -> i32;

    /// The position of the location on a two dimensional chart.
    fn to_point(self) -> (i32, i32);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {input:?} as a location with {expected} coordinates")]
pub struct ParseLocationError {
    pub input: String,
    pub expected: usize,
}

/// Parses strings of the form `(1, -2, 3)`. The parentheses are optional.
pub(crate) fn parse_coordinates<const N: usize>(input: &str) -> Result<[i32; N], ParseLocationError> {
    let error = || ParseLocationError {
        input: input.to_owned(),
        expected: N,
    };
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut result = [0; N];
    let mut parts = inner.split(',');
    for entry in result.iter_mut() {
        *entry = parts
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(error)?;
    }
    if parts.next().is_some() {
        return Err(error());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates::<2>("(1, -2)"), Ok([1, -2]));
        assert_eq!(parse_coordinates::<3>(" 4,5 ,6 "), Ok([4, 5, 6]));
        assert!(parse_coordinates::<2>("(1, 2, 3)").is_err());
        assert!(parse_coordinates::<2>("(1)").is_err());
        assert!(parse_coordinates::<2>("(a, b)").is_err());
    }
}
