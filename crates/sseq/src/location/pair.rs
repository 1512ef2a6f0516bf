use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use super::{parse_coordinates, Location, ParseLocationError};

/// Bigraded locations in Adams grading, where $d_r \colon E_r^{a, b} \to E_r^{a - 1, b + r}$.
///
/// The first coordinate is the stem and the second is the filtration. Signs are governed by the
/// stem.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair(pub i32, pub i32);

impl Location for Pair {
    const NAME: &'static str = "pair";

    fn identity() -> Self {
        Self(0, 0)
    }

    fn scale(self, n: i32) -> Self {
        Self(self.0 * n, self.1 * n)
    }

    fn follow_diffl(self, page: i32) -> Self {
        Self(self.0 - 1, self.1 + page)
    }

    fn reverse_diffl(self, page: i32) -> Self {
        Self(self.0 + 1, self.1 - page)
    }

    fn calculate_diffl_page(start: Self, end: Self) -> Option<i32> {
        let page = end.1 - start.1;
        (end.0 == start.0 - 1 && page >= 1).then_some(page)
    }

    fn koszul_degree(self) -> i32 {
        self.0
    }

    fn to_point(self) -> (i32, i32) {
        (self.0, self.1)
    }
}

impl Add for Pair {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0, self.1 + other.1)
    }
}

impl Sub for Pair {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0, self.1 - other.1)
    }
}

impl Neg for Pair {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0, -self.1)
    }
}

impl Display for Pair {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl FromStr for Pair {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [a, b] = parse_coordinates(s)?;
        Ok(Self(a, b))
    }
}
