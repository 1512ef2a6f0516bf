use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use super::{parse_coordinates, Location, ParseLocationError};

/// Trigraded locations, as in the May spectral sequence, where
/// $d_r \colon E_r^{a, b, c} \to E_r^{a - 1, b + 1, c + r}$.
///
/// The chart shows the first two coordinates, and the third records the extra filtration. Signs
/// are governed by the first coordinate.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple(pub i32, pub i32, pub i32);

impl Location for Triple {
    const NAME: &'static str = "triple";

    fn identity() -> Self {
        Self(0, 0, 0)
    }

    fn scale(self, n: i32) -> Self {
        Self(self.0 * n, self.1 * n, self.2 * n)
    }

    fn follow_diffl(self, page: i32) -> Self {
        Self(self.0 - 1, self.1 + 1, self.2 + page)
    }

    fn reverse_diffl(self, page: i32) -> Self {
        Self(self.0 + 1, self.1 - 1, self.2 - page)
    }

    fn calculate_diffl_page(start: Self, end: Self) -> Option<i32> {
        let page = end.2 - start.2;
        (end.0 == start.0 - 1 && end.1 == start.1 + 1 && page >= 1).then_some(page)
    }

    fn koszul_degree(self) -> i32 {
        self.0
    }

    fn to_point(self) -> (i32, i32) {
        (self.0, self.1)
    }
}

impl Add for Triple {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0, self.1 + other.1, self.2 + other.2)
    }
}

impl Sub for Triple {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0, self.1 - other.1, self.2 - other.2)
    }
}

impl Neg for Triple {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0, -self.1, -self.2)
    }
}

impl Display for Triple {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}

impl FromStr for Triple {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [a, b, c] = parse_coordinates(s)?;
        Ok(Self(a, b, c))
    }
}
