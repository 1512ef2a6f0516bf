use serde::{Deserialize, Serialize};

use crate::Location;

/// A region of the chart declared to vanish identically.
///
/// Zero ranges license default zero differentials: a differential landing in a zero range at a
/// location without a term is known to be zero, rather than unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZeroRange {
    /// The points `(x, y)` of the chart with `left <= x <= right` and `bottom <= y <= top`.
    Rectangle {
        left: i32,
        right: i32,
        bottom: i32,
        top: i32,
    },
    /// Every location without a term.
    Strict,
}

impl ZeroRange {
    pub fn rectangle(left: i32, right: i32, bottom: i32, top: i32) -> Self {
        Self::Rectangle {
            left,
            right,
            bottom,
            top,
        }
    }

    /// The half plane `x < x_bound`.
    pub fn left_of(x_bound: i32) -> Self {
        Self::rectangle(i32::MIN, x_bound.saturating_sub(1), i32::MIN, i32::MAX)
    }

    /// The half plane `y < y_bound`.
    pub fn below(y_bound: i32) -> Self {
        Self::rectangle(i32::MIN, i32::MAX, i32::MIN, y_bound.saturating_sub(1))
    }

    /// Whether `location` lies in the range. `has_term` says whether the spectral sequence has a
    /// term at `location`.
    pub fn contains<L: Location>(&self, location: L, has_term: bool) -> bool {
        match *self {
            Self::Rectangle {
                left,
                right,
                bottom,
                top,
            } => {
                let (x, y) = location.to_point();
                (left..=right).contains(&x) && (bottom..=top).contains(&y)
            }
            Self::Strict => !has_term,
        }
    }
}
