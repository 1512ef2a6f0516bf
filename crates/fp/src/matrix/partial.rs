//! Partial definitions of linear maps, and the machinery to stitch them together.
//!
//! We often only know a map on a subspace of its domain. For instance, the Leibniz rule
//! determines a differential on the image of a product map $E^{a} \otimes E^{b} \to E^{a+b}$,
//! and there is no reason for that map to be surjective. Such partial definitions are not trivial
//! to combine, so we record all of them and merge them in one place, [`assemble_presentation`].
use serde::{Deserialize, Serialize};

use super::{Matrix, MatrixError};
use crate::prime::ValidPrime;

/// A map known only on a subspace of its domain.
///
/// # Fields
///  * `inclusion` - A `source_dim x k` matrix whose columns span the subspace.
///  * `action` - A `target_dim x k` matrix whose columns are the images of the columns of
///  `inclusion`.
///  * `automatically_generated` - Whether this came from an inference rule rather than the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartialDefinition {
    inclusion: Matrix,
    action: Matrix,
    automatically_generated: bool,
}

impl PartialDefinition {
    pub fn new(inclusion: Matrix, action: Matrix) -> Result<Self, MatrixError> {
        if inclusion.prime() != action.prime() {
            return Err(MatrixError::PrimeMismatch(
                *inclusion.prime(),
                *action.prime(),
            ));
        }
        if inclusion.width() != action.width() {
            return Err(MatrixError::DimensionMismatch {
                op: "partial_definition",
                left: inclusion.shape(),
                right: action.shape(),
            });
        }
        Ok(Self {
            inclusion,
            action,
            automatically_generated: false,
        })
    }

    /// A partial definition produced by an inference rule.
    pub fn automatic(inclusion: Matrix, action: Matrix) -> Result<Self, MatrixError> {
        let mut result = Self::new(inclusion, action)?;
        result.automatically_generated = true;
        Ok(result)
    }

    /// A definition on the entire domain.
    pub fn full(action: Matrix) -> Self {
        Self {
            inclusion: Matrix::identity(action.prime(), action.width()),
            action,
            automatically_generated: false,
        }
    }

    /// Marks the definition as supplied by hand.
    pub fn manually_generated(&mut self) {
        self.automatically_generated = false;
    }

    pub fn inclusion(&self) -> &Matrix {
        &self.inclusion
    }

    pub fn action(&self) -> &Matrix {
        &self.action
    }

    pub fn automatically_generated(&self) -> bool {
        self.automatically_generated
    }

    pub fn prime(&self) -> ValidPrime {
        self.inclusion.prime()
    }

    pub fn source_dimension(&self) -> usize {
        self.inclusion.height()
    }

    pub fn target_dimension(&self) -> usize {
        self.action.height()
    }

    /// Whether the action vanishes on the kernel of the inclusion, i.e. whether this partial
    /// definition describes a map at all.
    pub fn is_self_consistent(&self) -> bool {
        self.action
            .multiply(&self.inclusion.kernel())
            .map_or(false, |m| m.is_zero())
    }

    /// Whether `self` and `other` agree on the intersection of their domains.
    pub fn agrees_with(&self, other: &Self) -> Result<bool, MatrixError> {
        let (l, r) = Matrix::form_intersection(&self.inclusion, &other.inclusion)?;
        Ok(self.action.multiply(&l)? == other.action.multiply(&r)?)
    }

    /// Pads the source and target with zero rows, for when new basis elements are appended to
    /// either space. The dimensions cannot shrink.
    pub fn pad(&self, source_dim: usize, target_dim: usize) -> Result<Self, MatrixError> {
        let pad_rows = |m: &Matrix, height: usize| {
            if height < m.height() {
                return Err(MatrixError::DimensionMismatch {
                    op: "pad",
                    left: m.shape(),
                    right: (height, m.width()),
                });
            }
            let mut result = Matrix::new(m.prime(), height, m.width());
            for i in 0..m.height() {
                for j in 0..m.width() {
                    result.set_entry(i, j, m.entry(i, j));
                }
            }
            Ok(result)
        };
        Ok(Self {
            inclusion: pad_rows(&self.inclusion, source_dim)?,
            action: pad_rows(&self.action, target_dim)?,
            automatically_generated: self.automatically_generated,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definedness {
    /// The partial definitions cover the whole source and agree with each other.
    WellDefined,
    /// The partial definitions agree, but only span a subspace of codimension `missing`. The
    /// presentation is zero on the chosen complement.
    Partial { missing: usize },
    /// The partial definitions disagree. `conflicts` lists pairs of indices of partial
    /// definitions that disagree on the intersection of their domains, with `(i, i)` meaning the
    /// `i`th partial definition contradicts itself. Self-contradictory definitions are not
    /// compared with the others. The list is empty when the disagreement only
    /// appears among three or more of them.
    Inconsistent { conflicts: Vec<(usize, usize)> },
}

/// A presentation assembled from partial definitions. It is always a `target_dim x source_dim`
/// matrix, even when the definitions did not determine the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub presentation: Matrix,
    pub definedness: Definedness,
}

impl Assembly {
    pub fn is_well_defined(&self) -> bool {
        self.definedness == Definedness::WellDefined
    }

    pub fn is_inconsistent(&self) -> bool {
        matches!(self.definedness, Definedness::Inconsistent { .. })
    }
}

/// Stitches together partial definitions into a single `target_dim x source_dim` matrix.
///
/// Write $I$ and $A$ for the horizontal concatenations of the inclusions and actions. The
/// definitions are consistent exactly when $A$ vanishes on $\ker I$, and they determine the map
/// exactly when $I$ has full rank. After column reducing $I T = [E | 0]$, the presentation sends
/// the pivot row of the $j$th column of $E$ to the $j$th column of $A T$, and sends the basis
/// vectors outside the pivot rows to zero.
///
/// Conflicting definitions are never resolved: the assembly is flagged
/// [`Definedness::Inconsistent`] and the caller keeps all the partial definitions.
pub fn assemble_presentation(
    p: ValidPrime,
    partials: &[PartialDefinition],
    source_dim: usize,
    target_dim: usize,
) -> Result<Assembly, MatrixError> {
    let mut inclusions = Matrix::new(p, source_dim, 0);
    let mut actions = Matrix::new(p, target_dim, 0);
    for partial in partials {
        if partial.source_dimension() != source_dim || partial.target_dimension() != target_dim {
            return Err(MatrixError::DimensionMismatch {
                op: "assemble_presentation",
                left: (target_dim, source_dim),
                right: (partial.target_dimension(), partial.source_dimension()),
            });
        }
        inclusions = inclusions.direct_sum_common_target(&partial.inclusion)?;
        actions = actions.direct_sum_common_target(&partial.action)?;
    }

    let reduction = inclusions.column_reduction();
    let rank = reduction.rank();
    let transformed = actions.multiply(&reduction.transform)?;

    let mut presentation = Matrix::new(p, target_dim, source_dim);
    for (j, &row) in reduction.pivot_rows.iter().enumerate() {
        for i in 0..target_dim {
            presentation.set_entry(i, row, transformed.entry(i, j));
        }
    }

    let consistent = (rank..transformed.width()).all(|j| transformed.is_column_zero(j));
    let definedness = if !consistent {
        Definedness::Inconsistent {
            conflicts: find_conflicts(partials)?,
        }
    } else if rank < source_dim {
        Definedness::Partial {
            missing: source_dim - rank,
        }
    } else {
        Definedness::WellDefined
    };

    Ok(Assembly {
        presentation,
        definedness,
    })
}

fn find_conflicts(partials: &[PartialDefinition]) -> Result<Vec<(usize, usize)>, MatrixError> {
    // A self-contradictory definition disagrees with everything, so only report it once.
    let sane: Vec<bool> = partials.iter().map(|p| p.is_self_consistent()).collect();
    let mut conflicts = Vec::new();
    for (i, a) in partials.iter().enumerate() {
        if !sane[i] {
            conflicts.push((i, i));
            continue;
        }
        for (j, b) in partials.iter().enumerate().skip(i + 1) {
            if sane[j] && !a.agrees_with(b)? {
                conflicts.push((i, j));
            }
        }
    }
    Ok(conflicts)
}
