//! Read-only snapshots of a page, for drawing charts.
//!
//! Classes on $E_r$ are indexed by the columns of [`Term::homology_basis`], and the image of a
//! class under a differential or product is written in the homology basis of its target.
use fp::matrix::Matrix;
use serde::{Deserialize, Serialize};

use crate::{Location, SpectralSequence, SseqError, Term};

/// The points `(x, y)` of the chart with `left <= x <= right` and `bottom <= y <= top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRect {
    pub left: i32,
    pub right: i32,
    pub bottom: i32,
    pub top: i32,
}

impl GridRect {
    pub fn new(left: i32, right: i32, bottom: i32, top: i32) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
        }
    }

    pub fn contains<L: Location>(&self, location: L) -> bool {
        let (x, y) = location.to_point();
        (self.left..=self.right).contains(&x) && (self.bottom..=self.top).contains(&y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(bound = "")]
pub struct TermSnapshot<L: Location> {
    pub location: L,
    pub rank: usize,
    pub labels: Vec<String>,
}

/// A differential hitting the `target_index`th class of $E_r$ at `target` with nonzero
/// coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(bound = "")]
pub struct DifferentialSnapshot<L: Location> {
    pub source: L,
    pub source_index: usize,
    pub target: L,
    pub target_index: usize,
}

/// Multiplication by a fixed $E_1$ class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ProductRule<L: Location> {
    pub location: L,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(bound = "")]
pub struct ProductAnnotation<L: Location> {
    pub start: L,
    pub start_index: usize,
    pub end: L,
    pub end_index: usize,
}

/// The coordinates of the cycle `vector` in the homology basis of $E_r$, or `None` if it is not a
/// cycle.
fn homology_coordinates<L: Location>(
    term: &Term<L>,
    page: i32,
    vector: &[u32],
) -> Result<Option<Vec<u32>>, SseqError> {
    let basis = term.homology_basis(page)?;
    let rank = basis.width();
    let solution = basis
        .direct_sum_common_target(term.boundaries(page))?
        .solve(vector)?;
    Ok(solution.map(|mut x| {
        x.truncate(rank);
        x
    }))
}

/// Edges from each class to the classes with nonzero coefficient in `vector`.
fn edges<L: Location>(
    target: &Term<L>,
    page: i32,
    vector: &[u32],
) -> Result<Vec<usize>, SseqError> {
    match homology_coordinates(target, page, vector)? {
        Some(coordinates) => Ok(coordinates
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c != 0)
            .map(|(j, _)| j)
            .collect()),
        None => {
            tracing::warn!(location = %target.location(), page, "image is not a cycle");
            Ok(Vec::new())
        }
    }
}

/// The nonzero groups $E_r$ in `rect`, with labels for their classes.
pub fn terms_at<L: Location>(
    sseq: &SpectralSequence<L>,
    page: i32,
    rect: GridRect,
) -> Result<Vec<TermSnapshot<L>>, SseqError> {
    let mut result = Vec::new();
    for term in sseq.terms().filter(|t| rect.contains(t.location())) {
        let basis = term.homology_basis(page)?;
        if basis.width() == 0 {
            continue;
        }
        let labels = basis
            .columns()
            .map(|z| term.label(&z))
            .collect::<Result<Vec<_>, _>>()?;
        result.push(TermSnapshot {
            location: term.location(),
            rank: labels.len(),
            labels,
        });
    }
    Ok(result)
}

/// The $d_r$ differentials whose source lies in `rect`. Differentials that are only known on part
/// of their source are left out.
pub fn differentials_at<L: Location>(
    sseq: &SpectralSequence<L>,
    page: i32,
    rect: GridRect,
) -> Result<Vec<DifferentialSnapshot<L>>, SseqError> {
    let mut result = Vec::new();
    for d in sseq
        .differentials()
        .filter(|d| d.page() == page && rect.contains(d.start()))
    {
        let (Some(source), Some(target)) = (sseq.find_term(d.start()), sseq.find_term(d.end()))
        else {
            continue;
        };
        let presentation = match sseq.differential_matrix(d.start(), page) {
            Ok(matrix) => matrix,
            Err(SseqError::UndefinedDifferential { .. }) => {
                tracing::debug!(start = %d.start(), page, "skipping undetermined differential");
                continue;
            }
            Err(e) => return Err(e),
        };
        for (source_index, z) in source.homology_basis(page)?.columns().enumerate() {
            for target_index in edges(target, page, &presentation.act_on(&z)?)? {
                result.push(DifferentialSnapshot {
                    source: d.start(),
                    source_index,
                    target: d.end(),
                    target_index,
                });
            }
        }
    }
    Ok(result)
}

/// Products of the classes in `rect` with the class named by `rule`. Locations where the product
/// is not known are skipped.
pub fn multiplication_annotations_at<L: Location>(
    sseq: &SpectralSequence<L>,
    page: i32,
    rect: GridRect,
    rule: ProductRule<L>,
) -> Result<Vec<ProductAnnotation<L>>, SseqError> {
    let rule_size = sseq
        .find_term(rule.location)
        .ok_or_else(|| SseqError::MissingTerm(rule.location.to_string()))?
        .size();
    if rule.index >= rule_size {
        return Err(SseqError::InvariantViolation {
            location: rule.location.to_string(),
            reason: format!("there is no class {} in a term of size {rule_size}", rule.index),
        });
    }

    let mut result = Vec::new();
    for term in sseq.terms().filter(|t| rect.contains(t.location())) {
        let start = term.location();
        let end = rule.location + start;
        let Some(target) = sseq.find_term(end) else {
            continue;
        };
        let Some(product) = sseq.product_matrix(rule.location, start)? else {
            continue;
        };
        let mut selector = Matrix::new(sseq.prime(), rule_size * term.size(), term.size());
        for i in 0..term.size() {
            selector.set_entry(rule.index * term.size() + i, i, 1);
        }
        let times_rule = product.multiply(&selector)?;
        for (start_index, z) in term.homology_basis(page)?.columns().enumerate() {
            for end_index in edges(target, page, &times_rule.act_on(&z)?)? {
                result.push(ProductAnnotation {
                    start,
                    start_index,
                    end,
                    end_index,
                });
            }
        }
    }
    Ok(result)
}
