use fp::{matrix::Matrix, prime::ValidPrime};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{persist::Keyed, Location, SpectralSequence, SseqError};

/// A change of basis used when presenting classes, together with names for the new basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DisplayBasis {
    /// The columns are the display basis, written in the ambient basis.
    basis: Matrix,
    inverse: Matrix,
    names: Vec<String>,
}

/// The graded piece of a spectral sequence at a single location.
///
/// The ambient space is the $E_1$ term, with a named basis. For every computed page `r` we keep
/// bases of the cycles $Z_r$ and boundaries $B_r$ as the columns of matrices, so that
/// $E_r = Z_r / B_r$. Page 1 has $Z_1$ the whole space and $B_1 = 0$. As the page increases the
/// cycles shrink and the boundaries grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Term<L: Location> {
    location: L,
    names: Vec<String>,
    /// `cycles[r - 1]` spans $Z_r$
    cycles: Vec<Matrix>,
    /// `boundaries[r - 1]` spans $B_r$
    boundaries: Vec<Matrix>,
    display: Option<DisplayBasis>,
}

impl<L: Location> Keyed for Term<L> {
    type Key = L;

    fn key(&self) -> L {
        self.location
    }
}

impl<L: Location> Term<L> {
    pub fn new(p: ValidPrime, location: L, names: Vec<String>) -> Self {
        let size = names.len();
        Self {
            location,
            names,
            cycles: vec![Matrix::identity(p, size)],
            boundaries: vec![Matrix::new(p, size, 0)],
            display: None,
        }
    }

    pub fn location(&self) -> L {
        self.location
    }

    pub fn prime(&self) -> ValidPrime {
        self.cycles[0].prime()
    }

    /// The dimension of the $E_1$ term.
    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The last page whose cycles and boundaries are known.
    pub fn computed_pages(&self) -> i32 {
        self.cycles.len() as i32
    }

    /// Pages past the last computed page reuse the last computed data.
    fn page_index(&self, page: i32) -> usize {
        let page = usize::try_from(page.max(1)).unwrap_or(1);
        (page - 1).min(self.cycles.len() - 1)
    }

    pub fn cycles(&self, page: i32) -> &Matrix {
        &self.cycles[self.page_index(page)]
    }

    pub fn boundaries(&self, page: i32) -> &Matrix {
        &self.boundaries[self.page_index(page)]
    }

    fn check_containment(&self, page: i32) -> Result<(), SseqError> {
        check_boundaries(self.location, page, self.cycles(page), self.boundaries(page))
    }

    /// The dimension of $E_r$.
    pub fn dimension(&self, page: i32) -> Result<usize, SseqError> {
        self.check_containment(page)?;
        Ok(self.cycles(page).rank() - self.boundaries(page).rank())
    }

    /// Cycles representing a basis of $E_r$. These are chosen greedily among the basis of $Z_r$,
    /// keeping the ones that are independent modulo $B_r$.
    pub fn homology_basis(&self, page: i32) -> Result<Matrix, SseqError> {
        self.check_containment(page)?;
        let p = self.prime();
        let size = self.size();
        let mut span = self.boundaries(page).image();
        let mut chosen = Vec::new();
        for column in self.cycles(page).columns() {
            let extended = span
                .direct_sum_common_target(&Matrix::from_columns(p, size, &[column.clone()]))?;
            if extended.rank() > span.width() {
                span = extended;
                chosen.push(column);
            }
        }
        Ok(Matrix::from_columns(p, size, &chosen))
    }

    /// Computes $Z_r$ from the page $r - 1$ data. A cycle survives to $E_r$ if the $d_{r - 1}$
    /// differential sends it into $B_{r - 1}$ of the target. If there is no such differential,
    /// nothing changes.
    pub fn compute_cycles(
        &self,
        page: i32,
        sseq: &SpectralSequence<L>,
    ) -> Result<Matrix, SseqError> {
        if page <= 1 {
            return Ok(Matrix::identity(self.prime(), self.size()));
        }
        let previous = self.cycles(page - 1);
        let Some(d) = sseq.find_diffl_with_source(self.location, page - 1) else {
            return Ok(previous.clone());
        };
        let target_boundaries = match sseq.find_term(d.end()) {
            Some(target) => target.boundaries(page - 1).clone(),
            None => Matrix::new(self.prime(), d.target_dimension(), 0),
        };
        let images = d.presentation()?.multiply(previous)?;
        let (survivors, _) = Matrix::form_intersection(&images, &target_boundaries)?;
        Ok(previous.multiply(&survivors)?.image())
    }

    /// Computes $B_r$ from the page $r - 1$ data, adding the image of $Z_{r - 1}$ of the source
    /// of the incoming $d_{r - 1}$.
    pub fn compute_boundaries(
        &self,
        page: i32,
        sseq: &SpectralSequence<L>,
    ) -> Result<Matrix, SseqError> {
        if page <= 1 {
            return Ok(Matrix::new(self.prime(), self.size(), 0));
        }
        let previous = self.boundaries(page - 1);
        let Some(d) = sseq.find_diffl_with_target(self.location, page - 1) else {
            return Ok(previous.clone());
        };
        let source = sseq
            .find_term(d.start())
            .ok_or_else(|| SseqError::MissingTerm(d.start().to_string()))?;
        let images = d.presentation()?.multiply(source.cycles(page - 1))?;
        Ok(previous.direct_sum_common_target(&images)?.image())
    }

    pub(crate) fn push_page(&mut self, cycles: Matrix, boundaries: Matrix) {
        self.cycles.push(cycles);
        self.boundaries.push(boundaries);
    }

    pub(crate) fn truncate_pages(&mut self, pages: i32) {
        let pages = usize::try_from(pages.max(1)).unwrap_or(1);
        self.cycles.truncate(pages);
        self.boundaries.truncate(pages);
    }

    /// Appends a basis element to the $E_1$ term. This forgets all pages past the first, and any
    /// display basis.
    pub(crate) fn add_basis_element(&mut self, name: String) -> usize {
        let p = self.prime();
        self.names.push(name);
        let size = self.size();
        self.cycles = vec![Matrix::identity(p, size)];
        self.boundaries = vec![Matrix::new(p, size, 0)];
        self.display = None;
        size - 1
    }

    pub(crate) fn set_names(&mut self, names: Vec<String>) {
        debug_assert_eq!(names.len(), self.size());
        self.names = names;
    }

    /// Present classes in the basis given by the columns of `basis`, with the given names.
    pub fn set_display_basis(&mut self, basis: Matrix, names: Vec<String>) -> Result<(), SseqError> {
        if basis.shape() != (self.size(), self.size()) || names.len() != self.size() {
            return Err(SseqError::InvariantViolation {
                location: self.location.to_string(),
                reason: format!(
                    "a display basis must be {0}x{0} with {0} names",
                    self.size()
                ),
            });
        }
        let inverse = basis.invert()?;
        self.display = Some(DisplayBasis {
            basis,
            inverse,
            names,
        });
        Ok(())
    }

    pub fn clear_display_basis(&mut self) {
        self.display = None;
    }

    pub fn display_basis(&self) -> Option<&Matrix> {
        self.display.as_ref().map(|d| &d.basis)
    }

    pub fn display_names(&self) -> &[String] {
        match &self.display {
            Some(display) => &display.names,
            None => &self.names,
        }
    }

    /// A human readable name for a vector in the ambient basis, written in the display basis.
    pub fn label(&self, vector: &[u32]) -> Result<String, SseqError> {
        let coordinates = match &self.display {
            Some(display) => display.inverse.act_on(vector)?,
            None => vector.to_vec(),
        };
        let names = self.display_names();
        let terms = coordinates
            .iter()
            .zip(names)
            .filter(|&(&c, _)| c != 0)
            .map(|(&c, name)| {
                if c == 1 {
                    name.clone()
                } else {
                    format!("{c} {name}")
                }
            })
            .join(" + ");
        Ok(if terms.is_empty() {
            "0".to_owned()
        } else {
            terms
        })
    }
}

/// Checks that every boundary is a cycle, so that $Z_r / B_r$ makes sense.
pub(crate) fn check_boundaries<L: Location>(
    location: L,
    page: i32,
    cycles: &Matrix,
    boundaries: &Matrix,
) -> Result<(), SseqError> {
    let orders = Matrix::find_orders_of(cycles, boundaries)?;
    match orders.iter().position(|&order| order != 1) {
        None => Ok(()),
        Some(j) => Err(SseqError::InvariantViolation {
            location: location.to_string(),
            reason: format!("boundary {j} is not a cycle on page {page}"),
        }),
    }
}
