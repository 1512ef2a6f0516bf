use std::collections::BTreeMap;

use fp::{
    matrix::{Matrix, PartialDefinition},
    prime::ValidPrime,
};
use serde::{Deserialize, Serialize};

use crate::{
    multiplication::check_class_index, persist, term::check_boundaries, Differential, Location,
    MultiplicationTable, PolynomialBacking, ProductShape, SseqError, Term, ZeroRange,
};

/// A spectral sequence graded by `L`.
///
/// The $E_1$ page is given by the [`Term`]s, and the pages up to [`SpectralSequence::pages`] are
/// computed. Any mutation that changes the algebra forgets the computed pages, and
/// [`SpectralSequence::advance_to_page`] recomputes them from page 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SpectralSequence<L: Location> {
    pub(crate) p: ValidPrime,
    #[serde(with = "persist::values")]
    pub(crate) terms: BTreeMap<L, Term<L>>,
    /// (start, page) -> differential
    #[serde(with = "persist::values")]
    pub(crate) differentials: BTreeMap<(L, i32), Differential<L>>,
    pub(crate) multiplication: MultiplicationTable<L>,
    pub(crate) zero_ranges: Vec<ZeroRange>,
    /// The last computed page
    pub(crate) pages: i32,
    pub(crate) polynomial: Option<PolynomialBacking<L>>,
}

impl<L: Location> SpectralSequence<L> {
    pub fn new(p: ValidPrime) -> Self {
        Self {
            p,
            terms: BTreeMap::new(),
            differentials: BTreeMap::new(),
            multiplication: MultiplicationTable::new(p),
            zero_ranges: Vec::new(),
            pages: 1,
            polynomial: None,
        }
    }

    /// A polynomial spectral sequence with no generators. The only class is the unit.
    pub fn polynomial(p: ValidPrime) -> Self {
        let mut result = Self::new(p);
        let identity = L::identity();
        result
            .terms
            .insert(identity, Term::new(p, identity, vec!["1".to_owned()]));
        result.multiplication.set_unit(Some(0));
        result.polynomial = Some(PolynomialBacking::new());
        result
    }

    pub fn prime(&self) -> ValidPrime {
        self.p
    }

    /// The last page whose groups are computed.
    pub fn pages(&self) -> i32 {
        self.pages
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term<L>> {
        self.terms.values()
    }

    pub fn differentials(&self) -> impl Iterator<Item = &Differential<L>> {
        self.differentials.values()
    }

    pub fn multiplication_table(&self) -> &MultiplicationTable<L> {
        &self.multiplication
    }

    pub fn zero_ranges(&self) -> &[ZeroRange] {
        &self.zero_ranges
    }

    pub fn polynomial_backing(&self) -> Option<&PolynomialBacking<L>> {
        self.polynomial.as_ref()
    }

    pub fn find_term(&self, location: L) -> Option<&Term<L>> {
        self.terms.get(&location)
    }

    /// Mutable access to a term, for changing how its classes are displayed.
    pub fn term_mut(&mut self, location: L) -> Option<&mut Term<L>> {
        self.terms.get_mut(&location)
    }

    /// The dimension of the $E_1$ term at `location`, which is zero if there is no term.
    pub(crate) fn size_at(&self, location: L) -> usize {
        self.terms.get(&location).map_or(0, Term::size)
    }

    /// The dimension of $E_r$ at `location`.
    pub fn dimension_at(&self, location: L, page: i32) -> Result<usize, SseqError> {
        match self.find_term(location) {
            Some(term) => term.dimension(page),
            None => Ok(0),
        }
    }

    pub fn find_diffl_with_source(&self, location: L, page: i32) -> Option<&Differential<L>> {
        self.differentials.get(&(location, page))
    }

    pub fn find_diffl_with_target(&self, location: L, page: i32) -> Option<&Differential<L>> {
        self.differentials
            .get(&(location.reverse_diffl(page), page))
    }

    /// The matrix of the $d_r$ differential out of `location`, when the known data determine it.
    ///
    /// A differential into a location without classes, or into a zero range, is zero. Otherwise
    /// the partial definitions must cover the whole term. If they do not, or if there are none,
    /// the differential is [`SseqError::UndefinedDifferential`], which is distinct from a
    /// differential known to be zero.
    pub fn differential_matrix(&self, location: L, page: i32) -> Result<Matrix, SseqError> {
        let source_size = self
            .find_term(location)
            .ok_or_else(|| SseqError::MissingTerm(location.to_string()))?
            .size();
        if let Some(d) = self.find_diffl_with_source(location, page) {
            let presentation = d.presentation()?;
            if d.well_defined()? {
                return Ok(presentation.clone());
            }
        }
        let end = location.follow_diffl(page);
        let target_size = self.size_at(end);
        if target_size == 0 || self.is_in_zero_ranges(end) {
            return Ok(Matrix::new(self.p, target_size, source_size));
        }
        Err(SseqError::UndefinedDifferential {
            location: location.to_string(),
            page,
        })
    }

    /// Adds a class to the $E_1$ term at `location`, creating the term if needed. Known
    /// differentials and products involving the term are padded with zeros.
    ///
    /// # Returns
    /// The index of the new class within the term.
    pub fn add_class(&mut self, location: L, name: &str) -> Result<usize, SseqError> {
        if self.polynomial.is_some() {
            return Err(SseqError::InvariantViolation {
                location: location.to_string(),
                reason: "classes of a polynomial spectral sequence come from its generators"
                    .to_owned(),
            });
        }
        self.extend_term(location, name.to_owned())
    }

    pub(crate) fn extend_term(&mut self, location: L, name: String) -> Result<usize, SseqError> {
        let p = self.p;
        let index = self
            .terms
            .entry(location)
            .or_insert_with(|| Term::new(p, location, Vec::new()))
            .add_basis_element(name);
        let size = index + 1;

        for d in self.differentials.values_mut() {
            if d.start() == location {
                d.resize(size, d.target_dimension())?;
            } else if d.end() == location {
                d.resize(d.source_dimension(), size)?;
            }
        }

        let terms = &self.terms;
        let size_at = |l: L| terms.get(&l).map_or(0, Term::size);
        for entry in self.multiplication.entries_mut() {
            let (left, right) = (entry.left(), entry.right());
            if left == location || right == location || left + right == location {
                entry.resize(ProductShape::new(
                    size_at(left),
                    size_at(right),
                    size_at(left + right),
                ))?;
            }
        }

        self.reset_pages();
        Ok(index)
    }

    /// Declares the `index`th class at [`Location::identity`] to be the unit.
    pub fn set_unit(&mut self, index: usize) -> Result<(), SseqError> {
        let identity = L::identity();
        let size = self.size_at(identity);
        if index >= size {
            return Err(SseqError::InvariantViolation {
                location: identity.to_string(),
                reason: format!("the unit {index} is out of range for a term of size {size}"),
            });
        }
        self.multiplication.set_unit(Some(index));
        Ok(())
    }

    /// Records a partial definition of the $d_r$ differential from `from` to `to`. The target
    /// need not have a term, in which case the action must have no rows.
    ///
    /// # Returns
    /// Whether the partial definition is new.
    pub fn add_partial_differential(
        &mut self,
        partial: PartialDefinition,
        from: L,
        to: L,
        page: i32,
    ) -> Result<bool, SseqError> {
        let added = self.insert_partial_differential(partial, from, to, page)?;
        if added {
            self.reset_pages();
        }
        Ok(added)
    }

    pub(crate) fn insert_partial_differential(
        &mut self,
        partial: PartialDefinition,
        from: L,
        to: L,
        page: i32,
    ) -> Result<bool, SseqError> {
        if !self.terms.contains_key(&from) {
            return Err(SseqError::MissingTerm(from.to_string()));
        }
        let d = match self.differentials.entry((from, page)) {
            std::collections::btree_map::Entry::Occupied(entry) => {
                let d = entry.into_mut();
                if d.end() != to {
                    return Err(SseqError::InvariantViolation {
                        location: from.to_string(),
                        reason: format!("the d_{page} differential lands in {}", d.end()),
                    });
                }
                d
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                let source_dimension = self.terms.get(&from).map_or(0, Term::size);
                let target_dimension = self.terms.get(&to).map_or(0, Term::size);
                entry.insert(Differential::new(
                    self.p,
                    from,
                    to,
                    page,
                    source_dimension,
                    target_dimension,
                )?)
            }
        };
        d.add_partial_definition(partial)
    }

    /// Records a partial definition of the product `E(left) ⊗ E(right) -> E(left + right)`.
    pub fn add_product_definition(
        &mut self,
        partial: PartialDefinition,
        left: L,
        right: L,
    ) -> Result<bool, SseqError> {
        for l in [left, right] {
            if !self.terms.contains_key(&l) {
                return Err(SseqError::MissingTerm(l.to_string()));
            }
        }
        let shape = self.product_shape(left, right);
        self.multiplication
            .add_partial_definition(left, right, shape, partial)
    }

    pub(crate) fn product_shape(&self, left: L, right: L) -> ProductShape {
        ProductShape::new(
            self.size_at(left),
            self.size_at(right),
            self.size_at(left + right),
        )
    }

    /// The matrix of the product `E(left) ⊗ E(right) -> E(left + right)`, or `None` if it is not
    /// known. Products involving a zero term are zero, and a polynomial structure determines
    /// every product.
    pub fn product_matrix(&self, left: L, right: L) -> Result<Option<Matrix>, SseqError> {
        let shape = self.product_shape(left, right);
        if shape.source() == 0 || shape.target == 0 {
            return Ok(Some(Matrix::new(self.p, shape.target, shape.source())));
        }
        if let Some(backing) = &self.polynomial {
            return backing.product_matrix(self.p, left, right).map(Some);
        }
        self.multiplication.get_matrix_for(left, right, shape)
    }

    /// The product of two $E_1$ basis elements.
    pub fn multiply_class(
        &self,
        left: L,
        left_index: usize,
        right: L,
        right_index: usize,
    ) -> Result<Vec<u32>, SseqError> {
        let shape = self.product_shape(left, right);
        check_class_index(left, left_index, shape.left)?;
        check_class_index(right, right_index, shape.right)?;
        if self.polynomial.is_some() {
            let matrix = self
                .product_matrix(left, right)?
                .ok_or_else(|| SseqError::UndefinedProduct {
                    left: left.to_string(),
                    right: right.to_string(),
                })?;
            return Ok(matrix.column(left_index * shape.right + right_index));
        }
        self.multiplication
            .multiply_class(left, left_index, right, right_index, shape)
    }

    /// Declares `range` to vanish. A differential landing in a zero range at a location without a
    /// term is known to be zero.
    pub fn set_zero_range(&mut self, range: ZeroRange) {
        if !self.zero_ranges.contains(&range) {
            self.zero_ranges.push(range);
        }
    }

    pub fn is_in_zero_ranges(&self, location: L) -> bool {
        let has_term = self.terms.contains_key(&location);
        self.zero_ranges
            .iter()
            .any(|range| range.contains(location, has_term))
    }

    /// Computes $E_r$ at every term from the page $r - 1$ data. All cycles and boundaries are
    /// computed before any term is updated, so the order of the terms does not matter.
    #[tracing::instrument(skip(self), fields(terms = self.terms.len()))]
    pub fn compute_groups_for_page(&mut self, page: i32) -> Result<(), SseqError> {
        if page <= self.pages {
            return Ok(());
        }
        if page != self.pages + 1 {
            return Err(SseqError::InvariantViolation {
                location: L::identity().to_string(),
                reason: format!(
                    "page {page} requested but only pages up to {} are computed",
                    self.pages
                ),
            });
        }

        let mut groups = Vec::with_capacity(self.terms.len());
        for (&location, term) in &self.terms {
            let cycles = term.compute_cycles(page, self)?;
            let boundaries = term.compute_boundaries(page, self)?;
            check_boundaries(location, page, &cycles, &boundaries)?;
            groups.push((location, cycles, boundaries));
        }

        for (location, cycles, boundaries) in groups {
            if let Some(term) = self.terms.get_mut(&location) {
                term.push_page(cycles, boundaries);
            }
        }
        self.pages = page;
        Ok(())
    }

    pub fn advance_to_page(&mut self, page: i32) -> Result<(), SseqError> {
        while self.pages < page {
            self.compute_groups_for_page(self.pages + 1)?;
        }
        Ok(())
    }

    /// Forgets every page past the first.
    pub fn reset_pages(&mut self) {
        for term in self.terms.values_mut() {
            term.truncate_pages(1);
        }
        self.pages = 1;
    }

    /// Removes the differentials and products that involve `location`.
    ///
    /// # Returns
    /// The number of partial definitions and product entries removed.
    pub(crate) fn remove_structure_touching(&mut self, location: L) -> usize {
        let mut removed = 0;
        self.differentials.retain(|_, d| {
            let touches = d.start() == location || d.end() == location;
            if touches {
                removed += d.partial_definitions().len();
            }
            !touches
        });
        removed + self.multiplication.remove_entries_touching(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pair;
    use rstest::rstest;

    fn column(p: ValidPrime, v: Vec<u32>) -> Matrix {
        Matrix::from_columns(p, v.len(), &[v])
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn test_d2_kills_pair(#[case] p: u32) {
        let p = ValidPrime::new(p);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(1, 0), "x").unwrap();
        sseq.add_class(Pair(0, 2), "y").unwrap();
        sseq.add_class(Pair(0, 2), "z").unwrap();
        sseq.add_partial_differential(
            PartialDefinition::full(Matrix::from_vec(p, &[vec![1], vec![1]])),
            Pair(1, 0),
            Pair(0, 2),
            2,
        )
        .unwrap();
        sseq.advance_to_page(3).unwrap();
        assert_eq!(sseq.pages(), 3);
        assert_eq!(sseq.dimension_at(Pair(1, 0), 2).unwrap(), 1);
        assert_eq!(sseq.dimension_at(Pair(1, 0), 3).unwrap(), 0);
        assert_eq!(sseq.dimension_at(Pair(0, 2), 3).unwrap(), 1);
        assert_eq!(sseq.dimension_at(Pair(0, 2), 10).unwrap(), 1);
        assert_eq!(sseq.dimension_at(Pair(5, 5), 3).unwrap(), 0);
    }

    #[test]
    fn test_mutation_resets_pages() {
        let p = ValidPrime::new(2);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(1, 0), "x").unwrap();
        sseq.add_class(Pair(0, 2), "y").unwrap();
        sseq.add_partial_differential(
            PartialDefinition::full(Matrix::from_vec(p, &[vec![1]])),
            Pair(1, 0),
            Pair(0, 2),
            2,
        )
        .unwrap();
        sseq.advance_to_page(3).unwrap();

        // The new class is padded into the differential as a cycle
        assert_eq!(sseq.add_class(Pair(1, 0), "w").unwrap(), 1);
        assert_eq!(sseq.pages(), 1);
        let d = sseq.find_diffl_with_source(Pair(1, 0), 2).unwrap();
        assert_eq!(d.source_dimension(), 2);
        assert!(std::ptr::eq(
            d,
            sseq.find_diffl_with_target(Pair(0, 2), 2).unwrap()
        ));
        sseq.add_partial_differential(
            PartialDefinition::new(column(p, vec![0, 1]), column(p, vec![0])).unwrap(),
            Pair(1, 0),
            Pair(0, 2),
            2,
        )
        .unwrap();
        sseq.advance_to_page(3).unwrap();
        assert_eq!(sseq.dimension_at(Pair(1, 0), 3).unwrap(), 1);
        assert_eq!(sseq.dimension_at(Pair(0, 2), 3).unwrap(), 0);
    }

    #[test]
    fn test_inconsistent_differential_fails() {
        let p = ValidPrime::new(3);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(1, 0), "x").unwrap();
        sseq.add_class(Pair(0, 2), "y").unwrap();
        for value in [1, 2] {
            sseq.add_partial_differential(
                PartialDefinition::full(Matrix::from_vec(p, &[vec![value]])),
                Pair(1, 0),
                Pair(0, 2),
                2,
            )
            .unwrap();
        }
        assert_eq!(
            sseq.advance_to_page(3),
            Err(SseqError::Inconsistent {
                location: "(1, 0)".to_owned(),
                page: 2
            })
        );
        assert_eq!(sseq.pages(), 2);
    }

    #[test]
    fn test_rejected_differentials() {
        let p = ValidPrime::new(2);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(0, 2), "y").unwrap();
        let partial = PartialDefinition::full(Matrix::new(p, 1, 1));
        assert_eq!(
            sseq.add_partial_differential(partial.clone(), Pair(1, 0), Pair(0, 2), 2),
            Err(SseqError::MissingTerm("(1, 0)".to_owned()))
        );
        sseq.add_class(Pair(1, 0), "x").unwrap();
        assert!(matches!(
            sseq.add_partial_differential(partial, Pair(1, 0), Pair(0, 2), 3),
            Err(SseqError::InvariantViolation { .. })
        ));
        // A differential into an empty location has no rows
        assert!(sseq
            .add_partial_differential(
                PartialDefinition::full(Matrix::new(p, 0, 1)),
                Pair(0, 2),
                Pair(-1, 4),
                2
            )
            .unwrap());
    }

    #[test]
    fn test_zero_ranges() {
        let p = ValidPrime::new(2);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(0, 0), "1").unwrap();
        assert!(!sseq.is_in_zero_ranges(Pair(-1, 0)));
        sseq.set_zero_range(ZeroRange::left_of(0));
        sseq.set_zero_range(ZeroRange::left_of(0));
        assert_eq!(sseq.zero_ranges().len(), 1);
        assert!(sseq.is_in_zero_ranges(Pair(-1, 0)));
        sseq.set_zero_range(ZeroRange::Strict);
        assert!(sseq.is_in_zero_ranges(Pair(4, 4)));
        assert!(!sseq.is_in_zero_ranges(Pair(0, 0)));
    }

    #[test]
    fn test_products() {
        let p = ValidPrime::new(2);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(0, 0), "1").unwrap();
        sseq.add_class(Pair(1, 1), "h").unwrap();
        sseq.add_class(Pair(2, 2), "h^2").unwrap();
        sseq.set_unit(0).unwrap();
        assert!(sseq.set_unit(1).is_err());

        assert_eq!(sseq.product_matrix(Pair(1, 1), Pair(1, 1)).unwrap(), None);
        assert_eq!(
            sseq.product_matrix(Pair(1, 1), Pair(2, 2)).unwrap(),
            Some(Matrix::new(p, 0, 1))
        );
        assert_eq!(sseq.multiply_class(Pair(0, 0), 0, Pair(1, 1), 0).unwrap(), vec![1]);

        sseq.add_product_definition(
            PartialDefinition::full(Matrix::from_vec(p, &[vec![1]])),
            Pair(1, 1),
            Pair(1, 1),
        )
        .unwrap();
        assert_eq!(sseq.multiply_class(Pair(1, 1), 0, Pair(1, 1), 0).unwrap(), vec![1]);
        assert_eq!(
            sseq.add_product_definition(
                PartialDefinition::full(Matrix::new(p, 1, 1)),
                Pair(1, 1),
                Pair(3, 3)
            ),
            Err(SseqError::MissingTerm("(3, 3)".to_owned()))
        );
    }

    #[test]
    fn test_differential_matrix() {
        let p = ValidPrime::new(3);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(1, 0), "x0").unwrap();
        sseq.add_class(Pair(1, 0), "x1").unwrap();
        sseq.add_class(Pair(0, 2), "y").unwrap();
        sseq.add_class(Pair(2, 0), "z").unwrap();

        let undefined = |location: Pair| SseqError::UndefinedDifferential {
            location: location.to_string(),
            page: 2,
        };
        assert_eq!(sseq.differential_matrix(Pair(1, 0), 2), Err(undefined(Pair(1, 0))));
        // Nothing lives in (1, 2)
        assert_eq!(
            sseq.differential_matrix(Pair(2, 0), 2).unwrap(),
            Matrix::new(p, 0, 1)
        );
        assert_eq!(
            sseq.differential_matrix(Pair(3, 0), 2),
            Err(SseqError::MissingTerm("(3, 0)".to_owned()))
        );

        // Known on x0 only
        sseq.add_partial_differential(
            PartialDefinition::new(column(p, vec![1, 0]), Matrix::from_vec(p, &[vec![2]]))
                .unwrap(),
            Pair(1, 0),
            Pair(0, 2),
            2,
        )
        .unwrap();
        assert_eq!(sseq.differential_matrix(Pair(1, 0), 2), Err(undefined(Pair(1, 0))));

        sseq.add_partial_differential(
            PartialDefinition::new(column(p, vec![0, 1]), Matrix::from_vec(p, &[vec![1]]))
                .unwrap(),
            Pair(1, 0),
            Pair(0, 2),
            2,
        )
        .unwrap();
        assert_eq!(
            sseq.differential_matrix(Pair(1, 0), 2).unwrap().to_vec(),
            vec![vec![2, 1]]
        );

        sseq.add_partial_differential(
            PartialDefinition::new(column(p, vec![0, 1]), Matrix::from_vec(p, &[vec![0]]))
                .unwrap(),
            Pair(1, 0),
            Pair(0, 2),
            2,
        )
        .unwrap();
        assert_eq!(
            sseq.differential_matrix(Pair(1, 0), 2),
            Err(SseqError::Inconsistent {
                location: "(1, 0)".to_owned(),
                page: 2
            })
        );
    }

    #[test]
    fn test_differential_into_zero_range() {
        let p = ValidPrime::new(2);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(1, 0), "x").unwrap();
        sseq.add_class(Pair(0, 2), "y").unwrap();
        assert!(matches!(
            sseq.differential_matrix(Pair(1, 0), 2),
            Err(SseqError::UndefinedDifferential { .. })
        ));
        sseq.set_zero_range(ZeroRange::below(3));
        assert_eq!(
            sseq.differential_matrix(Pair(1, 0), 2).unwrap(),
            Matrix::new(p, 1, 1)
        );
    }

    #[test]
    fn test_class_index_out_of_range() {
        let p = ValidPrime::new(2);
        let mut sseq = SpectralSequence::new(p);
        sseq.add_class(Pair(0, 0), "1").unwrap();
        sseq.add_class(Pair(1, 1), "h").unwrap();
        sseq.set_unit(0).unwrap();
        assert_eq!(
            sseq.multiply_class(Pair(0, 0), 0, Pair(1, 1), 1),
            Err(SseqError::InvariantViolation {
                location: "(1, 1)".to_owned(),
                reason: "there is no class 1 in a term of size 1".to_owned(),
            })
        );
        // Locations without a term have no classes at all
        assert!(matches!(
            sseq.multiply_class(Pair(2, 0), 0, Pair(1, 1), 0),
            Err(SseqError::InvariantViolation { .. })
        ));

        let polynomial = SpectralSequence::<Pair>::polynomial(p);
        assert!(matches!(
            polynomial.multiply_class(Pair(0, 0), 1, Pair(0, 0), 0),
            Err(SseqError::InvariantViolation { .. })
        ));
    }
}
