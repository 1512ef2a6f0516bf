use std::{cell::OnceCell, collections::BTreeMap};

use fp::{
    matrix::{assemble_presentation, Assembly, Matrix, MatrixError, PartialDefinition},
    prime::ValidPrime,
};
use serde::{Deserialize, Serialize};

use crate::{
    persist::{self, Keyed},
    Location, SseqError,
};

/// The dimensions of the two factors and of the target of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductShape {
    pub left: usize,
    pub right: usize,
    pub target: usize,
}

impl ProductShape {
    pub fn new(left: usize, right: usize, target: usize) -> Self {
        Self {
            left,
            right,
            target,
        }
    }

    pub fn source(&self) -> usize {
        self.left * self.right
    }

    fn swapped(self) -> Self {
        Self::new(self.right, self.left, self.target)
    }
}

pub(crate) fn check_class_index<L: Location>(
    location: L,
    index: usize,
    size: usize,
) -> Result<(), SseqError> {
    if index >= size {
        return Err(SseqError::InvariantViolation {
            location: location.to_string(),
            reason: format!("there is no class {index} in a term of size {size}"),
        });
    }
    Ok(())
}

/// The permutation `V ⊗ W -> W ⊗ V`, where `dim V = left` and `dim W = right`.
pub(crate) fn swap_factors(p: ValidPrime, left: usize, right: usize) -> Matrix {
    let mut result = Matrix::new(p, left * right, left * right);
    for i in 0..left {
        for j in 0..right {
            result.set_entry(j * left + i, i * right + j, 1);
        }
    }
    result
}

/// The inclusion of `V ⊗ W` into `V' ⊗ W'` after basis elements were appended to `V` and `W`.
pub(crate) fn widen_tensor(p: ValidPrime, old: (usize, usize), new: (usize, usize)) -> Matrix {
    let mut result = Matrix::new(p, new.0 * new.1, old.0 * old.1);
    for i in 0..old.0 {
        for j in 0..old.1 {
            result.set_entry(i * new.1 + j, i * old.1 + j, 1);
        }
    }
    result
}

/// The product map $E(l) \otimes E(r) \to E(l + r)$ for one pair of locations, known through
/// partial definitions. The source basis of `x_i ⊗ y_j` has index `i * right_dimension + j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MultiplicationEntry<L: Location> {
    left: L,
    right: L,
    prime: ValidPrime,
    left_dimension: usize,
    right_dimension: usize,
    target_dimension: usize,
    partial_definitions: Vec<PartialDefinition>,
    #[serde(skip)]
    presentation: OnceCell<Assembly>,
}

impl<L: Location> Keyed for MultiplicationEntry<L> {
    type Key = (L, L);

    fn key(&self) -> (L, L) {
        (self.left, self.right)
    }
}

impl<L: Location> MultiplicationEntry<L> {
    fn new(prime: ValidPrime, left: L, right: L, shape: ProductShape) -> Self {
        Self {
            left,
            right,
            prime,
            left_dimension: shape.left,
            right_dimension: shape.right,
            target_dimension: shape.target,
            partial_definitions: Vec::new(),
            presentation: OnceCell::new(),
        }
    }

    pub fn left(&self) -> L {
        self.left
    }

    pub fn right(&self) -> L {
        self.right
    }

    pub fn shape(&self) -> ProductShape {
        ProductShape::new(
            self.left_dimension,
            self.right_dimension,
            self.target_dimension,
        )
    }

    pub fn partial_definitions(&self) -> &[PartialDefinition] {
        &self.partial_definitions
    }

    fn add_partial_definition(&mut self, partial: PartialDefinition) -> bool {
        if self.partial_definitions.contains(&partial) {
            return false;
        }
        self.partial_definitions.push(partial);
        self.presentation.take();
        true
    }

    /// Assembles the recorded partial definitions together with the ones implied by the unit,
    /// which the table passes in as `implied`. The unit only changes through
    /// [`MultiplicationTable::set_unit`], which clears the cache.
    fn assemble(&self, implied: &[PartialDefinition]) -> Result<&Assembly, MatrixError> {
        if let Some(assembly) = self.presentation.get() {
            return Ok(assembly);
        }
        let mut partials = self.partial_definitions.clone();
        partials.extend_from_slice(implied);
        let assembly = assemble_presentation(
            self.prime,
            &partials,
            self.shape().source(),
            self.target_dimension,
        )?;
        Ok(self.presentation.get_or_init(|| assembly))
    }

    pub(crate) fn resize(&mut self, shape: ProductShape) -> Result<(), SseqError> {
        let widen = widen_tensor(
            self.prime,
            (self.left_dimension, self.right_dimension),
            (shape.left, shape.right),
        );
        for partial in &mut self.partial_definitions {
            let padded = partial.pad(partial.source_dimension(), shape.target)?;
            let inclusion = widen.multiply(padded.inclusion())?;
            *partial = rebuild(&padded, inclusion, padded.action().clone())?;
        }
        self.left_dimension = shape.left;
        self.right_dimension = shape.right;
        self.target_dimension = shape.target;
        self.presentation.take();
        Ok(())
    }
}

/// Products between pairs of locations.
///
/// Entries are stored under the ordered pair `(l1, l2)` with `l1 <= l2`. The product in the other
/// order is recovered by graded commutativity, $xy = (-1)^{|x||y|} yx$, with the sign computed
/// from the Koszul degrees. The unit class, if set, lives at [`Location::identity`], and products
/// with it are known without being recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MultiplicationTable<L: Location> {
    prime: ValidPrime,
    #[serde(with = "persist::values")]
    entries: BTreeMap<(L, L), MultiplicationEntry<L>>,
    unit: Option<usize>,
}

impl<L: Location> MultiplicationTable<L> {
    pub fn new(prime: ValidPrime) -> Self {
        Self {
            prime,
            entries: BTreeMap::new(),
            unit: None,
        }
    }

    /// The index of the unit class within the term at the identity.
    pub fn unit(&self) -> Option<usize> {
        self.unit
    }

    pub fn set_unit(&mut self, unit: Option<usize>) {
        self.unit = unit;
        for entry in self.entries.values_mut() {
            entry.presentation.take();
        }
    }

    pub fn entry(&self, left: L, right: L) -> Option<&MultiplicationEntry<L>> {
        self.entries.get(&(left.min(right), left.max(right)))
    }

    pub fn entries(&self) -> impl Iterator<Item = &MultiplicationEntry<L>> {
        self.entries.values()
    }

    fn sign(&self, left: L, right: L) -> u32 {
        self.prime
            .minus_one_to_the_n(left.koszul_degree() * right.koszul_degree())
    }

    /// Records a partial definition of the product `E(left) ⊗ E(right) -> E(left + right)`.
    ///
    /// # Returns
    /// Whether the partial definition is new.
    pub fn add_partial_definition(
        &mut self,
        left: L,
        right: L,
        shape: ProductShape,
        partial: PartialDefinition,
    ) -> Result<bool, SseqError> {
        if partial.source_dimension() != shape.source()
            || partial.target_dimension() != shape.target
        {
            return Err(MatrixError::DimensionMismatch {
                op: "add_partial_definition",
                left: (shape.target, shape.source()),
                right: (partial.target_dimension(), partial.source_dimension()),
            }
            .into());
        }
        let (key, shape, partial) = if left <= right {
            ((left, right), shape, partial)
        } else {
            let swap = swap_factors(self.prime, shape.left, shape.right);
            let swapped = rebuild(
                &partial,
                swap.multiply(partial.inclusion())?,
                partial.action().scale(self.sign(left, right)),
            )?;
            ((right, left), shape.swapped(), swapped)
        };
        let prime = self.prime;
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| MultiplicationEntry::new(prime, key.0, key.1, shape));
        if entry.shape() != shape {
            return Err(MatrixError::DimensionMismatch {
                op: "add_partial_definition",
                left: (entry.target_dimension, entry.shape().source()),
                right: (shape.target, shape.source()),
            }
            .into());
        }
        Ok(entry.add_partial_definition(partial))
    }

    /// Partial definitions coming from the unit, for the ordered pair `(left, right)`.
    fn unit_partials(&self, left: L, right: L, shape: ProductShape) -> Vec<PartialDefinition> {
        let Some(unit) = self.unit else {
            return Vec::new();
        };
        let p = self.prime;
        let identity = L::identity();
        let mut inclusions = Vec::new();
        if left == identity && unit < shape.left && shape.right == shape.target {
            inclusions.push((
                Matrix::evenly_spaced_inclusion(p, shape.right, shape.source(), unit * shape.right, 1),
                shape.right,
            ));
        }
        if right == identity && unit < shape.right && shape.left == shape.target {
            inclusions.push((
                Matrix::evenly_spaced_inclusion(p, shape.left, shape.source(), unit, shape.right),
                shape.left,
            ));
        }
        inclusions
            .into_iter()
            .filter_map(|(inclusion, dim)| {
                PartialDefinition::automatic(inclusion, Matrix::identity(p, dim)).ok()
            })
            .collect()
    }

    /// All partial definitions for the ordered pair `(left, right)` with `left <= right`, and
    /// their assembly. Returns `None` if nothing is known.
    fn assemble_ordered(
        &self,
        left: L,
        right: L,
        shape: ProductShape,
    ) -> Result<Option<(Matrix, Assembly)>, SseqError> {
        let implied = self.unit_partials(left, right, shape);
        let mut domain = Matrix::new(self.prime, shape.source(), 0);
        for partial in implied.iter().chain(
            self.entries
                .get(&(left, right))
                .map_or(&[][..], |entry| entry.partial_definitions()),
        ) {
            domain = domain.direct_sum_common_target(partial.inclusion())?;
        }
        let assembly = match self.entries.get(&(left, right)) {
            Some(entry) => entry.assemble(&implied)?.clone(),
            None if implied.is_empty() => return Ok(None),
            None => assemble_presentation(self.prime, &implied, shape.source(), shape.target)?,
        };
        if assembly.is_inconsistent() {
            tracing::warn!(%left, %right, "inconsistent product");
        }
        Ok(Some((domain, assembly)))
    }

    /// The matrix of the product `E(left) ⊗ E(right) -> E(left + right)`, if the known partial
    /// definitions determine it. Products that are only partially known, or whose partial
    /// definitions conflict, are reported as unknown.
    pub fn get_matrix_for(
        &self,
        left: L,
        right: L,
        shape: ProductShape,
    ) -> Result<Option<Matrix>, SseqError> {
        let ordered_shape = if left <= right { shape } else { shape.swapped() };
        let Some((_, assembly)) =
            self.assemble_ordered(left.min(right), left.max(right), ordered_shape)?
        else {
            return Ok(None);
        };
        if !assembly.is_well_defined() {
            return Ok(None);
        }
        if left <= right {
            return Ok(Some(assembly.presentation));
        }
        let swap = swap_factors(self.prime, shape.left, shape.right);
        Ok(Some(
            assembly
                .presentation
                .multiply(&swap)?
                .scale(self.sign(left, right)),
        ))
    }

    /// Like [`MultiplicationTable::get_matrix_for`], but only consults presentations that were
    /// already assembled.
    pub fn get_matrix_without_recomputing(&self, left: L, right: L) -> Option<Matrix> {
        let entry = self.entry(left, right)?;
        let assembly = entry.presentation.get()?;
        if !assembly.is_well_defined() {
            return None;
        }
        if left <= right {
            return Some(assembly.presentation.clone());
        }
        let swap = swap_factors(self.prime, entry.right_dimension, entry.left_dimension);
        assembly
            .presentation
            .multiply(&swap)
            .ok()
            .map(|m| m.scale(self.sign(left, right)))
    }

    /// The product of the `left_index`th basis element at `left` with the `right_index`th basis
    /// element at `right`. This only requires the product to be known on this pair of classes.
    pub fn multiply_class(
        &self,
        left: L,
        left_index: usize,
        right: L,
        right_index: usize,
        shape: ProductShape,
    ) -> Result<Vec<u32>, SseqError> {
        let undefined = || SseqError::UndefinedProduct {
            left: left.to_string(),
            right: right.to_string(),
        };
        check_class_index(left, left_index, shape.left)?;
        check_class_index(right, right_index, shape.right)?;
        let (ordered_shape, index, sign) = if left <= right {
            (shape, left_index * shape.right + right_index, 1)
        } else {
            (
                shape.swapped(),
                right_index * shape.left + left_index,
                self.sign(left, right),
            )
        };
        let (domain, assembly) = self
            .assemble_ordered(left.min(right), left.max(right), ordered_shape)?
            .ok_or_else(undefined)?;
        if assembly.is_inconsistent() {
            return Err(undefined());
        }
        let mut basis_vector = vec![0; ordered_shape.source()];
        basis_vector[index] = 1;
        if !domain.spans(&basis_vector)? {
            return Err(undefined());
        }
        Ok(assembly
            .presentation
            .column(index)
            .into_iter()
            .map(|c| self.prime.product(c, sign))
            .collect())
    }

    pub(crate) fn remove_entries_touching(&mut self, location: L) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|&(left, right), _| left != location && right != location && left + right != location);
        before - self.entries.len()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut MultiplicationEntry<L>> {
        self.entries.values_mut()
    }
}

/// A partial definition with new matrices, keeping the provenance of `partial`.
fn rebuild(
    partial: &PartialDefinition,
    inclusion: Matrix,
    action: Matrix,
) -> Result<PartialDefinition, MatrixError> {
    if partial.automatically_generated() {
        PartialDefinition::automatic(inclusion, action)
    } else {
        PartialDefinition::new(inclusion, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pair;

    #[test]
    fn test_swap_factors() {
        let p = ValidPrime::new(2);
        let swap = swap_factors(p, 2, 3);
        // e_1 ⊗ f_2 has index 1 * 3 + 2 = 5 and f_2 ⊗ e_1 has index 2 * 2 + 1 = 5
        assert_eq!(swap.column(5)[5], 1);
        // e_0 ⊗ f_1 has index 1 and f_1 ⊗ e_0 has index 2
        assert_eq!(swap.column(1)[2], 1);
        assert_eq!(
            swap.multiply(&swap_factors(p, 3, 2)).unwrap(),
            Matrix::identity(p, 6)
        );
    }

    #[test]
    fn test_graded_commutativity() {
        let p = ValidPrime::new(3);
        let mut table = MultiplicationTable::new(p);
        let x = Pair(1, 0);
        let y = Pair(1, 1);
        let shape = ProductShape::new(1, 1, 1);
        let yx = PartialDefinition::full(Matrix::from_vec(p, &[vec![1]]));
        table.add_partial_definition(y, x, shape, yx).unwrap();
        assert!(table.get_matrix_without_recomputing(x, y).is_none());
        // Both generators have odd degree, so xy = -yx
        assert_eq!(
            table.get_matrix_for(x, y, shape).unwrap().unwrap().to_vec(),
            vec![vec![2]]
        );
        assert_eq!(
            table.get_matrix_without_recomputing(x, y).unwrap().to_vec(),
            vec![vec![2]]
        );
        assert_eq!(table.multiply_class(y, 0, x, 0, shape).unwrap(), vec![1]);
        assert_eq!(table.multiply_class(x, 0, y, 0, shape).unwrap(), vec![2]);
        assert!(matches!(
            table.multiply_class(x, 1, y, 0, shape),
            Err(SseqError::InvariantViolation { location, .. }) if location == "(1, 0)"
        ));
        assert!(matches!(
            table.multiply_class(x, 0, y, 3, shape),
            Err(SseqError::InvariantViolation { location, .. }) if location == "(1, 1)"
        ));
    }

    #[test]
    fn test_unit_and_unknown_products() {
        let p = ValidPrime::new(2);
        let mut table = MultiplicationTable::<Pair>::new(p);
        let x = Pair(1, 1);
        assert_eq!(
            table.multiply_class(x, 0, x, 0, ProductShape::new(1, 1, 1)),
            Err(SseqError::UndefinedProduct {
                left: "(1, 1)".to_owned(),
                right: "(1, 1)".to_owned()
            })
        );

        // The unit is the second class at the identity, which also holds another class.
        table.set_unit(Some(1));
        let shape = ProductShape::new(2, 3, 3);
        assert_eq!(table.get_matrix_for(Pair(0, 0), x, shape).unwrap(), None);
        assert_eq!(
            table.multiply_class(Pair(0, 0), 1, x, 2, shape).unwrap(),
            vec![0, 0, 1]
        );
        table
            .add_partial_definition(
                Pair(0, 0),
                x,
                shape,
                PartialDefinition::new(
                    Matrix::evenly_spaced_inclusion(p, 3, 6, 0, 1),
                    Matrix::new(p, 3, 3),
                )
                .unwrap(),
            )
            .unwrap();
        let right_shape = ProductShape::new(3, 2, 3);
        let product = table.get_matrix_for(x, Pair(0, 0), right_shape).unwrap().unwrap();
        assert_eq!(product.column(2 * 2 + 1), vec![0, 0, 1]);
        assert!(product.column(2 * 2).iter().all(|&c| c == 0));
    }
}
