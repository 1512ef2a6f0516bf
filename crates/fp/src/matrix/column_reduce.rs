use super::{Matrix, MatrixError};

/// The result of column reducing a matrix `A`.
///
/// # Fields
///  * `reduced` - `A` in reduced column echelon form. The first `rank` columns are the pivot
///  columns and the rest are zero.
///  * `transform` - The invertible `width x width` matrix of column operations, so that
///  `A * transform = reduced`.
///  * `pivot_rows` - `pivot_rows[j]` is the row of the pivot in column `j`. This is strictly
///  increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReduction {
    pub reduced: Matrix,
    pub transform: Matrix,
    pub pivot_rows: Vec<usize>,
}

impl ColumnReduction {
    pub fn rank(&self) -> usize {
        self.pivot_rows.len()
    }
}

impl Matrix {
    /// Perform Gaussian elimination on columns, recording the column operations performed.
    ///
    /// Rows are scanned from top to bottom, and the pivot of each row is taken from the first
    /// remaining column with a nonzero entry in that row. Every choice made downstream (kernel
    /// bases, right inverses) is determined by this rule.
    pub fn column_reduction(&self) -> ColumnReduction {
        let p = self.prime();
        let width = self.width();
        let mut reduced = self.clone();
        let mut transform = Self::identity(p, width);
        let mut pivot_rows = Vec::new();

        for row in 0..self.height() {
            let rank = pivot_rows.len();
            if rank == width {
                break;
            }
            let Some(col) = (rank..width).find(|&c| reduced.entry(row, c) != 0) else {
                continue;
            };
            reduced.swap_columns(rank, col);
            transform.swap_columns(rank, col);

            let c = p.inverse(reduced.entry(row, rank));
            reduced.scale_column(rank, c);
            transform.scale_column(rank, c);

            for other in 0..width {
                if other == rank {
                    continue;
                }
                let c = reduced.entry(row, other);
                if c != 0 {
                    reduced.column_op(other, rank, p.negate(c));
                    transform.column_op(other, rank, p.negate(c));
                }
            }
            pivot_rows.push(row);
        }
        ColumnReduction {
            reduced,
            transform,
            pivot_rows,
        }
    }

    /// Returns the reduced column echelon form.
    ///
    /// # Example
    /// ```
    /// # use fp::{matrix::Matrix, prime::ValidPrime};
    /// let p = ValidPrime::new(7);
    /// let m = Matrix::from_vec(p, &[vec![1, 0], vec![3, 3], vec![6, 4]]);
    /// let result = Matrix::from_vec(p, &[vec![1, 0], vec![0, 1], vec![2, 6]]);
    /// assert_eq!(m.column_reduce(), result);
    /// ```
    pub fn column_reduce(&self) -> Self {
        self.column_reduction().reduced
    }

    pub fn rank(&self) -> usize {
        self.column_reduction().rank()
    }

    /// A basis of the null space, as the columns of a `width x (width - rank)` matrix.
    pub fn kernel(&self) -> Self {
        let reduction = self.column_reduction();
        reduction
            .transform
            .column_range(reduction.rank(), self.width())
    }

    /// A basis of the column space, as the columns of a `height x rank` matrix. The basis is in
    /// reduced column echelon form, so it only depends on the subspace.
    pub fn image(&self) -> Self {
        let reduction = self.column_reduction();
        reduction.reduced.column_range(0, reduction.rank())
    }

    pub fn invert(&self) -> Result<Self, MatrixError> {
        if self.height() != self.width() {
            return Err(MatrixError::NotInvertible);
        }
        let reduction = self.column_reduction();
        if reduction.rank() != self.width() {
            return Err(MatrixError::NotInvertible);
        }
        Ok(reduction.transform)
    }

    /// Produces a right inverse to a surjective map.
    ///
    /// A right inverse is not unique in general. The one returned consists of the first `height`
    /// columns of the transform in [`Matrix::column_reduction`], so the choice follows the pivot
    /// rule described there and is stable across calls.
    pub fn invert_onto_map(&self) -> Result<Self, MatrixError> {
        let reduction = self.column_reduction();
        if reduction.rank() != self.height() {
            return Err(MatrixError::NotInvertible);
        }
        Ok(reduction.transform.column_range(0, self.height()))
    }

    /// Finds `x` with `self * x = vector`, if there is one.
    pub fn solve(&self, vector: &[u32]) -> Result<Option<Vec<u32>>, MatrixError> {
        if vector.len() != self.height() {
            return Err(MatrixError::DimensionMismatch {
                op: "solve",
                left: self.shape(),
                right: (vector.len(), 1),
            });
        }
        let reduction = self.column_reduction();
        let coefficients: Vec<u32> = reduction.pivot_rows.iter().map(|&r| vector[r]).collect();
        let basis = reduction.reduced.column_range(0, reduction.rank());
        if basis.act_on(&coefficients)? != vector {
            return Ok(None);
        }
        let x = reduction
            .transform
            .column_range(0, reduction.rank())
            .act_on(&coefficients)?;
        Ok(Some(x))
    }

    /// Whether `vector` lies in the column space.
    pub fn spans(&self, vector: &[u32]) -> Result<bool, MatrixError> {
        Ok(self.solve(vector)?.is_some())
    }

    /// Whether the column space of `self` is contained in the column space of `other`.
    pub fn image_contained_in(&self, other: &Self) -> Result<bool, MatrixError> {
        let combined = other.direct_sum_common_target(self)?;
        Ok(combined.rank() == other.rank())
    }

    /// Computes the intersection of the column spaces of `left` and `right`.
    ///
    /// Returns inclusions `(l, r)` with `left * l = right * r`, whose common image is
    /// `image(left) ∩ image(right)`. When `left` and `right` are injective, the columns of `l`
    /// and `r` are linearly independent.
    pub fn form_intersection(left: &Self, right: &Self) -> Result<(Self, Self), MatrixError> {
        left.check_same_height(right, "form_intersection")?;
        let combined = left.direct_sum_common_target(&right.scale(*left.prime() - 1))?;
        let kernel = combined.kernel();
        Ok((
            kernel.row_range(0, left.width()),
            kernel.row_range(left.width(), combined.width()),
        ))
    }

    /// For each column of `z`, the smallest positive multiple lying in the column space of `b`.
    /// Over a field this is `1` for columns already in the span and `p` otherwise.
    pub fn find_orders_of(b: &Self, z: &Self) -> Result<Vec<u32>, MatrixError> {
        b.check_same_height(z, "find_orders_of")?;
        let base_rank = b.rank();
        Ok(z.columns()
            .map(|column| {
                let column = Self::from_columns(b.prime(), b.height(), &[column]);
                match b.direct_sum_common_target(&column) {
                    Ok(m) if m.rank() == base_rank => 1,
                    _ => *b.prime(),
                }
            })
            .collect())
    }

    /// The rank of `map` composed with the projection onto the quotient of its target by the
    /// column space of `inclusion`.
    pub fn rank_of_map_into_quotient(map: &Self, inclusion: &Self) -> Result<usize, MatrixError> {
        map.check_same_height(inclusion, "rank_of_map_into_quotient")?;
        let combined = inclusion.direct_sum_common_target(map)?;
        Ok(combined.rank() - inclusion.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prime::ValidPrime;
    use rstest::rstest;

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn test_kernel_image(#[case] p: u32) {
        let p = ValidPrime::new(p);
        let m = Matrix::from_vec(
            p,
            &[vec![1, 1, 0, 1], vec![0, 1, 1, 1], vec![1, 2, 1, 2]],
        );
        let kernel = m.kernel();
        let image = m.image();
        assert_eq!(kernel.width() + image.width(), m.width());
        assert!(m.multiply(&kernel).unwrap().is_zero());
        assert_eq!(image.rank(), image.width());
        assert!(image.image_contained_in(&m).unwrap());
        assert!(m.image_contained_in(&image).unwrap());
    }

    #[test]
    fn test_column_reduce_pivots() {
        let p = ValidPrime::new(3);
        let m = Matrix::from_vec(p, &[vec![0, 0, 0], vec![0, 2, 1], vec![1, 1, 0]]);
        let reduction = m.column_reduction();
        assert_eq!(reduction.pivot_rows, vec![1, 2]);
        assert_eq!(
            reduction.reduced.to_vec(),
            vec![vec![0, 0, 0], vec![1, 0, 0], vec![0, 1, 0]]
        );
        assert_eq!(m.multiply(&reduction.transform).unwrap(), reduction.reduced);
    }

    #[test]
    fn test_invert() {
        let p = ValidPrime::new(5);
        let m = Matrix::from_vec(p, &[vec![2, 1], vec![1, 1]]);
        let inverse = m.invert().unwrap();
        assert_eq!(m.multiply(&inverse).unwrap(), Matrix::identity(p, 2));
        assert_eq!(
            Matrix::from_vec(p, &[vec![1, 2], vec![2, 4]]).invert(),
            Err(MatrixError::NotInvertible)
        );
        assert_eq!(
            Matrix::new(p, 2, 3).invert(),
            Err(MatrixError::NotInvertible)
        );
    }

    #[test]
    fn test_invert_onto_map() {
        // Any right inverse is acceptable, so we only check the defining property and that
        // repeated calls agree.
        let p = ValidPrime::new(3);
        let m = Matrix::from_vec(p, &[vec![1, 2, 0, 1], vec![0, 1, 1, 2]]);
        let right_inverse = m.invert_onto_map().unwrap();
        assert_eq!(right_inverse.shape(), (4, 2));
        assert_eq!(m.multiply(&right_inverse).unwrap(), Matrix::identity(p, 2));
        assert_eq!(m.invert_onto_map().unwrap(), right_inverse);

        let not_onto = Matrix::from_vec(p, &[vec![1, 2], vec![2, 1]]);
        assert_eq!(not_onto.invert_onto_map(), Err(MatrixError::NotInvertible));
    }

    #[test]
    fn test_form_intersection() {
        let p = ValidPrime::new(2);
        // span(e0, e1) and span(e1, e2) in F_2^3
        let left = Matrix::from_vec(p, &[vec![1, 0], vec![0, 1], vec![0, 0]]);
        let right = Matrix::from_vec(p, &[vec![0, 0], vec![1, 0], vec![0, 1]]);
        let (l, r) = Matrix::form_intersection(&left, &right).unwrap();
        assert_eq!(l.width(), 1);
        let from_left = left.multiply(&l).unwrap();
        assert_eq!(from_left, right.multiply(&r).unwrap());
        assert_eq!(from_left.column(0), vec![0, 1, 0]);
    }

    #[test]
    fn test_solve() {
        let p = ValidPrime::new(7);
        let m = Matrix::from_vec(p, &[vec![1, 2], vec![3, 4], vec![5, 6]]);
        let target = m.act_on(&[2, 5]).unwrap();
        let x = m.solve(&target).unwrap().unwrap();
        assert_eq!(m.act_on(&x).unwrap(), target);
        assert_eq!(m.solve(&[1, 0, 0]).unwrap(), None);
    }

    #[test]
    fn test_orders_and_quotient_rank() {
        let p = ValidPrime::new(3);
        let b = Matrix::from_vec(p, &[vec![1], vec![0], vec![0]]);
        let z = Matrix::from_vec(p, &[vec![2, 0, 1], vec![0, 1, 1], vec![0, 0, 0]]);
        assert_eq!(Matrix::find_orders_of(&b, &z).unwrap(), vec![1, 3, 3]);
        assert_eq!(Matrix::rank_of_map_into_quotient(&z, &b).unwrap(), 1);
    }

    #[test]
    fn test_empty_matrices() {
        let p = ValidPrime::new(2);
        let m = Matrix::new(p, 3, 0);
        assert_eq!(m.rank(), 0);
        assert_eq!(m.kernel().shape(), (0, 0));
        assert_eq!(m.image().shape(), (3, 0));
        assert_eq!(Matrix::new(p, 0, 0).invert().unwrap().shape(), (0, 0));
        assert_eq!(Matrix::new(p, 0, 2).kernel(), Matrix::identity(p, 2));
    }
}
