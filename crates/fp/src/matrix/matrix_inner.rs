use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::MatrixError;
use crate::prime::ValidPrime;

/// A matrix with values in $\mathbb{F}_p$, stored densely in row-major order.
///
/// Matrices act on the *left* of column vectors, so a matrix of shape `height x width` is a map
/// $\mathbb{F}_p^{\mathrm{width}} \to \mathbb{F}_p^{\mathrm{height}}$. A subspace is described by
/// a matrix whose columns span it, e.g. [`Matrix::kernel`] and [`Matrix::image`] return such
/// matrices.
///
/// All the operations here are pure: they return new matrices and leave their inputs untouched.
/// The only mutating methods are the entry setters, which are meant for building matrices.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    p: ValidPrime,
    height: usize,
    width: usize,
    data: Vec<u32>,
}

/// The serialized form of a [`Matrix`], validated on the way back in.
#[derive(Deserialize)]
struct RawMatrix {
    p: ValidPrime,
    height: usize,
    width: usize,
    data: Vec<u32>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = String;

    fn try_from(raw: RawMatrix) -> Result<Self, String> {
        if raw.data.len() != raw.height * raw.width {
            return Err(format!(
                "expected {} entries for a {}x{} matrix, found {}",
                raw.height * raw.width,
                raw.height,
                raw.width,
                raw.data.len()
            ));
        }
        if let Some(&bad) = raw.data.iter().find(|&&x| x >= *raw.p) {
            return Err(format!("entry {bad} is not reduced mod {}", raw.p));
        }
        Ok(Self {
            p: raw.p,
            height: raw.height,
            width: raw.width,
            data: raw.data,
        })
    }
}

impl Matrix {
    /// Produces a new matrix over F_p with the specified shape, initialized to the 0 matrix.
    pub fn new(p: ValidPrime, height: usize, width: usize) -> Self {
        Self {
            p,
            height,
            width,
            data: vec![0; height * width],
        }
    }

    pub fn identity(p: ValidPrime, n: usize) -> Self {
        let mut result = Self::new(p, n, n);
        for i in 0..n {
            result.set_entry(i, i, 1);
        }
        result
    }

    /// Builds a matrix from its rows. Entries are reduced mod p.
    ///
    /// # Example
    /// ```
    /// # use fp::{matrix::Matrix, prime::ValidPrime};
    /// let m = Matrix::from_vec(ValidPrime::new(3), &[vec![1, 4, 2], vec![0, 3, 5]]);
    /// assert_eq!(m.height(), 2);
    /// assert_eq!(m.width(), 3);
    /// assert_eq!(m.to_vec(), vec![vec![1, 1, 2], vec![0, 0, 2]]);
    /// ```
    pub fn from_vec(p: ValidPrime, rows: &[Vec<u32>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut result = Self::new(p, rows.len(), width);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), width, "Row {i} has the wrong length");
            for (j, &c) in row.iter().enumerate() {
                result.set_entry(i, j, c % *p);
            }
        }
        result
    }

    /// Builds a `height x columns.len()` matrix from its columns. Entries are reduced mod p.
    pub fn from_columns(p: ValidPrime, height: usize, columns: &[Vec<u32>]) -> Self {
        let mut result = Self::new(p, height, columns.len());
        for (j, column) in columns.iter().enumerate() {
            assert_eq!(column.len(), height, "Column {j} has the wrong length");
            for (i, &c) in column.iter().enumerate() {
                result.set_entry(i, j, c % *p);
            }
        }
        result
    }

    /// The `end_dim x start_dim` matrix sending the `j`th basis vector to basis vector number
    /// `offset + j * spacing`. Indices that fall outside `0..end_dim` are dropped.
    pub fn evenly_spaced_inclusion(
        p: ValidPrime,
        start_dim: usize,
        end_dim: usize,
        offset: usize,
        spacing: usize,
    ) -> Self {
        let mut result = Self::new(p, end_dim, start_dim);
        for j in 0..start_dim {
            let i = offset + j * spacing;
            if i < end_dim {
                result.set_entry(i, j, 1);
            }
        }
        result
    }

    pub fn prime(&self) -> ValidPrime {
        self.p
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn entry(&self, row: usize, column: usize) -> u32 {
        debug_assert!(row < self.height && column < self.width);
        self.data[row * self.width + column]
    }

    /// Sets an entry. The value must already be reduced mod p.
    pub fn set_entry(&mut self, row: usize, column: usize, value: u32) {
        debug_assert!(value < *self.p);
        self.data[row * self.width + column] = value;
    }

    pub fn add_to_entry(&mut self, row: usize, column: usize, value: u32) {
        let idx = row * self.width + column;
        self.data[idx] = self.p.sum(self.data[idx], value);
    }

    pub fn row(&self, row: usize) -> &[u32] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    pub fn column(&self, column: usize) -> Vec<u32> {
        (0..self.height).map(|i| self.entry(i, column)).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = Vec<u32>> + '_ {
        (0..self.width).map(move |j| self.column(j))
    }

    /// The rows of the matrix as nested vectors.
    pub fn to_vec(&self) -> Vec<Vec<u32>> {
        (0..self.height).map(|i| self.row(i).to_vec()).collect()
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&x| x == 0)
    }

    pub fn is_column_zero(&self, column: usize) -> bool {
        (0..self.height).all(|i| self.entry(i, column) == 0)
    }

    /// The submatrix consisting of the columns in `start..end`.
    pub fn column_range(&self, start: usize, end: usize) -> Self {
        assert!(start <= end && end <= self.width);
        let mut result = Self::new(self.p, self.height, end - start);
        for i in 0..self.height {
            for j in start..end {
                result.set_entry(i, j - start, self.entry(i, j));
            }
        }
        result
    }

    /// The submatrix consisting of the rows in `start..end`.
    pub fn row_range(&self, start: usize, end: usize) -> Self {
        assert!(start <= end && end <= self.height);
        Self {
            p: self.p,
            height: end - start,
            width: self.width,
            data: self.data[start * self.width..end * self.width].to_vec(),
        }
    }

    /// The submatrix consisting of the given columns, in the order given.
    pub fn select_columns(&self, columns: &[usize]) -> Self {
        let mut result = Self::new(self.p, self.height, columns.len());
        for i in 0..self.height {
            for (new_j, &j) in columns.iter().enumerate() {
                result.set_entry(i, new_j, self.entry(i, j));
            }
        }
        result
    }

    pub(super) fn swap_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for i in 0..self.height {
            self.data.swap(i * self.width + a, i * self.width + b);
        }
    }

    pub(super) fn scale_column(&mut self, column: usize, c: u32) {
        for i in 0..self.height {
            let idx = i * self.width + column;
            self.data[idx] = self.p.product(self.data[idx], c);
        }
    }

    /// `self[.., target] += c * self[.., source]`
    pub(super) fn column_op(&mut self, target: usize, source: usize, c: u32) {
        debug_assert!(target != source);
        for i in 0..self.height {
            let s = self.data[i * self.width + source];
            if s != 0 {
                let idx = i * self.width + target;
                self.data[idx] = self.p.sum(self.data[idx], self.p.product(s, c));
            }
        }
    }

    fn check_prime(&self, other: &Self) -> Result<(), MatrixError> {
        if self.p == other.p {
            Ok(())
        } else {
            Err(MatrixError::PrimeMismatch(*self.p, *other.p))
        }
    }

    fn check_same_shape(&self, other: &Self, op: &'static str) -> Result<(), MatrixError> {
        self.check_prime(other)?;
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(MatrixError::DimensionMismatch {
                op,
                left: self.shape(),
                right: other.shape(),
            })
        }
    }

    pub(super) fn check_same_height(
        &self,
        other: &Self,
        op: &'static str,
    ) -> Result<(), MatrixError> {
        self.check_prime(other)?;
        if self.height == other.height {
            Ok(())
        } else {
            Err(MatrixError::DimensionMismatch {
                op,
                left: self.shape(),
                right: other.shape(),
            })
        }
    }

    pub fn transpose(&self) -> Self {
        let mut result = Self::new(self.p, self.width, self.height);
        for i in 0..self.height {
            for j in 0..self.width {
                result.set_entry(j, i, self.entry(i, j));
            }
        }
        result
    }

    /// The composite `self * right`, i.e. first apply `right`, then `self`.
    ///
    /// # Example
    /// ```
    /// # use fp::{matrix::{Matrix, MatrixError}, prime::ValidPrime};
    /// let p = ValidPrime::new(5);
    /// let a = Matrix::from_vec(p, &[vec![1, 2], vec![3, 4]]);
    /// let b = Matrix::from_vec(p, &[vec![0, 1], vec![1, 0]]);
    /// assert_eq!(a.multiply(&b)?.to_vec(), vec![vec![2, 1], vec![4, 3]]);
    /// assert!(a.multiply(&Matrix::new(p, 3, 1)).is_err());
    /// # Ok::<(), MatrixError>(())
    /// ```
    pub fn multiply(&self, right: &Self) -> Result<Self, MatrixError> {
        self.check_prime(right)?;
        if self.width != right.height {
            return Err(MatrixError::DimensionMismatch {
                op: "multiply",
                left: self.shape(),
                right: right.shape(),
            });
        }
        let p = self.p;
        let mut result = Self::new(p, self.height, right.width);
        for i in 0..self.height {
            for k in 0..self.width {
                let c = self.entry(i, k);
                if c == 0 {
                    continue;
                }
                for j in 0..right.width {
                    let r = right.entry(k, j);
                    if r != 0 {
                        result.add_to_entry(i, j, p.product(c, r));
                    }
                }
            }
        }
        Ok(result)
    }

    /// Applies the matrix to a column vector.
    pub fn act_on(&self, vector: &[u32]) -> Result<Vec<u32>, MatrixError> {
        if vector.len() != self.width {
            return Err(MatrixError::DimensionMismatch {
                op: "act_on",
                left: self.shape(),
                right: (vector.len(), 1),
            });
        }
        Ok((0..self.height)
            .map(|i| {
                self.row(i)
                    .iter()
                    .zip(vector)
                    .fold(0, |acc, (&a, &b)| self.p.sum(acc, self.p.product(a, b)))
            })
            .collect())
    }

    pub fn scale(&self, scalar: u32) -> Self {
        let c = scalar % *self.p;
        Self {
            p: self.p,
            height: self.height,
            width: self.width,
            data: self.data.iter().map(|&x| self.p.product(x, c)).collect(),
        }
    }

    pub fn sum(&self, other: &Self) -> Result<Self, MatrixError> {
        self.check_same_shape(other, "sum")?;
        Ok(Self {
            p: self.p,
            height: self.height,
            width: self.width,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| self.p.sum(a, b))
                .collect(),
        })
    }

    /// The entrywise product.
    pub fn hadamard_product(&self, other: &Self) -> Result<Self, MatrixError> {
        self.check_same_shape(other, "hadamard_product")?;
        Ok(Self {
            p: self.p,
            height: self.height,
            width: self.width,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| self.p.product(a, b))
                .collect(),
        })
    }

    /// The block diagonal matrix with blocks `self` and `other`.
    pub fn direct_sum(&self, other: &Self) -> Result<Self, MatrixError> {
        self.check_prime(other)?;
        let mut result = Self::new(
            self.p,
            self.height + other.height,
            self.width + other.width,
        );
        for i in 0..self.height {
            for j in 0..self.width {
                result.set_entry(i, j, self.entry(i, j));
            }
        }
        for i in 0..other.height {
            for j in 0..other.width {
                result.set_entry(self.height + i, self.width + j, other.entry(i, j));
            }
        }
        Ok(result)
    }

    /// The matrix `[self | other]`, i.e. the map out of a direct sum into a common target.
    pub fn direct_sum_common_target(&self, other: &Self) -> Result<Self, MatrixError> {
        self.check_same_height(other, "direct_sum_common_target")?;
        let width = self.width + other.width;
        let mut result = Self::new(self.p, self.height, width);
        for i in 0..self.height {
            result.data[i * width..i * width + self.width].copy_from_slice(self.row(i));
            result.data[i * width + self.width..(i + 1) * width].copy_from_slice(other.row(i));
        }
        Ok(result)
    }

    /// The Kronecker product. The basis of the tensor product of the sources (resp. targets) is
    /// ordered so that `e_i ⊗ e_j` has index `i * other.width() + j`
    /// (resp. `i * other.height() + j`).
    pub fn tensor(&self, other: &Self) -> Result<Self, MatrixError> {
        self.check_prime(other)?;
        let mut result = Self::new(
            self.p,
            self.height * other.height,
            self.width * other.width,
        );
        for (i1, j1) in (0..self.height).cartesian_product(0..self.width) {
            let a = self.entry(i1, j1);
            if a == 0 {
                continue;
            }
            for (i2, j2) in (0..other.height).cartesian_product(0..other.width) {
                let b = other.entry(i2, j2);
                if b != 0 {
                    result.set_entry(
                        i1 * other.height + i2,
                        j1 * other.width + j2,
                        self.p.product(a, b),
                    );
                }
            }
        }
        Ok(result)
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.height == 0 {
            return write!(f, "[]");
        }
        write!(f, "[")?;
        for i in 0..self.height {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "\n    [{}]", self.row(i).iter().join(", "))?;
        }
        write!(f, "\n]")
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Matrix<{}>{}", self.p, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn test_display() {
        let p = ValidPrime::new(3);
        let m = Matrix::from_vec(p, &[vec![1, 0, 2], vec![0, 1, 1]]);
        expect![[r#"
            [
                [1, 0, 2],
                [0, 1, 1]
            ]"#]]
        .assert_eq(&m.to_string());
        expect!["[]"].assert_eq(&Matrix::new(p, 0, 4).to_string());
        expect![[r#"
            [
                [],
                []
            ]"#]]
        .assert_eq(&Matrix::new(p, 2, 0).to_string());
    }

    #[test]
    fn test_shape_errors() {
        let p = ValidPrime::new(2);
        let a = Matrix::new(p, 2, 3);
        let b = Matrix::new(p, 3, 2);
        assert_eq!(
            a.sum(&b),
            Err(MatrixError::DimensionMismatch {
                op: "sum",
                left: (2, 3),
                right: (3, 2)
            })
        );
        assert!(a.hadamard_product(&b).is_err());
        assert!(a.direct_sum_common_target(&b).is_err());
        assert_eq!(
            a.multiply(&Matrix::new(ValidPrime::new(3), 3, 1)),
            Err(MatrixError::PrimeMismatch(2, 3))
        );
        assert_eq!(a.multiply(&b).unwrap().shape(), (2, 2));
    }

    #[test]
    fn test_tensor_indexing() {
        let p = ValidPrime::new(5);
        let a = Matrix::from_vec(p, &[vec![1, 2]]);
        let b = Matrix::from_vec(p, &[vec![3], vec![4]]);
        let t = a.tensor(&b).unwrap();
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.to_vec(), vec![vec![3, 1], vec![4, 3]]);
    }

    #[test]
    fn test_direct_sums() {
        let p = ValidPrime::new(7);
        let a = Matrix::from_vec(p, &[vec![1, 2]]);
        let b = Matrix::from_vec(p, &[vec![3]]);
        assert_eq!(
            a.direct_sum(&b).unwrap().to_vec(),
            vec![vec![1, 2, 0], vec![0, 0, 3]]
        );
        assert_eq!(
            a.direct_sum_common_target(&b).unwrap().to_vec(),
            vec![vec![1, 2, 3]]
        );
    }

    #[test]
    fn test_evenly_spaced_inclusion() {
        let p = ValidPrime::new(2);
        let m = Matrix::evenly_spaced_inclusion(p, 3, 6, 1, 2);
        assert_eq!(
            m.columns().collect::<Vec<_>>(),
            vec![
                vec![0, 1, 0, 0, 0, 0],
                vec![0, 0, 0, 1, 0, 0],
                vec![0, 0, 0, 0, 0, 1]
            ]
        );
    }

    #[test]
    fn test_serde_validation() {
        let p = ValidPrime::new(3);
        let m = Matrix::from_vec(p, &[vec![1, 2], vec![0, 1]]);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(serde_json::from_str::<Matrix>(&json).unwrap(), m);
        assert!(
            serde_json::from_str::<Matrix>(r#"{"p":3,"height":1,"width":2,"data":[1]}"#).is_err()
        );
        assert!(
            serde_json::from_str::<Matrix>(r#"{"p":3,"height":1,"width":1,"data":[3]}"#).is_err()
        );
    }
}
