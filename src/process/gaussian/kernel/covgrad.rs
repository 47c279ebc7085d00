#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DMatrix;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Gradient of an `n x n` covariance matrix: one slice `dK/dtheta_k` per
/// free hyperparameter.
///
/// A kernel whose hyperparameters are all fixed has a gradient with no
/// slices.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct CovGrad {
    n: usize,
    slices: Vec<DMatrix<f64>>,
}

impl fmt::Display for CovGrad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.slices.iter().try_for_each(|s| write!(f, "{s}"))
    }
}

impl CovGrad {
    /// Create a new cov-grad with given slices
    pub fn new(slices: &[DMatrix<f64>]) -> Result<Self, CovGradError> {
        let shapes: Vec<(usize, usize)> =
            slices.iter().map(nalgebra::Matrix::shape).collect();

        match shapes.first() {
            None => Err(CovGradError::Empty),
            Some(&(n, m)) if n == m && shapes.iter().all(|s| *s == (n, m)) => {
                Ok(Self {
                    n,
                    slices: slices.to_vec(),
                })
            }
            Some(_) => Err(CovGradError::ShapeMismatch(shapes)),
        }
    }

    /// Create a new unchecked `CovGrad`
    ///
    /// # Panics
    /// If `slices` is empty.
    #[must_use]
    pub fn new_unchecked(slices: &[DMatrix<f64>]) -> Self {
        Self {
            n: slices[0].nrows(),
            slices: slices.to_vec(),
        }
    }

    /// Gradient of an `n x n` covariance with respect to no parameters
    #[must_use]
    pub fn empty(n: usize) -> Self {
        Self {
            n,
            slices: Vec::new(),
        }
    }

    /// A single slice equal to `slice`
    #[must_use]
    pub fn from_slice(slice: DMatrix<f64>) -> Self {
        Self {
            n: slice.nrows(),
            slices: vec![slice],
        }
    }

    /// Size of each (square) slice
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of slices, i.e. number of parameters
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        self.slices.len()
    }

    /// Iterate over the slices
    pub fn iter(&self) -> std::slice::Iter<'_, DMatrix<f64>> {
        self.slices.iter()
    }

    fn check_shape(&self, shape: (usize, usize)) -> Result<(), CovGradError> {
        if shape == (self.n, self.n) {
            Ok(())
        } else {
            Err(CovGradError::ShapeMismatch(vec![(self.n, self.n), shape]))
        }
    }

    /// Component wise multiplication
    pub fn component_mul(
        &self,
        other: &DMatrix<f64>,
    ) -> Result<Self, CovGradError> {
        self.check_shape(other.shape())?;
        let slices = self.slices.iter().map(|s| s.component_mul(other)).collect();
        Ok(Self { n: self.n, slices })
    }

    /// Check if this is relatively eq to another matrix
    #[must_use]
    pub fn relative_eq(&self, other: &CovGrad, rel: f64, abs: f64) -> bool {
        self.n == other.n
            && self.slices.len() == other.slices.len()
            && self
                .slices
                .iter()
                .zip(other.slices.iter())
                .all(|(a, b)| a.relative_eq(b, rel, abs))
    }

    /// Append the slices of another gradient
    pub fn concat_cols(&self, other: &Self) -> Result<Self, CovGradError> {
        self.check_shape((other.n, other.n))?;
        let slices = [self.slices.clone(), other.slices.clone()].concat();
        Ok(Self { n: self.n, slices })
    }

    /// Create a new cov-grad with all zeros
    #[must_use]
    pub fn zeros(n: usize, m: usize) -> Self {
        Self {
            n,
            slices: (0..m).map(|_| DMatrix::zeros(n, n)).collect(),
        }
    }

    /// Create a new `CovGrad` from a sequence of column slices
    pub fn from_column_slices(
        n: usize,
        m: usize,
        slice: &[f64],
    ) -> Result<Self, CovGradError> {
        if n * n * m == slice.len() {
            let slices = if n == 0 {
                vec![DMatrix::zeros(0, 0); m]
            } else {
                slice
                    .chunks_exact(n * n)
                    .map(|chunk| DMatrix::from_column_slice(n, n, chunk))
                    .collect()
            };
            Ok(Self { n, slices })
        } else {
            Err(CovGradError::ImproperSize(n * n * m, slice.len()))
        }
    }

    /// Create a new `CovGrad` from a sequence of row slices
    pub fn from_row_slices(
        n: usize,
        m: usize,
        slice: &[f64],
    ) -> Result<Self, CovGradError> {
        if n * n * m == slice.len() {
            let slices = if n == 0 {
                vec![DMatrix::zeros(0, 0); m]
            } else {
                slice
                    .chunks_exact(n * n)
                    .map(|chunk| DMatrix::from_row_slice(n, n, chunk))
                    .collect()
            };
            Ok(Self { n, slices })
        } else {
            Err(CovGradError::ImproperSize(n * n * m, slice.len()))
        }
    }
}

impl Index<usize> for CovGrad {
    type Output = DMatrix<f64>;

    fn index(&self, k: usize) -> &Self::Output {
        &self.slices[k]
    }
}

impl IndexMut<usize> for CovGrad {
    fn index_mut(&mut self, k: usize) -> &mut Self::Output {
        &mut self.slices[k]
    }
}

impl Index<(usize, usize, usize)> for CovGrad {
    type Output = f64;

    fn index(&self, (i, j, k): (usize, usize, usize)) -> &Self::Output {
        &self.slices[k][(i, j)]
    }
}

impl IndexMut<(usize, usize, usize)> for CovGrad {
    fn index_mut(
        &mut self,
        (i, j, k): (usize, usize, usize),
    ) -> &mut Self::Output {
        &mut self.slices[k][(i, j)]
    }
}

/// Error from constructing a `CovGrad`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum CovGradError {
    /// The shapes of the slices do not match
    ShapeMismatch(Vec<(usize, usize)>),
    /// `new` needs at least one slice to know the shape
    Empty,
    /// Improper number of points to construct a `CovGrad`
    ImproperSize(usize, usize),
}

impl std::error::Error for CovGradError {}

impl std::fmt::Display for CovGradError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CovGradError::ShapeMismatch(shapes) => write!(
                f,
                "Cannot create Covariance Gradient: Shape Mismatch: Shapes {shapes:?}"
            ),
            CovGradError::Empty => {
                write!(f, "Cannot infer the shape of an empty CovGrad")
            }
            CovGradError::ImproperSize(expected, given) => write!(
                f,
                "Cannot create Covariance Gradient with given shapes. Given: {given}, Expected: {expected}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_shapes() {
        assert_eq!(CovGrad::new(&[]), Err(CovGradError::Empty));
        assert_eq!(
            CovGrad::new(&[DMatrix::zeros(2, 2), DMatrix::zeros(3, 3)]),
            Err(CovGradError::ShapeMismatch(vec![(2, 2), (3, 3)]))
        );
        let g = CovGrad::new(&[DMatrix::identity(2, 2)]).unwrap();
        assert_eq!(g.n(), 2);
        assert_eq!(g.n_parameters(), 1);
    }

    #[test]
    fn empty_concatenates() {
        let a = CovGrad::empty(2);
        let b = CovGrad::from_slice(DMatrix::identity(2, 2));
        let ab = a.concat_cols(&b).unwrap();
        assert_eq!(ab.n_parameters(), 1);
        assert_eq!(ab[0], DMatrix::identity(2, 2));

        let prod = a.component_mul(&DMatrix::from_element(2, 2, 3.0)).unwrap();
        assert_eq!(prod.n_parameters(), 0);
        assert!(a.concat_cols(&CovGrad::empty(3)).is_err());
    }

    #[test]
    fn from_slices_layout() {
        let by_col =
            CovGrad::from_column_slices(2, 1, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let by_row = CovGrad::from_row_slices(2, 1, &[1.0, 3.0, 2.0, 4.0]).unwrap();
        assert!(by_col.relative_eq(&by_row, 1E-12, 1E-12));
        assert_eq!(by_col[(1, 0, 0)], 2.0);
        assert_eq!(
            CovGrad::from_row_slices(2, 2, &[1.0]),
            Err(CovGradError::ImproperSize(8, 1))
        );
    }
}
