//! Small Hermitian matrix operations for polarimetric covariance (C2, C3)
//! and coherency (T3) matrices.
//!
//! Matrices are stored as separate real and imaginary parts. Degenerate
//! matrices are never reported as errors: the determinant is floored at
//! [`EPS`] so log-determinants stay finite and inversion never divides by zero.

use nalgebra::{Matrix2, Matrix3, SymmetricEigen};
use num_complex::Complex64;
use num_traits::Zero;
use std::f64::consts::SQRT_2;
use std::ops::AddAssign;

/// Determinant floor for degenerate matrices
pub const EPS: f64 = 1.0e-10;

/// Hermitian complex matrix of fixed dimension, held as (real, imaginary) parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HermitianMatrix<const N: usize> {
    pub re: [[f64; N]; N],
    pub im: [[f64; N]; N],
}

/// Dual-pol 2x2 covariance matrix
pub type C2 = HermitianMatrix<2>;

/// Full-pol 3x3 coherency matrix. Also used to hold C3 covariance matrices
/// before conversion with [`c3_to_t3`].
pub type T3 = HermitianMatrix<3>;

impl<const N: usize> Default for HermitianMatrix<N> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<const N: usize> HermitianMatrix<N> {
    pub fn zeros() -> Self {
        Self {
            re: [[0.0; N]; N],
            im: [[0.0; N]; N],
        }
    }

    pub fn identity() -> Self {
        let mut m = Self::zeros();
        for i in 0..N {
            m.re[i][i] = 1.0;
        }
        m
    }

    /// Build a matrix from its upper triangle, mirroring the lower triangle
    /// so that `re` is symmetric and `im` antisymmetric with a zero diagonal.
    pub fn from_upper(re: [[f64; N]; N], im: [[f64; N]; N]) -> Self {
        let mut m = Self { re, im };
        for i in 0..N {
            m.im[i][i] = 0.0;
            for j in (i + 1)..N {
                m.re[j][i] = m.re[i][j];
                m.im[j][i] = -m.im[i][j];
            }
        }
        m
    }

    pub fn from_complex(m: &[[Complex64; N]; N]) -> Self {
        let mut out = Self::zeros();
        for i in 0..N {
            for j in 0..N {
                out.re[i][j] = m[i][j].re;
                out.im[i][j] = m[i][j].im;
            }
        }
        out
    }

    pub fn to_complex(&self) -> [[Complex64; N]; N] {
        let mut out = [[Complex64::zero(); N]; N];
        for i in 0..N {
            for j in 0..N {
                out[i][j] = Complex64::new(self.re[i][j], self.im[i][j]);
            }
        }
        out
    }

    /// Total power (trace)
    pub fn span(&self) -> f64 {
        (0..N).map(|i| self.re[i][i]).sum()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = *self;
        for i in 0..N {
            for j in 0..N {
                out.re[i][j] *= factor;
                out.im[i][j] *= factor;
            }
        }
        out
    }

    pub fn is_finite(&self) -> bool {
        self.re.iter().flatten().chain(self.im.iter().flatten()).all(|v| v.is_finite())
    }

    pub fn is_hermitian(&self, tolerance: f64) -> bool {
        for i in 0..N {
            if self.im[i][i].abs() > tolerance {
                return false;
            }
            for j in (i + 1)..N {
                if (self.re[i][j] - self.re[j][i]).abs() > tolerance
                    || (self.im[i][j] + self.im[j][i]).abs() > tolerance
                {
                    return false;
                }
            }
        }
        true
    }

    /// Sum of squared element differences over both parts
    pub fn squared_difference(&self, other: &Self) -> f64 {
        let mut sum = 0.0;
        for i in 0..N {
            for j in 0..N {
                let dr = self.re[i][j] - other.re[i][j];
                let di = self.im[i][j] - other.im[i][j];
                sum += dr * dr + di * di;
            }
        }
        sum
    }

    /// `Re(tr(self * sample))` for Hermitian `self` and `sample`, evaluated over
    /// the Hermitian degrees of freedom: diagonal terms once, off-diagonal
    /// terms twice.
    pub fn trace_product(&self, sample: &Self) -> f64 {
        let mut sum = 0.0;
        for i in 0..N {
            sum += self.re[i][i] * sample.re[i][i];
            for j in (i + 1)..N {
                sum += 2.0 * (self.re[i][j] * sample.re[i][j] + self.im[i][j] * sample.im[i][j]);
            }
        }
        sum
    }

    /// Size-weighted average of two matrices
    pub fn weighted_mean(a: &Self, weight_a: f64, b: &Self, weight_b: f64) -> Self {
        let total = weight_a + weight_b;
        let mut out = Self::zeros();
        for i in 0..N {
            for j in 0..N {
                out.re[i][j] = (weight_a * a.re[i][j] + weight_b * b.re[i][j]) / total;
                out.im[i][j] = (weight_a * a.im[i][j] + weight_b * b.im[i][j]) / total;
            }
        }
        out
    }

    /// Complex matrix product, used to check inverses
    pub fn matmul(&self, other: &Self) -> [[Complex64; N]; N] {
        let a = self.to_complex();
        let b = other.to_complex();
        let mut out = [[Complex64::zero(); N]; N];
        for i in 0..N {
            for j in 0..N {
                for (k, bk) in b.iter().enumerate() {
                    out[i][j] += a[i][k] * bk[j];
                }
            }
        }
        out
    }
}

impl<const N: usize> AddAssign<&HermitianMatrix<N>> for HermitianMatrix<N> {
    fn add_assign(&mut self, other: &HermitianMatrix<N>) {
        for i in 0..N {
            for j in 0..N {
                self.re[i][j] += other.re[i][j];
                self.im[i][j] += other.im[i][j];
            }
        }
    }
}

/// Dimension-specific Hermitian operations
pub trait HermitianOps: Sized {
    /// Signed determinant without any floor
    fn raw_determinant(&self) -> f64;

    /// Matrix inverse; a near-singular matrix is inverted with its
    /// determinant floored at [`EPS`]
    fn inverse(&self) -> Self;

    /// Eigenvalues sorted in descending order, each paired with the modulus
    /// of the first component of its unit eigenvector
    fn eigen_decomposition(&self) -> Vec<(f64, f64)>;

    /// `|det|` floored at [`EPS`]; NaN stays NaN
    fn determinant(&self) -> f64 {
        let det = self.raw_determinant().abs();
        if det.is_nan() {
            det
        } else {
            det.max(EPS)
        }
    }
}

/// Keep the sign of a determinant while moving it away from zero
fn safe_divisor(det: f64) -> f64 {
    if det.abs() >= EPS {
        det
    } else if det < 0.0 {
        -EPS
    } else {
        EPS
    }
}

fn sorted_eigen_pairs(mut pairs: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));
    pairs
}

impl HermitianOps for C2 {
    fn raw_determinant(&self) -> f64 {
        self.re[0][0] * self.re[1][1] - self.re[0][1] * self.re[0][1] - self.im[0][1] * self.im[0][1]
    }

    fn inverse(&self) -> Self {
        let det = safe_divisor(self.raw_determinant());
        let re = [
            [self.re[1][1] / det, -self.re[0][1] / det],
            [0.0, self.re[0][0] / det],
        ];
        let im = [[0.0, -self.im[0][1] / det], [0.0, 0.0]];
        Self::from_upper(re, im)
    }

    fn eigen_decomposition(&self) -> Vec<(f64, f64)> {
        let c = self.to_complex();
        let m = Matrix2::new(c[0][0], c[0][1], c[1][0], c[1][1]);
        let eig = SymmetricEigen::new(m);
        let pairs = (0..2)
            .map(|k| (eig.eigenvalues[k], eig.eigenvectors[(0, k)].norm()))
            .collect();
        sorted_eigen_pairs(pairs)
    }
}

impl HermitianOps for T3 {
    fn raw_determinant(&self) -> f64 {
        let m = self.to_complex();
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        det.re
    }

    fn inverse(&self) -> Self {
        let m = self.to_complex();
        let det = safe_divisor(self.raw_determinant());
        let adj = [
            [
                m[1][1] * m[2][2] - m[1][2] * m[2][1],
                m[0][2] * m[2][1] - m[0][1] * m[2][2],
                m[0][1] * m[1][2] - m[0][2] * m[1][1],
            ],
            [
                m[1][2] * m[2][0] - m[1][0] * m[2][2],
                m[0][0] * m[2][2] - m[0][2] * m[2][0],
                m[0][2] * m[1][0] - m[0][0] * m[1][2],
            ],
            [
                m[1][0] * m[2][1] - m[1][1] * m[2][0],
                m[0][1] * m[2][0] - m[0][0] * m[2][1],
                m[0][0] * m[1][1] - m[0][1] * m[1][0],
            ],
        ];
        let mut inv = [[Complex64::zero(); 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                inv[i][j] = adj[i][j] / det;
            }
        }
        Self::from_complex(&inv)
    }

    fn eigen_decomposition(&self) -> Vec<(f64, f64)> {
        let c = self.to_complex();
        let m = Matrix3::new(
            c[0][0], c[0][1], c[0][2],
            c[1][0], c[1][1], c[1][2],
            c[2][0], c[2][1], c[2][2],
        );
        let eig = SymmetricEigen::new(m);
        let pairs = (0..3)
            .map(|k| (eig.eigenvalues[k], eig.eigenvectors[(0, k)].norm()))
            .collect();
        sorted_eigen_pairs(pairs)
    }
}

/// Convert a C3 covariance matrix (lexicographic basis) to T3 coherency
pub fn c3_to_t3(c3: &T3) -> T3 {
    let (c, ci) = (&c3.re, &c3.im);
    let re = [
        [
            (c[0][0] + 2.0 * c[0][2] + c[2][2]) / 2.0,
            (c[0][0] - c[2][2]) / 2.0,
            (c[0][1] + c[1][2]) / SQRT_2,
        ],
        [0.0, (c[0][0] - 2.0 * c[0][2] + c[2][2]) / 2.0, (c[0][1] - c[1][2]) / SQRT_2],
        [0.0, 0.0, c[1][1]],
    ];
    let im = [
        [0.0, -ci[0][2], (ci[0][1] - ci[1][2]) / SQRT_2],
        [0.0, 0.0, (ci[0][1] + ci[1][2]) / SQRT_2],
        [0.0, 0.0, 0.0],
    ];
    T3::from_upper(re, im)
}

/// Convert a T3 coherency matrix (Pauli basis) to C3 covariance
pub fn t3_to_c3(t3: &T3) -> T3 {
    let (t, ti) = (&t3.re, &t3.im);
    let re = [
        [
            (t[0][0] + 2.0 * t[0][1] + t[1][1]) / 2.0,
            (t[0][2] + t[1][2]) / SQRT_2,
            (t[0][0] - t[1][1]) / 2.0,
        ],
        [0.0, t[2][2], (t[0][2] - t[1][2]) / SQRT_2],
        [0.0, 0.0, (t[0][0] - 2.0 * t[0][1] + t[1][1]) / 2.0],
    ];
    let im = [
        [0.0, (ti[0][2] + ti[1][2]) / SQRT_2, -ti[0][1]],
        [0.0, 0.0, (ti[1][2] - ti[0][2]) / SQRT_2],
        [0.0, 0.0, 0.0],
    ];
    T3::from_upper(re, im)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_t3() -> T3 {
        T3::from_upper(
            [[4.0, 0.5, 0.2], [0.0, 3.0, -0.3], [0.0, 0.0, 2.0]],
            [[0.0, 0.4, -0.1], [0.0, 0.0, 0.25], [0.0, 0.0, 0.0]],
        )
    }

    fn assert_identity<const N: usize>(product: &[[Complex64; N]; N]) {
        for i in 0..N {
            for j in 0..N {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(product[i][j].re, expected, epsilon = 1e-10);
                assert_abs_diff_eq!(product[i][j].im, 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_determinant_floor() {
        assert_eq!(C2::zeros().determinant(), EPS);
        assert_eq!(T3::zeros().determinant(), EPS);

        let singular = C2::from_upper([[1.0, 1.0], [0.0, 1.0]], [[0.0, 0.0], [0.0, 0.0]]);
        assert!(singular.determinant() >= EPS);
    }

    #[test]
    fn test_nan_determinant_not_floored() {
        let mut m = sample_t3();
        m.re[0][1] = f64::NAN;
        assert!(!m.is_finite());
        assert!(m.determinant().is_nan());
    }

    #[test]
    fn test_c2_determinant_formula() {
        let m = C2::from_upper([[3.0, 0.5], [0.0, 2.0]], [[0.0, 0.7], [0.0, 0.0]]);
        assert_abs_diff_eq!(m.determinant(), 3.0 * 2.0 - 0.25 - 0.49, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_c2() {
        let m = C2::from_upper([[3.0, 0.5], [0.0, 2.0]], [[0.0, 0.7], [0.0, 0.0]]);
        let inv = m.inverse();
        assert!(inv.is_hermitian(1e-12));
        assert_identity(&m.matmul(&inv));
    }

    #[test]
    fn test_inverse_t3() {
        let m = sample_t3();
        let inv = m.inverse();
        assert!(inv.is_hermitian(1e-12));
        assert_identity(&m.matmul(&inv));
    }

    #[test]
    fn test_inverse_of_zero_matrix_is_finite() {
        assert!(T3::zeros().inverse().is_finite());
        assert!(C2::zeros().inverse().is_finite());
    }

    #[test]
    fn test_trace_product_matches_complex_trace() {
        let a = sample_t3().inverse();
        let b = sample_t3();
        let full = a.matmul(&b);
        let trace: f64 = (0..3).map(|i| full[i][i].re).sum();
        assert_abs_diff_eq!(a.trace_product(&b), trace, epsilon = 1e-10);
    }

    #[test]
    fn test_basis_conversion_round_trip() {
        let c3 = sample_t3();
        let back = t3_to_c3(&c3_to_t3(&c3));
        assert_abs_diff_eq!(back.squared_difference(&c3), 0.0, epsilon = 1e-20);
        assert_abs_diff_eq!(c3_to_t3(&c3).span(), c3.span(), epsilon = 1e-12);
    }

    #[test]
    fn test_eigen_decomposition_sorted() {
        let m = T3::from_upper(
            [[1.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 2.0]],
            [[0.0; 3]; 3],
        );
        let pairs = m.eigen_decomposition();
        assert_abs_diff_eq!(pairs[0].0, 5.0, epsilon = 1e-10);
        assert_abs_diff_eq!(pairs[1].0, 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(pairs[2].0, 1.0, epsilon = 1e-10);
        // only the smallest eigenvector lies along the first axis
        assert_abs_diff_eq!(pairs[2].1, 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(pairs[0].1, 0.0, epsilon = 1e-10);
    }
}
