//! Decomposition kinds that drive the categorical classifier, and the
//! per-pixel power evaluators built into the crate.
//!
//! Each [`Decomposition`] variant knows its category count, legend names and
//! whether it is evaluated on the window-averaged matrix. The built-in
//! evaluators map a T3 coherency matrix to one power value per category.

use super::matrix::{t3_to_c3, HermitianMatrix, HermitianOps, EPS, T3};
use crate::types::{SarError, SarResult};
use nalgebra::{Matrix3, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Largest category count of any supported decomposition
pub const MAX_CATEGORIES: usize = 4;

/// Supported polarimetric decompositions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Decomposition {
    Sinclair,
    Pauli,
    #[default]
    FreemanDurden,
    GeneralizedFreemanDurden,
    VanZyl,
    Cloude,
    HAAlpha,
    Yamaguchi,
    Touzi,
}

impl Decomposition {
    pub const ALL: [Decomposition; 9] = [
        Decomposition::Sinclair,
        Decomposition::Pauli,
        Decomposition::FreemanDurden,
        Decomposition::GeneralizedFreemanDurden,
        Decomposition::VanZyl,
        Decomposition::Cloude,
        Decomposition::HAAlpha,
        Decomposition::Yamaguchi,
        Decomposition::Touzi,
    ];

    /// Parse an operator name such as "Freeman-Durden Decomposition".
    /// Case, separators and the trailing "Decomposition" are ignored.
    pub fn from_name(name: &str) -> SarResult<Self> {
        let key: String = name
            .to_lowercase()
            .replace("decomposition", "")
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match key.as_str() {
            "sinclair" => Ok(Decomposition::Sinclair),
            "pauli" => Ok(Decomposition::Pauli),
            "freemandurden" => Ok(Decomposition::FreemanDurden),
            "generalizedfreemandurden" => Ok(Decomposition::GeneralizedFreemanDurden),
            "vanzyl" => Ok(Decomposition::VanZyl),
            "cloude" => Ok(Decomposition::Cloude),
            "haalpha" | "haalphaquadpol" => Ok(Decomposition::HAAlpha),
            "yamaguchi" => Ok(Decomposition::Yamaguchi),
            "touzi" => Ok(Decomposition::Touzi),
            _ => Err(SarError::InvalidConfig(format!("Unknown decomposition: {}", name))),
        }
    }

    /// Operator name of the decomposition
    pub fn name(&self) -> &'static str {
        match self {
            Decomposition::Sinclair => "Sinclair Decomposition",
            Decomposition::Pauli => "Pauli Decomposition",
            Decomposition::FreemanDurden => "Freeman-Durden Decomposition",
            Decomposition::GeneralizedFreemanDurden => "Generalized Freeman-Durden Decomposition",
            Decomposition::VanZyl => "van Zyl Decomposition",
            Decomposition::Cloude => "Cloude Decomposition",
            Decomposition::HAAlpha => "H-A-Alpha Quad Pol Decomposition",
            Decomposition::Yamaguchi => "Yamaguchi Decomposition",
            Decomposition::Touzi => "Touzi Decomposition",
        }
    }

    pub fn num_categories(&self) -> usize {
        match self {
            Decomposition::Yamaguchi | Decomposition::Touzi => 4,
            _ => 3,
        }
    }

    /// Short names used to build class legend entries
    pub fn category_names(&self) -> &'static [&'static str] {
        match self {
            Decomposition::Sinclair => &["sinclair_r", "sinclair_g", "sinclair_b"],
            Decomposition::Pauli => &["pauli_r", "pauli_g", "pauli_b"],
            Decomposition::FreemanDurden
            | Decomposition::GeneralizedFreemanDurden
            | Decomposition::VanZyl
            | Decomposition::Cloude => &["vol", "dbl", "surf"],
            Decomposition::HAAlpha => &["entropy", "anisotropy", "alpha"],
            Decomposition::Yamaguchi => &["vol", "dbl", "surf", "hlx"],
            Decomposition::Touzi => &["psi", "tau", "alpha", "phi"],
        }
    }

    pub fn category_descriptions(&self) -> &'static [&'static str] {
        match self {
            Decomposition::Sinclair => &["Sinclair_r", "Sinclair_g", "Sinclair_b"],
            Decomposition::Pauli => &["Pauli_r", "Pauli_g", "Pauli_b"],
            Decomposition::FreemanDurden
            | Decomposition::GeneralizedFreemanDurden
            | Decomposition::VanZyl
            | Decomposition::Cloude => &["Volume", "Double", "Surface"],
            Decomposition::HAAlpha => &["Entropy", "Anisotropy", "Alpha"],
            Decomposition::Yamaguchi => &["Volume", "Double", "Surface", "Helix"],
            Decomposition::Touzi => &["Psi", "Tau", "Alpha", "Phi"],
        }
    }

    /// Whether powers are computed from the window-averaged matrix rather
    /// than the raw pixel
    pub fn uses_window(&self) -> bool {
        matches!(
            self,
            Decomposition::FreemanDurden
                | Decomposition::GeneralizedFreemanDurden
                | Decomposition::VanZyl
                | Decomposition::Yamaguchi
                | Decomposition::Touzi
        )
    }

    /// Whether this crate ships an evaluator for the decomposition
    pub fn has_builtin_evaluator(&self) -> bool {
        !matches!(
            self,
            Decomposition::GeneralizedFreemanDurden | Decomposition::VanZyl | Decomposition::Touzi
        )
    }
}

impl std::fmt::Display for Decomposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-category power values of one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryPowers {
    values: [f64; MAX_CATEGORIES],
    len: usize,
}

impl CategoryPowers {
    pub fn new(values: &[f64]) -> Self {
        let len = values.len().min(MAX_CATEGORIES);
        let mut buf = [0.0; MAX_CATEGORIES];
        buf[..len].copy_from_slice(&values[..len]);
        Self { values: buf, len }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Per-pixel decomposition evaluator: T3 coherency matrix to category powers
pub trait PowerEvaluator: Sync {
    fn evaluate(&self, t3: &T3) -> CategoryPowers;
}

impl PowerEvaluator for Decomposition {
    /// Built-in evaluation. Decompositions without a built-in evaluator
    /// yield NaN powers, which mark the pixel invalid; the general classifier
    /// refuses them at construction unless an external evaluator is given.
    fn evaluate(&self, t3: &T3) -> CategoryPowers {
        match self {
            Decomposition::Sinclair => sinclair(t3),
            Decomposition::Pauli => pauli(t3),
            Decomposition::FreemanDurden => freeman_durden(t3),
            Decomposition::Cloude => cloude(t3),
            Decomposition::HAAlpha => {
                let h = h_a_alpha(t3);
                CategoryPowers::new(&[h.entropy, h.anisotropy, h.alpha])
            }
            Decomposition::Yamaguchi => yamaguchi(t3),
            Decomposition::GeneralizedFreemanDurden | Decomposition::VanZyl | Decomposition::Touzi => {
                CategoryPowers::new(&[f64::NAN; MAX_CATEGORIES][..self.num_categories()])
            }
        }
    }
}

/// Entropy, anisotropy and mean alpha angle (degrees) of a Hermitian matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HAAlpha {
    pub entropy: f64,
    pub anisotropy: f64,
    pub alpha: f64,
}

impl HAAlpha {
    const INVALID: HAAlpha = HAAlpha {
        entropy: f64::NAN,
        anisotropy: f64::NAN,
        alpha: f64::NAN,
    };

    pub fn is_valid(&self) -> bool {
        !(self.entropy.is_nan() || self.anisotropy.is_nan() || self.alpha.is_nan())
    }
}

/// Eigen-decomposition based entropy/anisotropy/alpha. Entropy uses a log
/// base equal to the matrix dimension; a zero-power or non-finite matrix
/// gives NaN values.
pub fn h_a_alpha<const N: usize>(m: &HermitianMatrix<N>) -> HAAlpha
where
    HermitianMatrix<N>: HermitianOps,
{
    if !m.is_finite() {
        return HAAlpha::INVALID;
    }
    let pairs = m.eigen_decomposition();
    if pairs.iter().any(|(l, u)| l.is_nan() || u.is_nan()) {
        return HAAlpha::INVALID;
    }
    let lambdas: Vec<f64> = pairs.iter().map(|(l, _)| l.max(0.0)).collect();
    let total: f64 = lambdas.iter().sum();
    if !(total > 0.0) {
        return HAAlpha::INVALID;
    }

    let log_base = (N as f64).ln();
    let mut entropy = 0.0;
    let mut alpha = 0.0;
    for (lambda, (_, first)) in lambdas.iter().zip(&pairs) {
        let p = lambda / total;
        if p > 0.0 {
            entropy -= p * p.ln() / log_base;
        }
        alpha += p * first.min(1.0).acos().to_degrees();
    }

    let (a, b) = if N == 2 {
        (lambdas[0], lambdas[1])
    } else {
        (lambdas[1], lambdas[2])
    };
    let anisotropy = if a + b > 0.0 { (a - b) / (a + b) } else { 0.0 };

    HAAlpha {
        entropy,
        anisotropy,
        alpha,
    }
}

/// Sinclair colour powers: |S_vv|^2, |S_hv|^2, |S_hh|^2
fn sinclair(t3: &T3) -> CategoryPowers {
    let c3 = t3_to_c3(t3);
    CategoryPowers::new(&[c3.re[2][2], c3.re[1][1] / 2.0, c3.re[0][0]])
}

/// Pauli powers: |S_hh - S_vv|^2/2, 2|S_hv|^2, |S_hh + S_vv|^2/2
fn pauli(t3: &T3) -> CategoryPowers {
    CategoryPowers::new(&[t3.re[1][1], t3.re[2][2], t3.re[0][0]])
}

/// Dominant-eigenvector scattering powers in (volume, double, surface) order
fn cloude(t3: &T3) -> CategoryPowers {
    let c = t3.to_complex();
    let m = Matrix3::new(
        c[0][0], c[0][1], c[0][2],
        c[1][0], c[1][1], c[1][2],
        c[2][0], c[2][1], c[2][2],
    );
    let eig = SymmetricEigen::new(m);
    let mut k = 0;
    for i in 1..3 {
        if eig.eigenvalues[i] > eig.eigenvalues[k] {
            k = i;
        }
    }
    let lambda = eig.eigenvalues[k].max(0.0);
    let u = eig.eigenvectors.column(k);
    CategoryPowers::new(&[
        lambda * u[2].norm_sqr(),
        lambda * u[1].norm_sqr(),
        lambda * u[0].norm_sqr(),
    ])
}

/// Three-component Freeman-Durden model fit, in (volume, double, surface) order
fn freeman_durden(t3: &T3) -> CategoryPowers {
    let c3 = t3_to_c3(t3);
    let span = c3.span();

    let fv = 1.5 * c3.re[1][1];
    let c11 = c3.re[0][0] - fv;
    let c33 = c3.re[2][2] - fv;
    let mut c13_re = c3.re[0][2] - fv / 3.0;
    let mut c13_im = c3.im[0][2];

    // volume scattering explains everything
    if c11 <= EPS || c33 <= EPS {
        return CategoryPowers::new(&[span, 0.0, 0.0]);
    }

    // keep the co-pol correlation physically realisable
    let c13_sq = c13_re * c13_re + c13_im * c13_im;
    if c13_sq > c11 * c33 {
        let scale = (c11 * c33 / c13_sq).sqrt();
        c13_re *= scale;
        c13_im *= scale;
    }
    let c13_sq = c13_re * c13_re + c13_im * c13_im;

    let (fs, fd, alpha_sq, beta_sq) = if c13_re >= 0.0 {
        // surface dominant: alpha fixed at -1
        let fd = (c11 * c33 - c13_sq) / (c11 + c33 + 2.0 * c13_re);
        let fs = c33 - fd;
        let beta_sq = ((fd + c13_re).powi(2) + c13_im * c13_im) / (fs * fs);
        (fs, fd, 1.0, beta_sq)
    } else {
        // double bounce dominant: beta fixed at 1
        let fs = (c11 * c33 - c13_sq) / (c11 + c33 - 2.0 * c13_re);
        let fd = c33 - fs;
        let alpha_sq = ((fs - c13_re).powi(2) + c13_im * c13_im) / (fd * fd);
        (fs, fd, alpha_sq, 1.0)
    };

    let ps = fs * (1.0 + beta_sq);
    let pd = fd * (1.0 + alpha_sq);
    let pv = 8.0 * fv / 3.0;
    CategoryPowers::new(&[pv, pd, ps])
}

/// Four-component Yamaguchi fit with helix term, in
/// (volume, double, surface, helix) order
fn yamaguchi(t3: &T3) -> CategoryPowers {
    let c3 = t3_to_c3(t3);
    let total = t3.span();
    let pc = 2.0 * t3.im[1][2].abs();

    // co-pol ratio selects the volume model
    let ratio = 10.0 * (c3.re[2][2] / c3.re[0][0]).log10();
    let (mut pv, d_share, c_shift) = if ratio < -2.0 {
        let pv = 3.75 * t3.re[2][2] - 1.875 * pc;
        (pv, 7.0 / 30.0, -1.0 / 6.0)
    } else if ratio > 2.0 {
        let pv = 3.75 * t3.re[2][2] - 1.875 * pc;
        (pv, 7.0 / 30.0, 1.0 / 6.0)
    } else {
        (4.0 * t3.re[2][2] - 2.0 * pc, 0.25, 0.0)
    };
    if pv < 0.0 {
        pv = 0.0;
    }

    if pv + pc > total {
        return CategoryPowers::new(&[total - pc, 0.0, 0.0, pc]);
    }

    let s = t3.re[0][0] - pv / 2.0;
    let d = t3.re[1][1] - d_share * pv - pc / 2.0;
    let c_re = t3.re[0][1] + c_shift * pv;
    let c_im = t3.im[0][1];
    let c_sq = c_re * c_re + c_im * c_im;

    let c0 = t3.re[0][0] - t3.re[1][1] - t3.re[2][2] + pc;
    let (mut ps, mut pd) = if c0 > 0.0 {
        let shift = if s > 0.0 { c_sq / s } else { 0.0 };
        (s + shift, d - shift)
    } else {
        let shift = if d > 0.0 { c_sq / d } else { 0.0 };
        (s - shift, d + shift)
    };

    if ps < 0.0 && pd < 0.0 {
        ps = 0.0;
        pd = 0.0;
        pv = total - pc;
    } else if ps < 0.0 {
        ps = 0.0;
        pd = total - pv - pc;
    } else if pd < 0.0 {
        pd = 0.0;
        ps = total - pv - pc;
    }

    CategoryPowers::new(&[pv, pd, ps, pc])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matrix::{c3_to_t3, C2};
    use approx::assert_abs_diff_eq;

    fn diag_t3(a: f64, b: f64, c: f64) -> T3 {
        T3::from_upper([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]], [[0.0; 3]; 3])
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            Decomposition::from_name("Freeman-Durden Decomposition").unwrap(),
            Decomposition::FreemanDurden
        );
        assert_eq!(Decomposition::from_name("yamaguchi").unwrap(), Decomposition::Yamaguchi);
        assert_eq!(
            Decomposition::from_name("H-A-Alpha Quad Pol Decomposition").unwrap(),
            Decomposition::HAAlpha
        );
        for d in Decomposition::ALL {
            assert_eq!(Decomposition::from_name(d.name()).unwrap(), d);
        }
        assert!(matches!(
            Decomposition::from_name("Krogager Decomposition"),
            Err(SarError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_category_metadata_consistent() {
        for d in Decomposition::ALL {
            assert_eq!(d.category_names().len(), d.num_categories());
            assert_eq!(d.category_descriptions().len(), d.num_categories());
        }
    }

    #[test]
    fn test_pure_surface_scatterer() {
        // T3 of a trihedral: all power in the first Pauli channel
        let t3 = diag_t3(2.0, 0.0, 0.0);
        let h = h_a_alpha(&t3);
        assert_abs_diff_eq!(h.entropy, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h.alpha, 0.0, epsilon = 1e-6);

        let pauli = Decomposition::Pauli.evaluate(&t3);
        assert_eq!(pauli.as_slice(), &[0.0, 0.0, 2.0]);

        let fd = Decomposition::FreemanDurden.evaluate(&t3);
        let p = fd.as_slice();
        assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-12);
        assert!(p[2] > p[1]);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), t3.span(), epsilon = 1e-9);
    }

    #[test]
    fn test_random_scatterer_entropy() {
        let h = h_a_alpha(&T3::identity());
        assert_abs_diff_eq!(h.entropy, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h.anisotropy, 0.0, epsilon = 1e-9);

        let h2 = h_a_alpha(&C2::identity());
        assert_abs_diff_eq!(h2.entropy, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_matrix_is_invalid() {
        assert!(!h_a_alpha(&T3::zeros()).is_valid());
        assert!(!h_a_alpha(&C2::zeros()).is_valid());
    }

    #[test]
    fn test_partial_nan_matrix_is_invalid() {
        let mut t3 = T3::identity();
        t3.re[0][1] = f64::NAN;
        t3.re[1][0] = f64::NAN;
        assert!(!h_a_alpha(&t3).is_valid());

        let mut c2 = C2::identity();
        c2.im[1][1] = f64::NAN;
        assert!(!h_a_alpha(&c2).is_valid());
    }

    #[test]
    fn test_dihedral_has_high_alpha() {
        let h = h_a_alpha(&diag_t3(0.0, 2.0, 0.0));
        assert_abs_diff_eq!(h.alpha, 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_freeman_durden_volume_case() {
        // uniform cross-pol dominated C3
        let c3 = T3::from_upper(
            [[1.0, 0.0, 0.2], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]],
            [[0.0; 3]; 3],
        );
        let powers = Decomposition::FreemanDurden.evaluate(&c3_to_t3(&c3));
        assert_abs_diff_eq!(powers.as_slice()[0], 4.0, epsilon = 1e-9);
        assert_eq!(&powers.as_slice()[1..], &[0.0, 0.0]);
    }

    #[test]
    fn test_yamaguchi_four_channels() {
        let t3 = T3::from_upper(
            [[3.0, 0.2, 0.0], [0.0, 1.0, 0.1], [0.0, 0.0, 0.5]],
            [[0.0, 0.0, 0.0], [0.0, 0.0, 0.05], [0.0, 0.0, 0.0]],
        );
        let powers = Decomposition::Yamaguchi.evaluate(&t3);
        assert_eq!(powers.len(), 4);
        assert_abs_diff_eq!(powers.as_slice()[3], 0.1, epsilon = 1e-12);
        assert!(powers.as_slice().iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn test_external_only_decompositions_yield_nan() {
        let powers = Decomposition::Touzi.evaluate(&T3::identity());
        assert_eq!(powers.len(), 4);
        assert!(powers.as_slice().iter().all(|p| p.is_nan()));
        assert!(!Decomposition::Touzi.has_builtin_evaluator());
    }

    #[test]
    fn test_cloude_dominant_channel() {
        let powers = Decomposition::Cloude.evaluate(&diag_t3(0.5, 4.0, 1.0));
        let p = powers.as_slice();
        assert_abs_diff_eq!(p[1], 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-9);
    }
}
