use crate::core::matrix::{c3_to_t3, HermitianMatrix, C2, T3};
use crate::types::{MatrixKind, SarError, SarRealImage, SarResult};

/// Source of per-pixel polarimetric matrices addressed by (x, y)
pub trait MatrixSource<const N: usize>: Sync {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// True when every input channel holds the sensor no-data sentinel
    fn is_no_data(&self, x: usize, y: usize) -> bool;

    /// Raw matrix of a single pixel
    fn pixel(&self, x: usize, y: usize) -> HermitianMatrix<N>;

    /// False for no-data pixels and for pixels with a NaN or infinite channel
    fn is_valid_sample(&self, x: usize, y: usize) -> bool {
        !self.is_no_data(x, y) && self.pixel(x, y).is_finite()
    }

    /// Mean matrix over a square window centred on (x, y), clipped to the
    /// scene. Non-finite neighbours are left out of the mean.
    fn window_mean(&self, x: usize, y: usize, half_window: usize) -> HermitianMatrix<N> {
        if half_window == 0 {
            return self.pixel(x, y);
        }

        let x_start = x.saturating_sub(half_window);
        let x_end = (x + half_window).min(self.width() - 1);
        let y_start = y.saturating_sub(half_window);
        let y_end = (y + half_window).min(self.height() - 1);

        let mut sum = HermitianMatrix::<N>::zeros();
        let mut count = 0usize;
        for yy in y_start..=y_end {
            for xx in x_start..=x_end {
                let m = self.pixel(xx, yy);
                if m.is_finite() {
                    sum += &m;
                    count += 1;
                }
            }
        }
        if count == 0 {
            return self.pixel(x, y);
        }
        sum.scaled(1.0 / count as f64)
    }
}

/// Equally-sized real bands holding the upper triangle of a matrix
#[derive(Debug, Clone)]
struct BandStack {
    bands: Vec<SarRealImage>,
    no_data_value: f32,
    height: usize,
    width: usize,
}

impl BandStack {
    fn new(kind: MatrixKind, bands: Vec<SarRealImage>, no_data_value: f32) -> SarResult<Self> {
        if bands.len() != kind.num_bands() {
            return Err(SarError::InvalidFormat(format!(
                "{} product needs {} bands, got {}",
                kind,
                kind.num_bands(),
                bands.len()
            )));
        }

        let (height, width) = bands[0].dim();
        if height == 0 || width == 0 {
            return Err(SarError::InvalidFormat("Empty band raster".to_string()));
        }
        if let Some(i) = bands.iter().position(|b| b.dim() != (height, width)) {
            return Err(SarError::InvalidFormat(format!(
                "Band {} has size {:?}, expected {:?}",
                i,
                bands[i].dim(),
                (height, width)
            )));
        }

        log::debug!("{} band stack: {}x{} pixels", kind, width, height);
        Ok(Self {
            bands,
            no_data_value,
            height,
            width,
        })
    }

    #[inline]
    fn value(&self, band: usize, x: usize, y: usize) -> f64 {
        self.bands[band][[y, x]] as f64
    }

    fn is_no_data(&self, x: usize, y: usize) -> bool {
        self.bands.iter().all(|b| {
            let v = b[[y, x]];
            v.is_nan() || v == self.no_data_value
        })
    }
}

/// Full-pol product stored as C3 or T3 bands in the order
/// 11, 12_real, 12_imag, 13_real, 13_imag, 22, 23_real, 23_imag, 33.
///
/// Pixels are always delivered as T3 coherency matrices.
#[derive(Debug, Clone)]
pub struct QuadPolBands {
    kind: MatrixKind,
    stack: BandStack,
}

impl QuadPolBands {
    pub fn new(kind: MatrixKind, bands: Vec<SarRealImage>) -> SarResult<Self> {
        Self::with_no_data(kind, bands, 0.0)
    }

    pub fn with_no_data(kind: MatrixKind, bands: Vec<SarRealImage>, no_data_value: f32) -> SarResult<Self> {
        if kind == MatrixKind::C2 {
            return Err(SarError::InvalidConfig(
                "C2 data is dual-pol; use DualPolBands".to_string(),
            ));
        }
        let stack = BandStack::new(kind, bands, no_data_value)?;
        Ok(Self { kind, stack })
    }

    /// Build a T3 product from per-pixel matrices (rows of the outer vector are y)
    pub fn from_matrices(matrices: &[Vec<T3>]) -> SarResult<Self> {
        let height = matrices.len();
        let width = matrices.first().map_or(0, |row| row.len());
        let mut bands = vec![SarRealImage::zeros((height, width)); 9];
        for (y, row) in matrices.iter().enumerate() {
            if row.len() != width {
                return Err(SarError::InvalidFormat(format!(
                    "Row {} has {} pixels, expected {}",
                    y,
                    row.len(),
                    width
                )));
            }
            for (x, m) in row.iter().enumerate() {
                let values = [
                    m.re[0][0], m.re[0][1], m.im[0][1], m.re[0][2], m.im[0][2],
                    m.re[1][1], m.re[1][2], m.im[1][2], m.re[2][2],
                ];
                for (band, v) in bands.iter_mut().zip(values) {
                    band[[y, x]] = v as f32;
                }
            }
        }
        Self::new(MatrixKind::T3, bands)
    }

    pub fn kind(&self) -> MatrixKind {
        self.kind
    }
}

impl MatrixSource<3> for QuadPolBands {
    fn width(&self) -> usize {
        self.stack.width
    }

    fn height(&self) -> usize {
        self.stack.height
    }

    fn is_no_data(&self, x: usize, y: usize) -> bool {
        self.stack.is_no_data(x, y)
    }

    fn pixel(&self, x: usize, y: usize) -> T3 {
        let s = &self.stack;
        let re = [
            [s.value(0, x, y), s.value(1, x, y), s.value(3, x, y)],
            [0.0, s.value(5, x, y), s.value(6, x, y)],
            [0.0, 0.0, s.value(8, x, y)],
        ];
        let im = [
            [0.0, s.value(2, x, y), s.value(4, x, y)],
            [0.0, 0.0, s.value(7, x, y)],
            [0.0, 0.0, 0.0],
        ];
        let m = T3::from_upper(re, im);
        match self.kind {
            MatrixKind::C3 => c3_to_t3(&m),
            _ => m,
        }
    }
}

/// Dual-pol product stored as C2 bands in the order 11, 12_real, 12_imag, 22
#[derive(Debug, Clone)]
pub struct DualPolBands {
    stack: BandStack,
}

impl DualPolBands {
    pub fn new(bands: Vec<SarRealImage>) -> SarResult<Self> {
        Self::with_no_data(bands, 0.0)
    }

    pub fn with_no_data(bands: Vec<SarRealImage>, no_data_value: f32) -> SarResult<Self> {
        let stack = BandStack::new(MatrixKind::C2, bands, no_data_value)?;
        Ok(Self { stack })
    }
}

impl MatrixSource<2> for DualPolBands {
    fn width(&self) -> usize {
        self.stack.width
    }

    fn height(&self) -> usize {
        self.stack.height
    }

    fn is_no_data(&self, x: usize, y: usize) -> bool {
        self.stack.is_no_data(x, y)
    }

    fn pixel(&self, x: usize, y: usize) -> C2 {
        let s = &self.stack;
        C2::from_upper(
            [[s.value(0, x, y), s.value(1, x, y)], [0.0, s.value(3, x, y)]],
            [[0.0, s.value(2, x, y)], [0.0, 0.0]],
        )
    }
}
