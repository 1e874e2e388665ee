use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued raster band (rows x columns)
pub type SarRealImage = Array2<f32>;

/// Integer class label raster produced by a classifier
pub type LabelImage = Array2<u32>;

/// Label reserved for no-data and invalid pixels
pub const NO_DATA_CLASS: u32 = 0;

/// Polarimetric matrix representation of a source product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixKind {
    /// Dual-pol 2x2 covariance matrix
    C2,
    /// Full-pol 3x3 covariance matrix (lexicographic basis)
    C3,
    /// Full-pol 3x3 coherency matrix (Pauli basis)
    T3,
}

impl MatrixKind {
    /// Number of real bands needed to store the matrix upper triangle
    pub fn num_bands(&self) -> usize {
        match self {
            MatrixKind::C2 => 4,
            MatrixKind::C3 | MatrixKind::T3 => 9,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            MatrixKind::C2 => 2,
            MatrixKind::C3 | MatrixKind::T3 => 3,
        }
    }
}

impl std::fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixKind::C2 => write!(f, "C2"),
            MatrixKind::C3 => write!(f, "C3"),
            MatrixKind::T3 => write!(f, "T3"),
        }
    }
}

impl std::str::FromStr for MatrixKind {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "C2" => Ok(MatrixKind::C2),
            "C3" => Ok(MatrixKind::C3),
            "T3" => Ok(MatrixKind::T3),
            _ => Err(SarError::InvalidConfig(format!("Unsupported matrix type: {}", s))),
        }
    }
}

/// Rectangular pixel region of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl TileRect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    pub fn x_end(&self) -> usize {
        self.x + self.width
    }

    pub fn y_end(&self) -> usize {
        self.y + self.height
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Iterate pixel coordinates in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.y..self.y_end()).flat_map(move |y| (self.x..self.x_end()).map(move |x| (x, y)))
    }
}

/// Error types for polarimetric classification
#[derive(Debug, Clone, thiserror::Error)]
pub enum SarError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Operation cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Worker failure in {stage}: {message}")]
    Worker { stage: String, message: String },
}

/// Result type for classification operations
pub type SarResult<T> = Result<T, SarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_rect_pixels_row_major() {
        let rect = TileRect::new(2, 5, 2, 2);
        let pixels: Vec<_> = rect.pixels().collect();
        assert_eq!(pixels, vec![(2, 5), (3, 5), (2, 6), (3, 6)]);
        assert_eq!(rect.area(), 4);
    }

    #[test]
    fn test_matrix_kind_parsing() {
        assert_eq!("t3".parse::<MatrixKind>().unwrap(), MatrixKind::T3);
        assert_eq!("C2".parse::<MatrixKind>().unwrap().num_bands(), 4);
        assert!(matches!(
            "C4".parse::<MatrixKind>(),
            Err(SarError::InvalidConfig(_))
        ));
    }
}
