//! polclass: unsupervised Wishart classification of polarimetric SAR imagery
//!
//! Classifies multi-look C2, C3 or T3 matrix products into integer class
//! bands, either on the nine-zone H-Alpha plane or by a decomposition-driven
//! categorical clustering with merge and refinement phases.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    SarRealImage, LabelImage, MatrixKind, TileRect, SarError, SarResult, NO_DATA_CLASS
};

pub use io::{MatrixSource, QuadPolBands, DualPolBands};
pub use crate::core::{
    WishartConfig, Decomposition, HAlphaPlane, PolClassifier, HAlphaWishart, GeneralWishart, CloudePottier,
    LabelCoding, CancellationToken, ProgressMonitor, LogProgress, NullProgress
};
