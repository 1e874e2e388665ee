//! Polarimetric matrix sources

pub mod pol_source;

pub use pol_source::{MatrixSource, QuadPolBands, DualPolBands};
