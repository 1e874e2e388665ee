//! Classifier settings shared by the H-Alpha and general Wishart classifiers.

use super::decomposition::Decomposition;
use super::h_alpha::HAlphaPlane;
use crate::types::{SarError, SarResult};
use serde::{Deserialize, Serialize};

/// Wishart classification parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WishartConfig {
    /// Multi-look averaging window (must be odd)
    pub window_size: usize,
    /// Upper bound on refinement passes
    pub max_iterations: usize,
    /// Initial clusters over all categories, split evenly between them
    pub num_initial_classes: usize,
    /// Target cluster count of the merge phase
    pub num_final_classes: usize,
    /// Dominant to total power ratio at or below which a pixel is mixed
    pub mixed_category_threshold: f64,
    /// Decomposition driving the categorical classifier
    pub decomposition: Decomposition,
    /// Zone layout of the H-Alpha plane
    pub h_alpha_plane: HAlphaPlane,
    /// Edge length of the processing tiles
    pub tile_size: usize,
}

impl Default for WishartConfig {
    fn default() -> Self {
        Self {
            window_size: 5,                                // 5x5 window
            max_iterations: 3,                             // Three refinement passes
            num_initial_classes: 90,                       // 30 per category for 3 categories
            num_final_classes: 15,                         // Merge target
            mixed_category_threshold: 0.5,                 // Dominant power must exceed half
            decomposition: Decomposition::FreemanDurden,   // Three-component model fit
            h_alpha_plane: HAlphaPlane::Standard,          // Cloude-Pottier numbering
            tile_size: 256,                                // 256x256 tiles
        }
    }
}

impl WishartConfig {
    pub fn half_window(&self) -> usize {
        self.window_size / 2
    }

    /// Initial clusters per category
    pub fn num_initial_clusters(&self, num_categories: usize) -> usize {
        if num_categories == 0 {
            0
        } else {
            self.num_initial_classes / num_categories
        }
    }

    /// Checks shared by every classifier
    pub fn validate_common(&self) -> SarResult<()> {
        self.validate_sampling()?;
        if self.max_iterations == 0 {
            return Err(SarError::InvalidConfig(
                "At least one refinement iteration is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Window and tile checks, enough for the non-iterative zone classifier
    pub fn validate_sampling(&self) -> SarResult<()> {
        if self.window_size == 0 || self.window_size % 2 == 0 {
            return Err(SarError::InvalidConfig(format!(
                "Window size must be a positive odd number, got {}",
                self.window_size
            )));
        }
        if self.tile_size == 0 {
            return Err(SarError::InvalidConfig("Tile size must be positive".to_string()));
        }
        Ok(())
    }

    /// Full validation for a categorical classifier with `num_categories` categories
    pub fn validate(&self, num_categories: usize) -> SarResult<()> {
        self.validate_common()?;

        if num_categories == 0 {
            return Err(SarError::InvalidConfig("No decomposition categories".to_string()));
        }
        if self.num_initial_clusters(num_categories) == 0 {
            return Err(SarError::InvalidConfig(format!(
                "{} initial classes cannot be split over {} categories",
                self.num_initial_classes, num_categories
            )));
        }
        if self.num_final_classes == 0 {
            return Err(SarError::InvalidConfig(
                "Final class count must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mixed_category_threshold) {
            return Err(SarError::InvalidConfig(format!(
                "Mixed category threshold must lie in [0, 1], got {}",
                self.mixed_category_threshold
            )));
        }
        Ok(())
    }
}
