//! Non-iterative Cloude-Pottier classification: every pixel is labelled with
//! its H-Alpha plane zone.

use super::classifier::{check_region, PolClassifier};
use super::config::WishartConfig;
use super::h_alpha::{pixel_zone, zone_coding, NUM_ZONES};
use super::labels::LabelCoding;
use super::matrix::{HermitianMatrix, HermitianOps};
use super::tiling::CancellationToken;
use crate::io::pol_source::MatrixSource;
use crate::types::{LabelImage, SarResult, TileRect, NO_DATA_CLASS};

const CLASS_BAND_NAME: &str = "H_alpha_class";

/// H-Alpha zone classifier over T3 (quad-pol) or C2 (dual-pol) sources
pub struct CloudePottier<S, const N: usize> {
    source: S,
    config: WishartConfig,
    cancel: CancellationToken,
}

impl<S, const N: usize> CloudePottier<S, N>
where
    S: MatrixSource<N>,
    HermitianMatrix<N>: HermitianOps,
{
    /// Only the window size, tile size and plane of `config` are used
    pub fn new(source: S, config: WishartConfig) -> SarResult<Self> {
        config.validate_sampling()?;
        log::info!(
            "Cloude-Pottier classifier: {}x{} scene, {:?} plane, window {}",
            source.width(),
            source.height(),
            config.h_alpha_plane,
            config.window_size
        );
        Ok(Self {
            source,
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &WishartConfig {
        &self.config
    }
}

impl<S, const N: usize> PolClassifier for CloudePottier<S, N>
where
    S: MatrixSource<N>,
    HermitianMatrix<N>: HermitianOps,
{
    fn num_classes(&self) -> u32 {
        NUM_ZONES as u32 + 1
    }

    fn class_band_name(&self) -> &str {
        CLASS_BAND_NAME
    }

    fn scene_size(&self) -> (usize, usize) {
        (self.source.width(), self.source.height())
    }

    fn tile_size(&self) -> usize {
        self.config.tile_size
    }

    fn prepare(&self) -> SarResult<()> {
        Ok(())
    }

    fn compute_tile(&self, region: TileRect) -> SarResult<LabelImage> {
        check_region(&region, self.source.width(), self.source.height())?;
        self.cancel.check(CLASS_BAND_NAME)?;
        let half_window = self.config.half_window();
        let plane = self.config.h_alpha_plane;

        let mut labels = LabelImage::from_elem((region.height, region.width), NO_DATA_CLASS);
        for (x, y) in region.pixels() {
            if let Some((zone, _)) = pixel_zone(&self.source, x, y, half_window, plane) {
                labels[[y - region.y, x - region.x]] = zone as u32;
            }
        }
        Ok(labels)
    }

    fn build_label_metadata(&self) -> LabelCoding {
        zone_coding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::h_alpha::HAlphaPlane;
    use crate::core::matrix::T3;
    use crate::io::pol_source::QuadPolBands;
    use crate::types::SarError;

    fn diag_t3(a: f64, b: f64, c: f64) -> T3 {
        T3::from_upper([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]], [[0.0; 3]; 3])
    }

    fn scene() -> QuadPolBands {
        let mut rows = vec![vec![diag_t3(2.0, 0.1, 0.1), diag_t3(0.1, 2.0, 0.1), diag_t3(2.0, 1.0, 0.5)]; 2];
        rows[1][1].im[0][2] = f64::NAN;
        QuadPolBands::from_matrices(&rows).unwrap()
    }

    fn single_pixel_config() -> WishartConfig {
        WishartConfig {
            window_size: 1,
            tile_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_pixels_get_their_zone() {
        let classifier = CloudePottier::<_, 3>::new(scene(), single_pixel_config()).unwrap();
        let labels = classifier.classify().unwrap();

        assert_eq!(labels[[0, 0]], 9);
        assert_eq!(labels[[0, 1]], 7);
        // medium entropy, H about 0.87 and alpha about 38.6
        assert_eq!(labels[[0, 2]], 6);
        assert_eq!(labels[[1, 1]], NO_DATA_CLASS);
    }

    #[test]
    fn test_lee_plane() {
        let config = WishartConfig {
            h_alpha_plane: HAlphaPlane::Lee,
            ..single_pixel_config()
        };
        let classifier = CloudePottier::<_, 3>::new(scene(), config).unwrap();
        let labels = classifier.classify().unwrap();
        assert_eq!(labels[[1, 0]], 1);
        assert_eq!(labels[[1, 2]], 4);
    }

    #[test]
    fn test_iterations_not_required() {
        let config = WishartConfig {
            max_iterations: 0,
            ..single_pixel_config()
        };
        let classifier = CloudePottier::<_, 3>::new(scene(), config).unwrap();
        assert_eq!(classifier.num_classes(), 10);
        assert_eq!(classifier.class_band_name(), "H_alpha_class");
        assert_eq!(classifier.build_label_metadata().len(), 10);

        let even_window = WishartConfig {
            window_size: 4,
            ..Default::default()
        };
        assert!(matches!(
            CloudePottier::<_, 3>::new(scene(), even_window),
            Err(SarError::InvalidConfig(_))
        ));
    }
}
