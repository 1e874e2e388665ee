//! Nine-zone H-Alpha Wishart classification.
//!
//! Pixels are first zoned on the entropy/alpha plane of their window-averaged
//! matrix. The zone means seed the Wishart refinement, and every valid pixel
//! is finally labelled with the zone number of its nearest refined centre.

use super::classifier::{check_region, LazyClusters, PolClassifier};
use super::cluster::{find_closest_cluster, AccumulatorArena, ClusterInfo};
use super::config::WishartConfig;
use super::decomposition::h_a_alpha;
use super::labels::LabelCoding;
use super::matrix::{HermitianMatrix, HermitianOps};
use super::refine::{AssignmentMap, PixelAssignment, Refinement};
use super::tiling::{CancellationToken, NullProgress, ProgressMonitor, TileScheduler};
use crate::io::pol_source::MatrixSource;
use crate::types::{LabelImage, SarResult, TileRect, NO_DATA_CLASS};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of zones on the H-Alpha plane
pub const NUM_ZONES: usize = 9;

const CLASS_BAND_NAME: &str = "H_alpha_wishart_class";

/// Zone numbering of the H-Alpha plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HAlphaPlane {
    /// Cloude-Pottier numbering: zone 1 is high entropy, high alpha
    #[default]
    Standard,
    /// Lee-Pottier numbering: zones counted up from low entropy, low alpha
    Lee,
}

impl HAlphaPlane {
    /// Zone number in 1..=9 for an (entropy, alpha in degrees) pair
    pub fn zone(&self, entropy: f64, alpha: f64) -> usize {
        let standard = if entropy <= 0.5 {
            if alpha <= 42.5 {
                9
            } else if alpha <= 47.5 {
                8
            } else {
                7
            }
        } else if entropy <= 0.9 {
            if alpha <= 40.0 {
                6
            } else if alpha <= 50.0 {
                5
            } else {
                4
            }
        } else if alpha <= 40.0 {
            3
        } else if alpha <= 55.0 {
            2
        } else {
            1
        };

        match self {
            HAlphaPlane::Standard => standard,
            HAlphaPlane::Lee => NUM_ZONES + 1 - standard,
        }
    }
}

/// Zone of the window-averaged matrix at (x, y) together with that matrix.
/// `None` for invalid pixels and for NaN entropy or alpha.
pub(crate) fn pixel_zone<S, const N: usize>(
    source: &S,
    x: usize,
    y: usize,
    half_window: usize,
    plane: HAlphaPlane,
) -> Option<(usize, HermitianMatrix<N>)>
where
    S: MatrixSource<N>,
    HermitianMatrix<N>: HermitianOps,
{
    if !source.is_valid_sample(x, y) {
        return None;
    }
    let sample = source.window_mean(x, y, half_window);
    let decomposition = h_a_alpha(&sample);
    if !decomposition.is_valid() {
        return None;
    }
    Some((plane.zone(decomposition.entropy, decomposition.alpha), sample))
}

/// Legend of the nine zones plus no-data
pub(crate) fn zone_coding() -> LabelCoding {
    let mut coding = LabelCoding::new("Cluster_classes");
    for zone in 1..=NUM_ZONES {
        coding.add(zone as u32, format!("zone_{}", zone), format!("H-Alpha zone {}", zone));
    }
    coding
}

/// Refined zone centres and the validity mask of the scene
#[derive(Debug, Clone)]
pub struct HAlphaModel<const N: usize> {
    centers: Vec<ClusterInfo<N>>,
    valid: Array2<bool>,
    iterations: usize,
}

impl<const N: usize> HAlphaModel<N> {
    /// Centres of the non-empty zones; `index()` is the zone number
    pub fn centers(&self) -> &[ClusterInfo<N>] {
        &self.centers
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        self.valid[[y, x]]
    }
}

/// H-Alpha Wishart classifier over T3 (quad-pol) or C2 (dual-pol) sources
pub struct HAlphaWishart<S, const N: usize> {
    source: S,
    config: WishartConfig,
    clusters: LazyClusters<HAlphaModel<N>>,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressMonitor>,
}

impl<S, const N: usize> HAlphaWishart<S, N>
where
    S: MatrixSource<N>,
    HermitianMatrix<N>: HermitianOps,
{
    pub fn new(source: S, config: WishartConfig) -> SarResult<Self> {
        config.validate_common()?;
        log::info!(
            "H-Alpha Wishart classifier: {}x{} scene, {:?} plane, window {}",
            source.width(),
            source.height(),
            config.h_alpha_plane,
            config.window_size
        );
        Ok(Self {
            source,
            config,
            clusters: LazyClusters::new(),
            cancel: CancellationToken::new(),
            progress: Arc::new(NullProgress),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressMonitor>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &WishartConfig {
        &self.config
    }

    /// The refined cluster model, computed on first use
    pub fn model(&self) -> SarResult<Arc<HAlphaModel<N>>> {
        self.clusters.get_or_compute(|| self.compute_cluster_centers())
    }

    fn compute_cluster_centers(&self) -> SarResult<HAlphaModel<N>> {
        let (width, height) = (self.source.width(), self.source.height());
        let scheduler = TileScheduler::new(width, height, self.config.tile_size)?;
        let half_window = self.config.half_window();
        let plane = self.config.h_alpha_plane;

        let partials = scheduler.run("H-Alpha zoning", &self.cancel, &*self.progress, |tile| {
            let mut arena = AccumulatorArena::<N>::new(&[NUM_ZONES]);
            let mut valid = Vec::with_capacity(tile.area());
            for (x, y) in tile.pixels() {
                match pixel_zone(&self.source, x, y, half_window, plane) {
                    Some((zone, sample)) => {
                        arena.accumulate(0, zone - 1, &sample);
                        valid.push(true);
                    }
                    None => valid.push(false),
                }
            }
            Ok((arena, valid))
        })?;

        let mut totals = AccumulatorArena::<N>::new(&[NUM_ZONES]);
        let mut valid = Array2::from_elem((height, width), false);
        for (tile, (arena, flags)) in scheduler.tiles().iter().zip(&partials) {
            totals.merge(arena);
            for ((x, y), &flag) in tile.pixels().zip(flags) {
                valid[[y, x]] = flag;
            }
        }

        let mut zones = Vec::with_capacity(NUM_ZONES);
        for (z, acc) in totals.category(0).iter().enumerate() {
            match ClusterInfo::from_accumulator(z + 1, acc) {
                Some(info) => {
                    log::debug!("Zone {}: {} pixels", z + 1, info.size());
                    zones.push(info);
                }
                None => log::warn!("H-Alpha zone {} is empty and is left out", z + 1),
            }
        }

        if zones.is_empty() {
            log::warn!("No valid pixels; every label is no-data");
            return Ok(HAlphaModel {
                centers: zones,
                valid,
                iterations: 0,
            });
        }

        let mut centers = vec![zones];
        let mut assignments: AssignmentMap = valid.mapv(|v| {
            if v {
                PixelAssignment::Fixed {
                    category: 0,
                    cluster: 0,
                }
            } else {
                PixelAssignment::Invalid
            }
        });

        let refinement = Refinement {
            scheduler: &scheduler,
            cancel: &self.cancel,
            progress: &*self.progress,
            half_window,
            max_iterations: self.config.max_iterations,
        };
        let iterations = refinement.run(&self.source, &mut centers, &mut assignments)?;
        log::info!("H-Alpha Wishart clustering finished after {} iterations", iterations);

        Ok(HAlphaModel {
            centers: centers.pop().unwrap_or_default(),
            valid,
            iterations,
        })
    }
}

impl<S, const N: usize> PolClassifier for HAlphaWishart<S, N>
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
        self.model().map(|_| ())
    }

    fn compute_tile(&self, region: TileRect) -> SarResult<LabelImage> {
        check_region(&region, self.source.width(), self.source.height())?;
        self.cancel.check(CLASS_BAND_NAME)?;
        let model = self.model()?;
        let half_window = self.config.half_window();

        let mut labels = LabelImage::from_elem((region.height, region.width), NO_DATA_CLASS);
        for (x, y) in region.pixels() {
            if !model.is_valid(x, y) {
                continue;
            }
            let sample = self.source.window_mean(x, y, half_window);
            if let Some((c, _)) = find_closest_cluster(&sample, &model.centers) {
                labels[[y - region.y, x - region.x]] = model.centers[c].index() as u32;
            }
        }
        Ok(labels)
    }

    fn build_label_metadata(&self) -> LabelCoding {
        zone_coding()
    }
}
