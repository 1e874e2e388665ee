//! Categorical Wishart classification driven by a polarimetric decomposition.
//!
//! Phases:
//! 1. category assignment by dominant decomposition power, power bucketing
//! 2. initial centre per (category, bucket) from raw pixel matrices
//! 3. greedy merge down to the target cluster count
//! 4. Wishart refinement
//! 5. power-ordered output labels

use super::classifier::{check_region, LazyClusters, PolClassifier};
use super::cluster::{AccumulatorArena, ClusterInfo};
use super::config::WishartConfig;
use super::decomposition::{Decomposition, PowerEvaluator};
use super::labels::{colour_index_map, pixel_label, LabelCoding};
use super::matrix::T3;
use super::merge::merge_to_target;
use super::refine::{AssignmentMap, PixelAssignment, Refinement};
use super::tiling::{CancellationToken, NullProgress, ProgressMonitor, TileScheduler};
use crate::io::pol_source::MatrixSource;
use crate::types::{LabelImage, SarError, SarResult, TileRect};
use ndarray::Array2;
use std::sync::Arc;

const CLASS_BAND_NAME: &str = "General_wishart_class";

/// Outcome of the dominance test for one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerClass {
    /// A NaN power channel; the pixel is never clustered
    Invalid,
    /// No dominant channel; recorded power is the mean channel power
    Mixed { power: f64 },
    Dominant { category: usize, power: f64 },
}

/// Dominance test on one pixel's category powers
pub fn classify_powers(powers: &[f64], mixed_threshold: f64) -> PowerClass {
    let mut dom_power = f64::MIN;
    let mut dom_category = 0;
    let mut total = 0.0;
    for (category, &p) in powers.iter().enumerate() {
        if p.is_nan() {
            return PowerClass::Invalid;
        }
        total += p;
        if p > dom_power {
            dom_power = p;
            dom_category = category;
        }
    }

    if dom_power / total <= mixed_threshold {
        PowerClass::Mixed {
            power: total / powers.len() as f64,
        }
    } else {
        PowerClass::Dominant {
            category: dom_category,
            power: dom_power,
        }
    }
}

/// Equal-population power thresholds of one category.
///
/// With fewer pixels than buckets no threshold is produced and every pixel
/// lands in the last bucket.
pub fn power_thresholds(mut powers: Vec<f64>, num_buckets: usize) -> Vec<f64> {
    let bucket_size = powers.len() / num_buckets.max(1);
    if bucket_size == 0 {
        return Vec::new();
    }
    powers.sort_by(f64::total_cmp);
    (1..num_buckets).map(|j| powers[j * bucket_size]).collect()
}

/// Bucket of a power value: the first threshold exceeding it, else the last
pub fn power_bucket(power: f64, thresholds: &[f64], num_buckets: usize) -> usize {
    thresholds
        .iter()
        .position(|&t| power < t)
        .unwrap_or(num_buckets - 1)
}

/// Final clustering of a scene
#[derive(Debug, Clone)]
pub struct GeneralModel {
    assignments: AssignmentMap,
    colour_map: Vec<Vec<u32>>,
    centers: Vec<Vec<ClusterInfo<3>>>,
    initial_population: usize,
    iterations: usize,
}

impl GeneralModel {
    /// Final centres per category
    pub fn centers(&self) -> &[Vec<ClusterInfo<3>>] {
        &self.centers
    }

    /// Output label per (category, cluster)
    pub fn colour_map(&self) -> &[Vec<u32>] {
        &self.colour_map
    }

    pub fn assignment(&self, x: usize, y: usize) -> PixelAssignment {
        self.assignments[[y, x]]
    }

    /// Samples accumulated into the initial centres
    pub fn initial_population(&self) -> usize {
        self.initial_population
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn num_clusters(&self) -> usize {
        self.centers.iter().map(|c| c.len()).sum()
    }
}

/// General Wishart classifier over a quad-pol source
pub struct GeneralWishart<S> {
    source: S,
    config: WishartConfig,
    decomposition: Decomposition,
    evaluator: Box<dyn PowerEvaluator + Send>,
    num_categories: usize,
    num_initial_clusters: usize,
    clusters: LazyClusters<GeneralModel>,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressMonitor>,
}

impl<S: MatrixSource<3>> GeneralWishart<S> {
    /// Classifier using the built-in evaluator of `config.decomposition`
    pub fn new(source: S, config: WishartConfig) -> SarResult<Self> {
        let decomposition = config.decomposition;
        if !decomposition.has_builtin_evaluator() {
            return Err(SarError::InvalidConfig(format!(
                "{} needs an external power evaluator",
                decomposition
            )));
        }
        Self::with_evaluator(source, config, Box::new(decomposition))
    }

    /// Classifier with a caller-supplied power evaluator for `config.decomposition`
    pub fn with_evaluator(
        source: S,
        config: WishartConfig,
        evaluator: Box<dyn PowerEvaluator + Send>,
    ) -> SarResult<Self> {
        let decomposition = config.decomposition;
        let num_categories = decomposition.num_categories();
        config.validate(num_categories)?;
        let num_initial_clusters = config.num_initial_clusters(num_categories);

        log::info!(
            "General Wishart classifier: {}, {} categories x {} initial clusters, target {}",
            decomposition,
            num_categories,
            num_initial_clusters,
            config.num_final_classes
        );

        Ok(Self {
            source,
            config,
            decomposition,
            evaluator,
            num_categories,
            num_initial_clusters,
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

    pub fn decomposition(&self) -> Decomposition {
        self.decomposition
    }

    pub fn num_initial_clusters(&self) -> usize {
        self.num_initial_clusters
    }

    /// The final cluster model, computed on first use
    pub fn model(&self) -> SarResult<Arc<GeneralModel>> {
        self.clusters.get_or_compute(|| self.compute_cluster_centers())
    }

    fn compute_cluster_centers(&self) -> SarResult<GeneralModel> {
        let (width, height) = (self.source.width(), self.source.height());
        let scheduler = TileScheduler::new(width, height, self.config.tile_size)?;

        let mut assignments = AssignmentMap::default((height, width));
        let mut power = Array2::<f64>::zeros((height, width));
        self.create_initial_clusters(&scheduler, &mut assignments, &mut power)?;

        let (mut centers, initial_population) = self.initial_cluster_centers(&scheduler, &assignments)?;

        let max_cluster_size = 2 * width * height / self.config.num_final_classes;
        let merges = merge_to_target(&mut centers, self.config.num_final_classes, max_cluster_size);
        log::info!(
            "Merged {} cluster pairs, {} clusters remain",
            merges,
            centers.iter().map(|c| c.len()).sum::<usize>()
        );

        let refinement = Refinement {
            scheduler: &scheduler,
            cancel: &self.cancel,
            progress: &*self.progress,
            half_window: self.config.half_window(),
            max_iterations: self.config.max_iterations,
        };
        let iterations = refinement.run(&self.source, &mut centers, &mut assignments)?;
        log::info!("General Wishart refinement finished after {} iterations", iterations);

        let layout: Vec<usize> = centers.iter().map(|c| c.len()).collect();
        let colour_map = colour_index_map(&assignments, &power, &layout, self.num_initial_clusters);

        Ok(GeneralModel {
            assignments,
            colour_map,
            centers,
            initial_population,
            iterations,
        })
    }

    /// Dominance test per pixel, then equal-population power buckets per category
    fn create_initial_clusters(
        &self,
        scheduler: &TileScheduler,
        assignments: &mut AssignmentMap,
        power: &mut Array2<f64>,
    ) -> SarResult<()> {
        let half_window = self.config.half_window();
        let threshold = self.config.mixed_category_threshold;
        let windowed = self.decomposition.uses_window();

        let partials = scheduler.run("Creating initial clusters", &self.cancel, &*self.progress, |tile| {
            let mut classes = Vec::with_capacity(tile.area());
            for (x, y) in tile.pixels() {
                if !self.source.is_valid_sample(x, y) {
                    classes.push(PowerClass::Invalid);
                    continue;
                }
                let sample = if windowed {
                    self.source.window_mean(x, y, half_window)
                } else {
                    self.source.pixel(x, y)
                };
                let powers = self.evaluator.evaluate(&sample);
                if powers.len() != self.num_categories {
                    return Err(SarError::Processing(format!(
                        "{} evaluator returned {} powers, expected {}",
                        self.decomposition,
                        powers.len(),
                        self.num_categories
                    )));
                }
                classes.push(classify_powers(powers.as_slice(), threshold));
            }
            Ok(classes)
        })?;

        let mut category_powers = vec![Vec::new(); self.num_categories];
        let mut mixed = 0usize;
        let mut invalid = 0usize;
        for (tile, classes) in scheduler.tiles().iter().zip(&partials) {
            for ((x, y), class) in tile.pixels().zip(classes) {
                match *class {
                    PowerClass::Invalid => invalid += 1,
                    PowerClass::Mixed { power: p } => {
                        assignments[[y, x]] = PixelAssignment::Mixed;
                        power[[y, x]] = p;
                        mixed += 1;
                    }
                    PowerClass::Dominant { category, power: p } => {
                        assignments[[y, x]] = PixelAssignment::Fixed { category, cluster: 0 };
                        power[[y, x]] = p;
                        category_powers[category].push(p);
                    }
                }
            }
        }

        for (category, powers) in category_powers.iter().enumerate() {
            log::debug!(
                "Category {}: {} pixels",
                self.decomposition.category_names()[category],
                powers.len()
            );
        }
        log::debug!("{} mixed pixels, {} invalid pixels", mixed, invalid);

        let thresholds: Vec<Vec<f64>> = category_powers
            .into_iter()
            .map(|powers| power_thresholds(powers, self.num_initial_clusters))
            .collect();

        for (assignment, &p) in assignments.iter_mut().zip(power.iter()) {
            if let PixelAssignment::Fixed { category, .. } = *assignment {
                let cluster = power_bucket(p, &thresholds[category], self.num_initial_clusters);
                *assignment = PixelAssignment::Fixed { category, cluster };
            }
        }
        Ok(())
    }

    /// Mean raw matrix of every non-empty (category, bucket); mixed pixels excluded
    fn initial_cluster_centers(
        &self,
        scheduler: &TileScheduler,
        assignments: &AssignmentMap,
    ) -> SarResult<(Vec<Vec<ClusterInfo<3>>>, usize)> {
        let layout = vec![self.num_initial_clusters; self.num_categories];

        let partials = scheduler.run("Computing initial cluster centres", &self.cancel, &*self.progress, |tile| {
            let mut arena = AccumulatorArena::<3>::new(&layout);
            for (x, y) in tile.pixels() {
                if let PixelAssignment::Fixed { category, cluster } = assignments[[y, x]] {
                    let sample: T3 = self.source.pixel(x, y);
                    arena.accumulate(category, cluster, &sample);
                }
            }
            Ok(arena)
        })?;

        let mut totals = AccumulatorArena::<3>::new(&layout);
        for arena in &partials {
            totals.merge(arena);
        }

        let centers: Vec<Vec<ClusterInfo<3>>> = (0..self.num_categories)
            .map(|category| {
                totals
                    .category(category)
                    .iter()
                    .enumerate()
                    .filter_map(|(j, acc)| ClusterInfo::from_accumulator(j, acc))
                    .collect()
            })
            .collect();

        let population = totals.total_size();
        log::info!(
            "{} initial clusters from {} pixels",
            centers.iter().map(|c| c.len()).sum::<usize>(),
            population
        );
        Ok((centers, population))
    }
}

impl<S: MatrixSource<3>> PolClassifier for GeneralWishart<S> {
    fn num_classes(&self) -> u32 {
        (self.num_categories * self.num_initial_clusters + 1) as u32
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

        let mut labels = LabelImage::zeros((region.height, region.width));
        for (x, y) in region.pixels() {
            labels[[y - region.y, x - region.x]] =
                pixel_label(&model.assignments[[y, x]], &model.colour_map);
        }
        Ok(labels)
    }

    fn build_label_metadata(&self) -> LabelCoding {
        let names = self.decomposition.category_names();
        let descriptions = self.decomposition.category_descriptions();

        let mut coding = LabelCoding::new("Cluster_classes");
        for category in 0..self.num_categories {
            for j in 1..=self.num_initial_clusters {
                coding.add(
                    (category * self.num_initial_clusters + j) as u32,
                    format!("{}_{}", names[category], j),
                    format!("{} {}", descriptions[category], j),
                );
            }
        }
        coding
    }
}
