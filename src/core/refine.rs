//! Batch K-means style refinement of cluster centres by Wishart distance.
//!
//! Each iteration assigns every valid pixel to its nearest centre using the
//! centres of the previous iteration, accumulates per-tile partial sums, and
//! only after the barrier replaces the centres with the new means.

use super::cluster::{find_closest_cluster, AccumulatorArena, ClusterInfo};
use super::matrix::{HermitianMatrix, HermitianOps};
use super::tiling::{CancellationToken, ProgressMonitor, TileScheduler};
use crate::io::pol_source::MatrixSource;
use crate::types::SarResult;
use ndarray::Array2;

/// Clustering state of one pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelAssignment {
    /// No-data or invalid sample; never clustered
    #[default]
    Invalid,
    /// Valid pixel with no dominant category yet
    Mixed,
    /// Category fixed by dominance; only the cluster moves
    Fixed { category: usize, cluster: usize },
    /// Started mixed; the category is re-decided on every iteration
    Floating { category: usize, cluster: usize },
}

impl PixelAssignment {
    /// (category, cluster) once the pixel belongs to a cluster
    pub fn cluster_key(&self) -> Option<(usize, usize)> {
        match *self {
            PixelAssignment::Fixed { category, cluster }
            | PixelAssignment::Floating { category, cluster } => Some((category, cluster)),
            PixelAssignment::Invalid | PixelAssignment::Mixed => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, PixelAssignment::Invalid)
    }
}

/// Per-pixel assignment raster of a scene (rows x columns)
pub type AssignmentMap = Array2<PixelAssignment>;

/// Nearest (category, cluster) over every category; the first category
/// wins on equal distances.
pub fn nearest_category_cluster<const N: usize>(
    sample: &HermitianMatrix<N>,
    centers: &[Vec<ClusterInfo<N>>],
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for (category, list) in centers.iter().enumerate() {
        if let Some((cluster, d)) = find_closest_cluster(sample, list) {
            if best.map_or(true, |(_, _, min)| d < min) {
                best = Some((category, cluster, d));
            }
        }
    }
    best.map(|(category, cluster, _)| (category, cluster))
}

/// Refinement loop settings and the execution context it runs in
pub struct Refinement<'a> {
    pub scheduler: &'a TileScheduler,
    pub cancel: &'a CancellationToken,
    pub progress: &'a dyn ProgressMonitor,
    pub half_window: usize,
    pub max_iterations: usize,
}

impl<'a> Refinement<'a> {
    /// Refine `centers` in place and update `assignments` to the final pass.
    ///
    /// Returns the number of iterations run. Stops early when an iteration
    /// leaves every centre bit-identical.
    pub fn run<S, const N: usize>(
        &self,
        source: &S,
        centers: &mut [Vec<ClusterInfo<N>>],
        assignments: &mut AssignmentMap,
    ) -> SarResult<usize>
    where
        S: MatrixSource<N>,
        HermitianMatrix<N>: HermitianOps,
    {
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            let stage = format!("Refinement iteration {}", iterations);

            let current: &[Vec<ClusterInfo<N>>] = centers;
            let snapshot: &AssignmentMap = assignments;
            let partials = self.scheduler.run(&stage, self.cancel, self.progress, |tile| {
                let mut arena = AccumulatorArena::shaped_like(current);
                let mut updates = Vec::with_capacity(tile.area());

                for (x, y) in tile.pixels() {
                    let previous = snapshot[[y, x]];
                    if !previous.is_valid() {
                        continue;
                    }
                    if !source.is_valid_sample(x, y) {
                        updates.push((x, y, PixelAssignment::Invalid));
                        continue;
                    }
                    let sample = source.window_mean(x, y, self.half_window);

                    let next = match previous {
                        PixelAssignment::Fixed { category, .. } => {
                            find_closest_cluster(&sample, &current[category])
                                .map(|(cluster, _)| PixelAssignment::Fixed { category, cluster })
                        }
                        _ => nearest_category_cluster(&sample, current)
                            .map(|(category, cluster)| PixelAssignment::Floating { category, cluster }),
                    };

                    if let Some(assignment) = next {
                        if let Some((category, cluster)) = assignment.cluster_key() {
                            arena.accumulate(category, cluster, &sample);
                        }
                        updates.push((x, y, assignment));
                    }
                }
                Ok((arena, updates))
            })?;

            let mut totals = AccumulatorArena::shaped_like(centers);
            for (arena, updates) in &partials {
                totals.merge(arena);
                for &(x, y, assignment) in updates {
                    assignments[[y, x]] = assignment;
                }
            }

            let mut delta = 0.0;
            for (category, list) in centers.iter_mut().enumerate() {
                for (cluster, info) in list.iter_mut().enumerate() {
                    let acc = totals.get(category, cluster);
                    if let Some(updated) = ClusterInfo::from_accumulator(info.index(), acc) {
                        delta += info.center().squared_difference(updated.center());
                        *info = updated;
                    }
                }
            }

            log::debug!("{}: centre change {:e}", stage, delta);
            if delta == 0.0 {
                log::info!("Cluster centres converged after {} iterations", iterations);
                break;
            }
        }

        Ok(iterations)
    }
}
