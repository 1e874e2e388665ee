//! Cluster accumulators and immutable cluster-centre snapshots.

use super::matrix::{HermitianMatrix, HermitianOps};

/// Running sum of Hermitian samples with a sample count
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClusterCenter<const N: usize> {
    sum: HermitianMatrix<N>,
    size: usize,
}

impl<const N: usize> ClusterCenter<N> {
    pub fn new() -> Self {
        Self {
            sum: HermitianMatrix::zeros(),
            size: 0,
        }
    }

    pub fn add_sample(&mut self, sample: &HermitianMatrix<N>) {
        self.sum += sample;
        self.size += 1;
    }

    /// Fold another accumulator into this one
    pub fn absorb(&mut self, other: &Self) {
        self.sum += &other.sum;
        self.size += other.size;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Mean matrix, or `None` when no sample was accumulated
    pub fn mean(&self) -> Option<HermitianMatrix<N>> {
        if self.size == 0 {
            None
        } else {
            Some(self.sum.scaled(1.0 / self.size as f64))
        }
    }
}

/// Cluster centre prepared for fast Wishart distance evaluation.
///
/// The inverse and log-determinant are derived from the mean in the
/// constructor and the fields are private, so they can never disagree.
/// A new snapshot replaces the old one whenever the centre moves.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInfo<const N: usize> {
    index: usize,
    size: usize,
    center: HermitianMatrix<N>,
    inverse: HermitianMatrix<N>,
    log_det: f64,
}

impl<const N: usize> ClusterInfo<N>
where
    HermitianMatrix<N>: HermitianOps,
{
    pub fn new(index: usize, center: HermitianMatrix<N>, size: usize) -> Self {
        let inverse = center.inverse();
        let log_det = center.determinant().ln();
        Self {
            index,
            size,
            center,
            inverse,
            log_det,
        }
    }

    /// Snapshot of an accumulator; `None` for an empty accumulator
    pub fn from_accumulator(index: usize, acc: &ClusterCenter<N>) -> Option<Self> {
        acc.mean().map(|center| Self::new(index, center, acc.size()))
    }

    /// Wishart distance from `sample` to this centre (lower is closer)
    pub fn wishart_distance(&self, sample: &HermitianMatrix<N>) -> f64 {
        wishart_distance(sample, self)
    }
}

impl<const N: usize> ClusterInfo<N> {
    /// Zone or cluster index this centre was created for
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn center(&self) -> &HermitianMatrix<N> {
        &self.center
    }

    pub fn inverse(&self) -> &HermitianMatrix<N> {
        &self.inverse
    }

    pub fn log_det(&self) -> f64 {
        self.log_det
    }
}

/// `tr(inv(center) * sample) + ln|det(center)|`
pub fn wishart_distance<const N: usize>(sample: &HermitianMatrix<N>, info: &ClusterInfo<N>) -> f64 {
    info.inverse.trace_product(sample) + info.log_det
}

/// Index of the nearest centre by Wishart distance, with its distance.
/// The first centre wins on equal distances.
pub fn find_closest_cluster<const N: usize>(
    sample: &HermitianMatrix<N>,
    centers: &[ClusterInfo<N>],
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (c, info) in centers.iter().enumerate() {
        let d = wishart_distance(sample, info);
        if best.map_or(true, |(_, min)| d < min) {
            best = Some((c, d));
        }
    }
    best
}

/// Accumulators indexed by (category, cluster)
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorArena<const N: usize> {
    cells: Vec<Vec<ClusterCenter<N>>>,
}

impl<const N: usize> AccumulatorArena<N> {
    /// Arena with `clusters_per_category[c]` accumulators in category `c`
    pub fn new(clusters_per_category: &[usize]) -> Self {
        Self {
            cells: clusters_per_category
                .iter()
                .map(|&n| vec![ClusterCenter::new(); n])
                .collect(),
        }
    }

    /// Arena with the same layout as a set of centre lists
    pub fn shaped_like(centers: &[Vec<ClusterInfo<N>>]) -> Self {
        let layout: Vec<usize> = centers.iter().map(|list| list.len()).collect();
        Self::new(&layout)
    }

    pub fn accumulate(&mut self, category: usize, cluster: usize, sample: &HermitianMatrix<N>) {
        self.cells[category][cluster].add_sample(sample);
    }

    /// Fold a partial arena with identical layout into this one
    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.cells.iter_mut().zip(&other.cells) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                a.absorb(b);
            }
        }
    }

    pub fn get(&self, category: usize, cluster: usize) -> &ClusterCenter<N> {
        &self.cells[category][cluster]
    }

    pub fn category(&self, category: usize) -> &[ClusterCenter<N>] {
        &self.cells[category]
    }

    pub fn num_categories(&self) -> usize {
        self.cells.len()
    }

    pub fn total_size(&self) -> usize {
        self.cells.iter().flatten().map(|c| c.size()).sum()
    }
}
