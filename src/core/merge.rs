//! Greedy agglomerative merging of per-category cluster lists down to a
//! target total cluster count.

use super::cluster::ClusterInfo;
use super::matrix::{HermitianMatrix, HermitianOps};

/// Categories holding this many clusters or fewer are never merged further
pub const MIN_CLUSTERS_TO_MERGE: usize = 3;

/// Closest pair of clusters found in one category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeCandidate {
    pub first: usize,
    pub second: usize,
    pub distance: f64,
    pub combined_size: usize,
}

/// Closest pair of clusters in one category by Wishart distance, measured from
/// the first centre to the second. Clusters at or above `max_cluster_size` are
/// not eligible; on equal distances the earliest pair wins.
pub fn closest_pair<const N: usize>(
    clusters: &[ClusterInfo<N>],
    max_cluster_size: usize,
) -> Option<MergeCandidate>
where
    HermitianMatrix<N>: HermitianOps,
{
    if clusters.len() <= MIN_CLUSTERS_TO_MERGE {
        return None;
    }

    let mut best: Option<MergeCandidate> = None;
    for (i, a) in clusters.iter().enumerate() {
        if a.size() >= max_cluster_size {
            continue;
        }
        for (j, b) in clusters.iter().enumerate().skip(i + 1) {
            if b.size() >= max_cluster_size {
                continue;
            }
            let d = b.wishart_distance(a.center());
            if best.map_or(true, |c| d < c.distance) {
                best = Some(MergeCandidate {
                    first: i,
                    second: j,
                    distance: d,
                    combined_size: a.size() + b.size(),
                });
            }
        }
    }
    best
}

/// Pick the category to merge from per-category candidates.
///
/// All categories whose distance is within `<=` of the global minimum are
/// tied; among them the smallest combined pair size wins, then the lowest
/// category index.
pub fn category_to_merge(candidates: &[Option<MergeCandidate>]) -> Option<usize> {
    let shortest = candidates
        .iter()
        .flatten()
        .map(|c| c.distance)
        .fold(f64::MAX, f64::min);

    let mut chosen: Option<(usize, usize)> = None;
    for (category, candidate) in candidates.iter().enumerate() {
        let Some(c) = candidate else { continue };
        if c.distance <= shortest && chosen.map_or(true, |(_, size)| c.combined_size < size) {
            chosen = Some((category, c.combined_size));
        }
    }
    chosen.map(|(category, _)| category)
}

/// Replace two clusters with their size-weighted union, appended at the end
pub fn merge_pair<const N: usize>(clusters: &mut Vec<ClusterInfo<N>>, first: usize, second: usize)
where
    HermitianMatrix<N>: HermitianOps,
{
    let (lo, hi) = if first < second { (first, second) } else { (second, first) };
    let b = clusters.remove(hi);
    let a = clusters.remove(lo);

    let center = HermitianMatrix::weighted_mean(a.center(), a.size() as f64, b.center(), b.size() as f64);
    let index = clusters.len();
    clusters.push(ClusterInfo::new(index, center, a.size() + b.size()));
}

/// Merge clusters across categories until `target` remain in total.
///
/// Returns the number of merges performed. Stops early with a warning when
/// no category has an eligible pair left.
pub fn merge_to_target<const N: usize>(
    categories: &mut [Vec<ClusterInfo<N>>],
    target: usize,
    max_cluster_size: usize,
) -> usize
where
    HermitianMatrix<N>: HermitianOps,
{
    let mut total: usize = categories.iter().map(|c| c.len()).sum();
    let mut merges = 0;

    while total > target {
        let candidates: Vec<Option<MergeCandidate>> = categories
            .iter()
            .map(|clusters| closest_pair(clusters, max_cluster_size))
            .collect();

        let Some(category) = category_to_merge(&candidates) else {
            log::warn!(
                "No mergeable cluster pair left; stopping at {} clusters instead of {}",
                total,
                target
            );
            break;
        };

        if let Some(c) = candidates[category] {
            log::debug!(
                "Merging clusters {} and {} of category {} (distance {:.4}, size {})",
                c.first,
                c.second,
                category,
                c.distance,
                c.combined_size
            );
            merge_pair(&mut categories[category], c.first, c.second);
        }
        total -= 1;
        merges += 1;
    }

    merges
}
