//! Output label numbering and the categorical legend of the class band.

use super::refine::{AssignmentMap, PixelAssignment};
use crate::types::NO_DATA_CLASS;
use ndarray::Array2;

/// One legend entry of the class band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub index: u32,
    pub name: String,
    pub description: String,
}

/// Ordered index to name table for the class band; index 0 is "no data"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCoding {
    name: String,
    entries: Vec<LabelEntry>,
}

impl LabelCoding {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: vec![LabelEntry {
                index: NO_DATA_CLASS,
                name: "no data".to_string(),
                description: "no data".to_string(),
            }],
        }
    }

    pub fn add(&mut self, index: u32, name: impl Into<String>, description: impl Into<String>) {
        self.entries.push(LabelEntry {
            index,
            name: name.into(),
            description: description.into(),
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, index: u32) -> Option<&LabelEntry> {
        self.entries.iter().find(|e| e.index == index)
    }
}

/// Rank of each cluster when ordered by descending average power.
/// Equal powers keep cluster order.
pub fn power_ranks(average_power: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..average_power.len()).collect();
    order.sort_by(|&a, &b| average_power[b].total_cmp(&average_power[a]));

    let mut ranks = vec![0; average_power.len()];
    for (rank, cluster) in order.into_iter().enumerate() {
        ranks[cluster] = rank;
    }
    ranks
}

/// Output label of every (category, cluster) of the final clustering.
///
/// Average power is the summed recorded power of a cluster's pixels over its
/// final pixel count. Within a category clusters are numbered by descending
/// average power: `category * num_initial_clusters + rank + 1`.
pub fn colour_index_map(
    assignments: &AssignmentMap,
    power: &Array2<f64>,
    clusters_per_category: &[usize],
    num_initial_clusters: usize,
) -> Vec<Vec<u32>> {
    let mut sums: Vec<Vec<f64>> = clusters_per_category.iter().map(|&n| vec![0.0; n]).collect();
    let mut counts: Vec<Vec<usize>> = clusters_per_category.iter().map(|&n| vec![0; n]).collect();

    for (assignment, p) in assignments.iter().zip(power.iter()) {
        if let Some((category, cluster)) = assignment.cluster_key() {
            sums[category][cluster] += p;
            counts[category][cluster] += 1;
        }
    }

    sums.iter()
        .zip(&counts)
        .enumerate()
        .map(|(category, (sum, count))| {
            let average: Vec<f64> = sum
                .iter()
                .zip(count)
                .map(|(s, &n)| if n > 0 { s / n as f64 } else { 0.0 })
                .collect();
            power_ranks(&average)
                .into_iter()
                .map(|rank| (category * num_initial_clusters + rank + 1) as u32)
                .collect()
        })
        .collect()
}

/// Final label of one pixel from its assignment
pub fn pixel_label(assignment: &PixelAssignment, colour_map: &[Vec<u32>]) -> u32 {
    assignment
        .cluster_key()
        .and_then(|(category, cluster)| colour_map.get(category)?.get(cluster).copied())
        .unwrap_or(NO_DATA_CLASS)
}
