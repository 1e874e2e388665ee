//! Polarimetric Wishart classification core

pub mod matrix;
pub mod cluster;
pub mod decomposition;
pub mod tiling;
pub mod merge;
pub mod refine;
pub mod labels;
pub mod config;
pub mod classifier;
pub mod h_alpha;
pub mod cloude_pottier;
pub mod general_wishart;

// Re-export main types
pub use matrix::{HermitianMatrix, HermitianOps, C2, T3, EPS, c3_to_t3, t3_to_c3};
pub use cluster::{ClusterCenter, ClusterInfo, AccumulatorArena, wishart_distance, find_closest_cluster};
pub use decomposition::{Decomposition, PowerEvaluator, CategoryPowers, HAAlpha, h_a_alpha};
pub use tiling::{TileScheduler, CancellationToken, ProgressMonitor, NullProgress, LogProgress};
pub use merge::{MergeCandidate, merge_to_target};
pub use refine::{PixelAssignment, AssignmentMap, Refinement};
pub use labels::{LabelCoding, LabelEntry};
pub use config::WishartConfig;
pub use classifier::{PolClassifier, ClusterState, LazyClusters};
pub use h_alpha::{HAlphaPlane, HAlphaWishart, HAlphaModel};
pub use cloude_pottier::CloudePottier;
pub use general_wishart::{GeneralWishart, GeneralModel};
