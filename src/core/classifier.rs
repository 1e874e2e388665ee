//! Classifier surface shared by the Wishart classifiers and the lazily
//! computed cluster model behind it.

use super::labels::LabelCoding;
use super::tiling::{CancellationToken, NullProgress, TileScheduler};
use crate::types::{LabelImage, SarError, SarResult, TileRect};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// An unsupervised classifier producing one integer class band
pub trait PolClassifier: Sync {
    /// Output label count, including the no-data label 0
    fn num_classes(&self) -> u32;

    fn class_band_name(&self) -> &str;

    /// Scene size as (width, height)
    fn scene_size(&self) -> (usize, usize);

    fn tile_size(&self) -> usize;

    /// Run the full-scene clustering if it has not run yet
    fn prepare(&self) -> SarResult<()>;

    /// Labels of one output rectangle; triggers the clustering on first use
    fn compute_tile(&self, region: TileRect) -> SarResult<LabelImage>;

    fn build_label_metadata(&self) -> LabelCoding;

    /// Labels of the whole scene, computed tile by tile
    fn classify(&self) -> SarResult<LabelImage> {
        self.prepare()?;

        let (width, height) = self.scene_size();
        let scheduler = TileScheduler::new(width, height, self.tile_size())?;
        let tiles = scheduler.run(
            self.class_band_name(),
            &CancellationToken::new(),
            &NullProgress,
            |region| self.compute_tile(region),
        )?;

        let mut labels = LabelImage::zeros((height, width));
        for (region, tile) in scheduler.tiles().iter().zip(tiles) {
            for ((dy, dx), &label) in tile.indexed_iter() {
                labels[[region.y + dy, region.x + dx]] = label;
            }
        }
        Ok(labels)
    }
}

/// Reject output regions reaching outside the scene
pub(crate) fn check_region(region: &TileRect, width: usize, height: usize) -> SarResult<()> {
    if region.x_end() > width || region.y_end() > height {
        return Err(SarError::Processing(format!(
            "Region {:?} outside {}x{} scene",
            region, width, height
        )));
    }
    Ok(())
}

/// Lifecycle of the cluster model of one classifier
#[derive(Debug)]
pub enum ClusterState<M> {
    Uninitialized,
    Computing,
    Ready(Arc<M>),
    /// Sticky: every later caller gets the same error
    Failed(SarError),
}

/// Compute-once cell for the cluster model.
///
/// The first caller computes while concurrent callers block until the state
/// leaves `Computing`.
#[derive(Debug)]
pub struct LazyClusters<M> {
    state: Mutex<ClusterState<M>>,
    changed: Condvar,
}

impl<M> Default for LazyClusters<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> LazyClusters<M> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClusterState::Uninitialized),
            changed: Condvar::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), ClusterState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.state.lock(), ClusterState::Failed(_))
    }

    pub fn get_or_compute<F>(&self, compute: F) -> SarResult<Arc<M>>
    where
        F: FnOnce() -> SarResult<M>,
    {
        {
            let mut state = self.state.lock();
            loop {
                match &*state {
                    ClusterState::Ready(model) => return Ok(Arc::clone(model)),
                    ClusterState::Failed(e) => return Err(e.clone()),
                    ClusterState::Uninitialized => break,
                    ClusterState::Computing => {}
                }
                self.changed.wait(&mut state);
            }
            *state = ClusterState::Computing;
        }

        let outcome = catch_unwind(AssertUnwindSafe(compute)).unwrap_or_else(|_| {
            Err(SarError::Worker {
                stage: "cluster centre computation".to_string(),
                message: "clustering panicked".to_string(),
            })
        });

        let mut state = self.state.lock();
        let result = match outcome {
            Ok(model) => {
                let model = Arc::new(model);
                *state = ClusterState::Ready(Arc::clone(&model));
                Ok(model)
            }
            Err(e) => {
                log::error!("Cluster computation failed: {}", e);
                *state = ClusterState::Failed(e.clone());
                Err(e)
            }
        };
        self.changed.notify_all();
        result
    }
}
