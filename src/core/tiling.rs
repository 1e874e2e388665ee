//! Tile partitioning and fork-join execution of per-tile work.
//!
//! Every stage of the classifiers runs as one pass over the scene tiles. The
//! pass blocks until all tiles finish, and results come back in tile order no
//! matter which worker ran which tile, so reductions over them are
//! deterministic.

use crate::types::{SarError, SarResult, TileRect};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the caller and the workers
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is raised
    pub fn check(&self, stage: &str) -> SarResult<()> {
        if self.is_cancelled() {
            Err(SarError::Cancelled {
                stage: stage.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Receiver of per-tile progress updates
pub trait ProgressMonitor: Send + Sync {
    fn begin(&self, stage: &str, total: usize);
    fn worked(&self, units: usize);
    fn done(&self);
}

/// Progress sink that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressMonitor for NullProgress {
    fn begin(&self, _stage: &str, _total: usize) {}
    fn worked(&self, _units: usize) {}
    fn done(&self) {}
}

/// Progress sink that logs every tenth of a stage
#[derive(Debug, Default)]
pub struct LogProgress {
    stage: Mutex<String>,
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressMonitor for LogProgress {
    fn begin(&self, stage: &str, total: usize) {
        *self.stage.lock() = stage.to_string();
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        log::info!("{}: {} tiles", stage, total);
    }

    fn worked(&self, units: usize) {
        let total = self.total.load(Ordering::SeqCst).max(1);
        let before = self.completed.fetch_add(units, Ordering::SeqCst);
        let after = before + units;
        if before * 10 / total != after * 10 / total {
            log::info!(
                "{}: {}%",
                self.stage.lock(),
                (after * 100 / total).min(100)
            );
        }
    }

    fn done(&self) {
        log::debug!("{}: done", self.stage.lock());
    }
}

/// Fixed partition of a scene into rectangular tiles
#[derive(Debug, Clone)]
pub struct TileScheduler {
    width: usize,
    height: usize,
    tile_size: usize,
    tiles: Vec<TileRect>,
}

impl TileScheduler {
    pub fn new(width: usize, height: usize, tile_size: usize) -> SarResult<Self> {
        if tile_size == 0 {
            return Err(SarError::InvalidConfig("Tile size must be positive".to_string()));
        }

        let mut tiles = Vec::new();
        for y in (0..height).step_by(tile_size) {
            for x in (0..width).step_by(tile_size) {
                tiles.push(TileRect::new(
                    x,
                    y,
                    tile_size.min(width - x),
                    tile_size.min(height - y),
                ));
            }
        }

        log::debug!(
            "Tiling {}x{} scene into {} tiles of {} pixels",
            width,
            height,
            tiles.len(),
            tile_size
        );

        Ok(Self {
            width,
            height,
            tile_size,
            tiles,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn tiles(&self) -> &[TileRect] {
        &self.tiles
    }

    /// Run `work` on every tile and wait for all of them.
    ///
    /// Cancellation is checked before each tile starts. A panicking worker
    /// becomes a `Worker` error for the stage; the first failure in tile order
    /// is returned and all partial results are dropped.
    pub fn run<T, F>(
        &self,
        stage: &str,
        cancel: &CancellationToken,
        progress: &dyn ProgressMonitor,
        work: F,
    ) -> SarResult<Vec<T>>
    where
        T: Send,
        F: Fn(TileRect) -> SarResult<T> + Sync,
    {
        progress.begin(stage, self.tiles.len());

        let run_tile = |tile: TileRect| -> SarResult<T> {
            cancel.check(stage)?;
            let result = catch_unwind(AssertUnwindSafe(|| work(tile))).unwrap_or_else(|payload| {
                Err(SarError::Worker {
                    stage: stage.to_string(),
                    message: panic_message(payload.as_ref()),
                })
            });
            progress.worked(1);
            result
        };

        let results = self.dispatch(&run_tile);
        progress.done();

        let outputs = results.into_iter().collect::<SarResult<Vec<T>>>();
        if let Err(e) = &outputs {
            log::error!("{} failed: {}", stage, e);
        }
        // a late cancellation still invalidates the pass
        cancel.check(stage)?;
        outputs
    }

    #[cfg(feature = "parallel")]
    fn dispatch<T, F>(&self, run_tile: &F) -> Vec<SarResult<T>>
    where
        T: Send,
        F: Fn(TileRect) -> SarResult<T> + Sync,
    {
        use rayon::prelude::*;

        self.tiles.par_iter().map(|tile| run_tile(*tile)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch<T, F>(&self, run_tile: &F) -> Vec<SarResult<T>>
    where
        T: Send,
        F: Fn(TileRect) -> SarResult<T> + Sync,
    {
        self.tiles.iter().map(|tile| run_tile(*tile)).collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiles_cover_scene_exactly() {
        let scheduler = TileScheduler::new(10, 7, 4).unwrap();
        assert_eq!(scheduler.tiles().len(), 6);

        let mut hits = vec![0u8; 70];
        for tile in scheduler.tiles() {
            for (x, y) in tile.pixels() {
                hits[y * 10 + x] += 1;
            }
        }
        assert!(hits.iter().all(|&h| h == 1));

        let last = scheduler.tiles().last().unwrap();
        assert_eq!((last.x, last.y, last.width, last.height), (8, 4, 2, 3));
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        assert!(matches!(
            TileScheduler::new(10, 10, 0),
            Err(SarError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_results_in_tile_order() {
        let scheduler = TileScheduler::new(64, 64, 8).unwrap();
        let out = scheduler
            .run("order", &CancellationToken::new(), &NullProgress, |tile| {
                Ok((tile.x, tile.y))
            })
            .unwrap();
        let expected: Vec<_> = scheduler.tiles().iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_cancelled_before_start() {
        let scheduler = TileScheduler::new(16, 16, 4).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = scheduler.run("refine", &cancel, &NullProgress, |_| Ok(()));
        match result {
            Err(SarError::Cancelled { stage }) => assert_eq!(stage, "refine"),
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_mid_pass() {
        let scheduler = TileScheduler::new(32, 32, 4).unwrap();
        let cancel = CancellationToken::new();
        let result = scheduler.run("phase", &cancel, &NullProgress, |tile| {
            if tile.x == 8 && tile.y == 8 {
                cancel.cancel();
            }
            Ok(tile.area())
        });
        assert!(matches!(result, Err(SarError::Cancelled { .. })));
    }

    #[test]
    fn test_worker_panic_is_aggregated() {
        let scheduler = TileScheduler::new(8, 8, 4).unwrap();
        let result: SarResult<Vec<()>> =
            scheduler.run("centres", &CancellationToken::new(), &NullProgress, |tile| {
                if tile.x == 4 {
                    panic!("bad tile");
                }
                Ok(())
            });
        match result {
            Err(SarError::Worker { stage, message }) => {
                assert_eq!(stage, "centres");
                assert!(message.contains("bad tile"));
            }
            other => panic!("expected worker failure, got {:?}", other),
        }
    }

    #[test]
    fn test_log_progress_counts() {
        let progress = LogProgress::new();
        let scheduler = TileScheduler::new(20, 20, 5).unwrap();
        scheduler
            .run("count", &CancellationToken::new(), &progress, |_| Ok(()))
            .unwrap();
        assert_eq!(progress.completed.load(Ordering::SeqCst), 16);
    }
}
