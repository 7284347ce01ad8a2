// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Render-loop driver for the adaptive scheduler.

use crate::error::Result;
use crate::scheduler::AdaptiveScheduler;
use crate::state::ChooseOutcome;

/// A transition performed at the end of a wend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WendTransition {
    /// Pieces were split; carries the number of splits.
    Refined(usize),
    /// Sibling groups were merged; carries the number of merges.
    Coarsened(usize),
}

/// The result of one render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PassReport {
    /// A pass ran.
    Pass {
        /// What the scheduler selected.
        outcome: ChooseOutcome,
        /// Transitions performed during this pass, in order.
        transitions: Vec<WendTransition>,
    },
    /// Nothing is worth refining; the driver waits for a reset or a coarsen request.
    Idle,
}

/// Counters accumulated by the driver since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Render passes run.
    pub passes: usize,
    /// Wends started.
    pub wends: usize,
    /// Passes that produced a piece.
    pub pieces_rendered: usize,
    /// Chosen pieces that were already cached.
    pub cache_hits: usize,
    /// Passes served from the append aggregate.
    pub append_hits: usize,
    /// Total splits performed.
    pub splits: usize,
    /// Total sibling groups merged by coarsening.
    pub merges: usize,
}

/// Drives an [`AdaptiveScheduler`] through its per-pass protocol.
pub struct StreamingDriver<D> {
    scheduler: AdaptiveScheduler<D>,
    start_of_wend: bool,
    coarsen_requested: bool,
    stats: DriverStats,
}

impl<D> StreamingDriver<D> {
    /// Takes ownership of a configured scheduler.
    pub fn new(scheduler: AdaptiveScheduler<D>) -> Self {
        Self {
            scheduler,
            start_of_wend: true,
            coarsen_requested: false,
            stats: DriverStats::default(),
        }
    }

    /// The driven scheduler.
    pub fn scheduler(&self) -> &AdaptiveScheduler<D> {
        &self.scheduler
    }

    /// Mutable access to the driven scheduler.
    pub fn scheduler_mut(&mut self) -> &mut AdaptiveScheduler<D> {
        &mut self.scheduler
    }

    /// Counters since the last reset.
    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Restarts the sweep, e.g. after the camera moved.
    pub fn reset(&mut self) {
        self.scheduler.clear_priorities();
        self.start_of_wend = true;
        self.coarsen_requested = false;
        self.stats = DriverStats::default();
    }

    /// Coarsens instead of refining at the next wend boundary.
    ///
    /// When the driver is idle the request is honored on the next pass.
    pub fn request_coarsen(&mut self) {
        self.coarsen_requested = true;
    }

    /// Runs one render pass.
    pub fn render_pass(&mut self) -> Result<PassReport> {
        let mut transitions = Vec::new();

        if self.scheduler.is_all_done() {
            if !std::mem::take(&mut self.coarsen_requested) {
                return Ok(PassReport::Idle);
            }
            transitions.push(self.coarsen()?);
            self.start_of_wend = true;
        }

        if self.start_of_wend {
            self.scheduler.prepare_first_pass()?;
            self.start_of_wend = false;
            self.stats.wends += 1;
        } else {
            self.scheduler.prepare_another_pass();
        }

        let outcome = self.scheduler.choose_next_piece()?;
        self.stats.passes += 1;
        if outcome.chosen.is_some() {
            self.stats.pieces_rendered += 1;
        }
        if outcome.from_append {
            self.stats.append_hits += 1;
        } else if outcome.hit {
            self.stats.cache_hits += 1;
        }

        self.scheduler.finish_pass();

        if outcome.wend_just_ended {
            self.start_of_wend = true;
            if !self.scheduler.is_all_done() {
                let transition = if std::mem::take(&mut self.coarsen_requested) {
                    self.coarsen()?
                } else {
                    let splits = self.scheduler.refine()?;
                    self.stats.splits += splits;
                    WendTransition::Refined(splits)
                };
                transitions.push(transition);
            }
        }

        Ok(PassReport::Pass {
            outcome,
            transitions,
        })
    }

    /// Runs passes until the driver is idle or `max_passes` have run.
    pub fn run_to_completion(&mut self, max_passes: usize) -> Result<DriverStats> {
        for _ in 0..max_passes {
            if self.render_pass()? == PassReport::Idle {
                break;
            }
        }
        if !self.scheduler.is_all_done() {
            log::warn!("StreamingDriver: stopped after {max_passes} passes with work left");
        }
        Ok(self.stats)
    }

    fn coarsen(&mut self) -> Result<WendTransition> {
        let merges = self.scheduler.coarsen()?;
        self.stats.merges += merges;
        Ok(WendTransition::Coarsened(merges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_core::{
        MemoryPieceCache, PieceCache, SharedPieceCache, StreamingOptions, StreamingPipeline,
    };

    /// Every piece is worth 1.0; data is the global piece index.
    struct FlatPipeline(u32);

    impl StreamingPipeline for FlatPipeline {
        type Data = u32;

        fn set_update_extent(&mut self, piece: u32, _num_pieces: u32, _ghost_level: u32) {
            self.0 = piece;
        }

        fn set_update_resolution(&mut self, _resolution: f64) {}

        fn compute_priority(&mut self) -> f64 {
            1.0
        }

        fn update(&mut self) -> Option<Arc<u32>> {
            Some(Arc::new(self.0))
        }
    }

    fn driver(height: u32) -> StreamingDriver<u32> {
        let mut scheduler = AdaptiveScheduler::new();
        scheduler.set_pipeline(FlatPipeline(0));
        scheduler.set_cache(SharedPieceCache::new(MemoryPieceCache::new(
            |parts: &[Arc<u32>]| parts.len() as u32,
        )));
        scheduler
            .set_options_provider(StreamingOptions {
                height,
                ..Default::default()
            })
            .unwrap();
        StreamingDriver::new(scheduler)
    }

    #[test]
    fn test_first_pass_renders_root_and_refines() {
        let mut driver = driver(2);
        let report = driver.render_pass().unwrap();
        match report {
            PassReport::Pass {
                outcome,
                transitions,
            } => {
                assert_eq!(outcome.chosen.map(|p| p.num_pieces), Some(1));
                assert_eq!(transitions, vec![WendTransition::Refined(1)]);
            }
            PassReport::Idle => panic!("driver should not be idle on the first pass"),
        }
        assert_eq!(driver.scheduler().to_do().len(), 2);
    }

    #[test]
    fn test_full_sweep_reaches_idle() {
        let mut driver = driver(2);
        let stats = driver.run_to_completion(100).unwrap();

        assert!(driver.scheduler().is_all_done());
        assert_eq!(driver.render_pass().unwrap(), PassReport::Idle);
        // Root at 0.0, two halves at 0.5, four quarters at full resolution.
        assert_eq!(stats.wends, 3);
        assert_eq!(stats.pieces_rendered, 7);
        assert_eq!(stats.splits, 3);
    }

    #[test]
    fn test_coarsen_request_wakes_idle_driver() {
        let mut driver = driver(2);
        driver.run_to_completion(100).unwrap();

        driver.request_coarsen();
        let report = driver.render_pass().unwrap();
        let PassReport::Pass { transitions, .. } = report else {
            panic!("coarsen request should resume the driver");
        };
        assert_eq!(transitions.first(), Some(&WendTransition::Coarsened(2)));
        assert_eq!(driver.stats().merges, 2);
    }

    #[test]
    fn test_reset_restarts_from_root() {
        let mut driver = driver(2);
        driver.run_to_completion(100).unwrap();
        driver.reset();

        assert!(!driver.scheduler().is_all_done());
        assert_eq!(driver.stats(), DriverStats::default());
        assert_eq!(driver.scheduler().to_do().len(), 1);
    }

    #[test]
    fn test_second_wend_starts_with_append_aggregate() {
        let mut driver = driver(4);
        driver.render_pass().unwrap();
        // Seed the cache so the append slot is non-empty for the next wend.
        let mut cache = SharedPieceCache::new(MemoryPieceCache::new(|parts: &[Arc<u32>]| {
            parts.len() as u32
        }));
        let root = tessera_core::GlobalPiece {
            piece: 0,
            num_pieces: 1,
        };
        cache.lock().insert(root, 0.0, Arc::new(7));
        cache.append_pieces();
        driver.scheduler_mut().set_cache(cache);

        let PassReport::Pass { outcome, .. } = driver.render_pass().unwrap() else {
            panic!("driver should not be idle");
        };
        assert!(outcome.from_append);
        assert_eq!(driver.stats().append_hits, 1);
    }
}
