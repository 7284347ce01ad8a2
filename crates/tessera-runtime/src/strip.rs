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

//! A synthetic one-dimensional data set.
//!
//! The unit interval is cut into `num_pieces` equal spans. A piece is worth
//! more the closer its span lies to a movable focus point, and computing it
//! yields a strip of samples whose density grows with the resolution.

use std::sync::{Arc, PoisonError, RwLock};
use tessera_core::StreamingPipeline;

/// Samples produced for a span at full resolution.
const MAX_SAMPLES: usize = 1024;

/// Computed data for one or more spans of the interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Strip {
    /// Left edge of the covered range.
    pub start: f64,
    /// Right edge of the covered range.
    pub end: f64,
    /// Total samples held.
    pub samples: usize,
}

impl Strip {
    /// Folds several strips into one covering all of them.
    pub fn merge(parts: &[Arc<Strip>]) -> Strip {
        let start = parts.iter().map(|s| s.start).fold(f64::INFINITY, f64::min);
        let end = parts.iter().map(|s| s.end).fold(f64::NEG_INFINITY, f64::max);
        Strip {
            start: if start.is_finite() { start } else { 0.0 },
            end: if end.is_finite() { end } else { 0.0 },
            samples: parts.iter().map(|s| s.samples).sum(),
        }
    }
}

/// Where the viewer is looking, shared with the host.
#[derive(Debug, Clone)]
pub struct Focus(Arc<RwLock<f64>>);

impl Focus {
    pub fn new(at: f64) -> Self {
        Self(Arc::new(RwLock::new(at)))
    }

    pub fn get(&self) -> f64 {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn move_to(&self, at: f64) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = at.clamp(0.0, 1.0);
    }
}

/// Pipeline over the synthetic interval.
pub struct StripPipeline {
    focus: Focus,
    falloff: f64,
    span: (f64, f64),
    resolution: f64,
}

impl StripPipeline {
    /// Pieces further than `falloff` from the focus are worthless.
    pub fn new(focus: Focus, falloff: f64) -> Self {
        Self {
            focus,
            falloff: falloff.max(f64::EPSILON),
            span: (0.0, 1.0),
            resolution: 0.0,
        }
    }
}

impl StreamingPipeline for StripPipeline {
    type Data = Strip;

    fn set_update_extent(&mut self, piece: u32, num_pieces: u32, _ghost_level: u32) {
        let n = f64::from(num_pieces.max(1));
        self.span = (f64::from(piece) / n, f64::from(piece + 1) / n);
    }

    fn set_update_resolution(&mut self, resolution: f64) {
        self.resolution = resolution;
    }

    fn compute_priority(&mut self) -> f64 {
        let focus = self.focus.get();
        let (start, end) = self.span;
        let distance = if focus < start {
            start - focus
        } else if focus > end {
            focus - end
        } else {
            0.0
        };
        (1.0 - distance / self.falloff).max(0.0)
    }

    fn update(&mut self) -> Option<Arc<Strip>> {
        let (start, end) = self.span;
        let density = (self.resolution * MAX_SAMPLES as f64).round() as usize;
        let samples = (density as f64 * (end - start)).ceil() as usize;
        Some(Arc::new(Strip {
            start,
            end,
            samples: samples.max(1),
        }))
    }
}
