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

//! The contract between the scheduler and the demand-driven pipeline that
//! actually produces data for a piece.

use std::sync::Arc;

/// A demand-driven producer of piece data.
///
/// The scheduler always sets the extent and resolution first, then either asks
/// for a priority estimate or forces an update. Requests use global piece ids.
pub trait StreamingPipeline {
    /// The data object produced for a piece.
    type Data;

    /// Selects the piece the next request refers to.
    fn set_update_extent(&mut self, piece: u32, num_pieces: u32, ghost_level: u32);

    /// Selects the resolution the next request refers to.
    fn set_update_resolution(&mut self, resolution: f64);

    /// Estimates how much the requested piece contributes. 0.0 means nothing.
    fn compute_priority(&mut self) -> f64;

    /// Executes the pipeline for the requested piece.
    ///
    /// The result is shared, not copied: callers keep the `Arc`.
    fn update(&mut self) -> Option<Arc<Self::Data>>;
}

impl<P: StreamingPipeline + ?Sized> StreamingPipeline for Box<P> {
    type Data = P::Data;

    fn set_update_extent(&mut self, piece: u32, num_pieces: u32, ghost_level: u32) {
        (**self).set_update_extent(piece, num_pieces, ghost_level);
    }

    fn set_update_resolution(&mut self, resolution: f64) {
        (**self).set_update_resolution(resolution);
    }

    fn compute_priority(&mut self) -> f64 {
        (**self).compute_priority()
    }

    fn update(&mut self) -> Option<Arc<Self::Data>> {
        (**self).update()
    }
}
