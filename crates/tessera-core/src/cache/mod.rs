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

//! Piece caching.
//!
//! The scheduler sits behind a cache of previously computed pieces. Besides
//! plain lookups the cache maintains an *append slot*: one pre-merged
//! aggregate of everything cached so far, which the scheduler can hand to the
//! renderer as a single cheap piece at the start of a wend.

mod caching_pipeline;
mod memory;

pub use caching_pipeline::CachingPipeline;
pub use memory::{MemoryPieceCache, SharedPieceCache};

use crate::layout::GlobalPiece;
use std::sync::Arc;

/// Tolerance used when comparing cached and requested resolutions.
pub const RESOLUTION_EPSILON: f64 = 1e-9;

/// Key of a cached piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheIndex(pub u64);

impl CacheIndex {
    /// Packs a piece address into a single key.
    pub fn of(piece: u32, num_pieces: u32) -> Self {
        Self((u64::from(num_pieces) << 32) | u64::from(piece))
    }

    /// Unpacks the key into `(piece, num_pieces)`.
    pub fn address(&self) -> (u32, u32) {
        (self.0 as u32, (self.0 >> 32) as u32)
    }
}

/// The query/mutate surface of a piece cache, as seen by the scheduler.
pub trait PieceCache {
    /// The data object stored per piece and in the append slot.
    type Data;

    /// Key under which a piece is stored.
    fn compute_index(&self, piece: u32, num_pieces: u32) -> CacheIndex {
        CacheIndex::of(piece, num_pieces)
    }

    /// Evicts a piece. Unknown keys are ignored.
    fn delete_piece(&mut self, index: CacheIndex);

    /// True when the piece is cached at (at least) `resolution`.
    fn in_cache(&self, piece: GlobalPiece, resolution: f64) -> bool;

    /// True when the piece is already covered by the append slot.
    fn in_append(&self, piece: GlobalPiece, resolution: f64) -> bool;

    /// Rebuilds the append slot from the current cache contents.
    ///
    /// Must be idempotent: calling it twice without intervening changes
    /// yields the same aggregate.
    fn append_pieces(&mut self);

    /// The current append aggregate, if any.
    fn appended_data(&self) -> Option<Arc<Self::Data>>;
}
