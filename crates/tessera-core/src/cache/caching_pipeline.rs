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

//! A pipeline stage that answers updates from the piece cache when it can.

use super::SharedPieceCache;
use crate::layout::GlobalPiece;
use crate::pipeline::StreamingPipeline;
use std::sync::Arc;

/// Wraps a pipeline so that every computed piece is cached and repeated
/// requests for a cached piece skip execution.
pub struct CachingPipeline<P: StreamingPipeline> {
    inner: P,
    cache: SharedPieceCache<P::Data>,
    extent: Option<GlobalPiece>,
    resolution: f64,
    hits: usize,
    executions: usize,
}

impl<P: StreamingPipeline> CachingPipeline<P> {
    /// Puts `cache` in front of `inner`.
    pub fn new(inner: P, cache: SharedPieceCache<P::Data>) -> Self {
        Self {
            inner,
            cache,
            extent: None,
            resolution: 0.0,
            hits: 0,
            executions: 0,
        }
    }

    /// Number of updates answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of updates that executed the wrapped pipeline.
    pub fn executions(&self) -> usize {
        self.executions
    }

    /// The wrapped pipeline.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: StreamingPipeline> StreamingPipeline for CachingPipeline<P> {
    type Data = P::Data;

    fn set_update_extent(&mut self, piece: u32, num_pieces: u32, ghost_level: u32) {
        self.extent = Some(GlobalPiece { piece, num_pieces });
        self.inner.set_update_extent(piece, num_pieces, ghost_level);
    }

    fn set_update_resolution(&mut self, resolution: f64) {
        self.resolution = resolution;
        self.inner.set_update_resolution(resolution);
    }

    fn compute_priority(&mut self) -> f64 {
        self.inner.compute_priority()
    }

    fn update(&mut self) -> Option<Arc<Self::Data>> {
        let Some(extent) = self.extent else {
            return self.inner.update();
        };

        if let Some(data) = self.cache.lock().get(extent, self.resolution) {
            self.hits += 1;
            return Some(data);
        }

        self.executions += 1;
        let data = self.inner.update()?;
        self.cache
            .lock()
            .insert(extent, self.resolution, Arc::clone(&data));
        Some(data)
    }
}
