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

//! In-memory piece cache with an append slot.

use super::{CacheIndex, PieceCache, RESOLUTION_EPSILON};
use crate::layout::GlobalPiece;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type MergeFn<D> = Box<dyn Fn(&[Arc<D>]) -> D + Send + Sync>;

struct CacheEntry<D> {
    piece: GlobalPiece,
    resolution: f64,
    data: Arc<D>,
}

struct AppendSlot<D> {
    members: Vec<(GlobalPiece, f64)>,
    data: Arc<D>,
}

/// A cache of computed pieces held in memory.
///
/// The append slot is built with a caller-supplied merge function which
/// receives every cached piece in index order.
pub struct MemoryPieceCache<D> {
    entries: BTreeMap<CacheIndex, CacheEntry<D>>,
    append: Option<AppendSlot<D>>,
    merge: MergeFn<D>,
}

impl<D> MemoryPieceCache<D> {
    /// Creates an empty cache that aggregates with `merge`.
    pub fn new(merge: impl Fn(&[Arc<D>]) -> D + Send + Sync + 'static) -> Self {
        Self {
            entries: BTreeMap::new(),
            append: None,
            merge: Box::new(merge),
        }
    }

    /// Stores the data computed for `piece` at `resolution`, replacing any previous entry.
    pub fn insert(&mut self, piece: GlobalPiece, resolution: f64, data: Arc<D>) {
        let index = CacheIndex::of(piece.piece, piece.num_pieces);
        self.entries.insert(
            index,
            CacheEntry {
                piece,
                resolution,
                data,
            },
        );
    }

    /// Returns the cached data for `piece` if it is at least as fine as `resolution`.
    pub fn get(&self, piece: GlobalPiece, resolution: f64) -> Option<Arc<D>> {
        self.entries
            .get(&CacheIndex::of(piece.piece, piece.num_pieces))
            .filter(|entry| entry.resolution + RESOLUTION_EPSILON >= resolution)
            .map(|entry| Arc::clone(&entry.data))
    }

    /// Number of cached pieces.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pieces folded into the append slot.
    pub fn append_len(&self) -> usize {
        self.append.as_ref().map_or(0, |slot| slot.members.len())
    }

    /// Drops every cached piece and the append slot.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.append = None;
    }
}

impl<D> PieceCache for MemoryPieceCache<D> {
    type Data = D;

    fn delete_piece(&mut self, index: CacheIndex) {
        if self.entries.remove(&index).is_some() {
            let (piece, num_pieces) = index.address();
            log::debug!("PieceCache: evicted {piece}/{num_pieces}");
        }
    }

    fn in_cache(&self, piece: GlobalPiece, resolution: f64) -> bool {
        self.get(piece, resolution).is_some()
    }

    fn in_append(&self, piece: GlobalPiece, resolution: f64) -> bool {
        self.append.as_ref().is_some_and(|slot| {
            slot.members
                .iter()
                .any(|(p, r)| *p == piece && r + RESOLUTION_EPSILON >= resolution)
        })
    }

    fn append_pieces(&mut self) {
        if self.entries.is_empty() {
            self.append = None;
            return;
        }

        let members = self
            .entries
            .values()
            .map(|entry| (entry.piece, entry.resolution))
            .collect();
        let parts: Vec<Arc<D>> = self
            .entries
            .values()
            .map(|entry| Arc::clone(&entry.data))
            .collect();
        let data = Arc::new((self.merge)(&parts));

        log::debug!("PieceCache: append slot rebuilt from {} pieces", parts.len());
        self.append = Some(AppendSlot { members, data });
    }

    fn appended_data(&self) -> Option<Arc<D>> {
        self.append.as_ref().map(|slot| Arc::clone(&slot.data))
    }
}

/// A cloneable handle to a [`MemoryPieceCache`].
///
/// One handle is given to the scheduler, another to the
/// [`CachingPipeline`](super::CachingPipeline) that fills it.
pub struct SharedPieceCache<D>(Arc<Mutex<MemoryPieceCache<D>>>);

impl<D> Clone for SharedPieceCache<D> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<D> SharedPieceCache<D> {
    /// Wraps a cache for sharing.
    pub fn new(cache: MemoryPieceCache<D>) -> Self {
        Self(Arc::new(Mutex::new(cache)))
    }

    /// Locks the underlying cache.
    pub fn lock(&self) -> MutexGuard<'_, MemoryPieceCache<D>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D> PieceCache for SharedPieceCache<D> {
    type Data = D;

    fn delete_piece(&mut self, index: CacheIndex) {
        self.lock().delete_piece(index);
    }

    fn in_cache(&self, piece: GlobalPiece, resolution: f64) -> bool {
        self.lock().in_cache(piece, resolution)
    }

    fn in_append(&self, piece: GlobalPiece, resolution: f64) -> bool {
        self.lock().in_append(piece, resolution)
    }

    fn append_pieces(&mut self) {
        self.lock().append_pieces();
    }

    fn appended_data(&self) -> Option<Arc<D>> {
        self.lock().appended_data()
    }
}
