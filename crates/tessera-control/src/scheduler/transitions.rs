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

//! Wend-boundary transitions: refine, coarsen, and reap.

use super::{piece_priority, AdaptiveScheduler};
use crate::error::{Result, SchedulerError};
use crate::events::{stream_message, StreamEvent};
use std::collections::BTreeMap;
use tessera_core::cache::RESOLUTION_EPSILON;
use tessera_core::{Piece, PieceCache, ProcessLayout};

impl<D> AdaptiveScheduler<D> {
    /// Splits the carried pieces that still deserve more detail.
    ///
    /// Splittable pieces (positive priority, below full and depth-ceiling
    /// resolution) are replaced by `degree` children one resolution step finer,
    /// up to `max_splits` of them; everything else is queued unchanged. Sets
    /// `all_done` when nothing was split. Returns the number of splits.
    pub fn refine(&mut self) -> Result<usize> {
        let Some(cache) = self.cache.as_deref_mut() else {
            log::error!("Scheduler: refine without a piece cache");
            return Err(SchedulerError::MissingCache);
        };
        let Some(pipeline) = self.pipeline.as_deref_mut() else {
            log::error!("Scheduler: refine without a pipeline");
            return Err(SchedulerError::MissingPipeline);
        };
        let options = &self.options;

        for piece in self.next_frame.drain() {
            if options.is_refinable(piece.resolution, piece.priority) {
                self.to_split.add_piece(piece);
            } else {
                self.to_do.add_piece(piece);
            }
        }

        let degree = options.degree;
        let step = options.resolution_step();
        let budget = options.split_budget();
        let mut splits = 0;
        while splits < budget {
            let Some(parent) = self.to_split.pop_front() else {
                break;
            };
            let num_children = parent
                .num_pieces
                .checked_mul(degree)
                .filter(|&n| self.layout.global_count(n).is_some());
            let Some(num_children) = num_children else {
                log::warn!(
                    "Scheduler: piece {}/{} cannot be split further",
                    parent.piece,
                    parent.num_pieces
                );
                self.to_do.add_piece(parent);
                continue;
            };

            evict(cache, &self.layout, &parent);
            let resolution = (parent.resolution + step).min(1.0);
            for k in 0..degree {
                let index = parent.piece * degree + k;
                let mut child = Piece::new(index, num_children, resolution, 0.0);
                child.priority = piece_priority(pipeline, options, &self.layout, &child);
                self.to_do.add_piece(child);
            }
            splits += 1;
        }

        self.to_do.merge_piece_list(&mut self.to_split);
        cache.append_pieces();

        let queued = self.to_do.len();
        stream_message(
            options.enable_stream_messages,
            format_args!("Scheduler: refined {splits} pieces, {queued} queued"),
        );
        self.events.emit(StreamEvent::Refined { splits, queued });
        if splits == 0 {
            self.mark_all_done();
        }
        Ok(splits)
    }

    /// Merges complete sibling groups among the carried pieces back into their
    /// parents, one level per call. Returns the number of groups merged.
    pub fn coarsen(&mut self) -> Result<usize> {
        let Some(cache) = self.cache.as_deref_mut() else {
            log::error!("Scheduler: coarsen without a piece cache");
            return Err(SchedulerError::MissingCache);
        };
        let layout = self.layout;

        let pieces: Vec<Piece> = self.next_frame.drain().collect();
        let (survivors, merges) = merge_sibling_groups(
            pieces,
            self.options.degree,
            self.options.resolution_step(),
            |piece| evict(cache, &layout, piece),
        );
        self.next_frame.extend(survivors);

        let remaining = self.next_frame.len();
        stream_message(
            self.options.enable_stream_messages,
            format_args!("Scheduler: coarsened {merges} sibling groups, {remaining} pieces left"),
        );
        self.events.emit(StreamEvent::Coarsened { merges, remaining });
        Ok(merges)
    }

    /// Coalesces the zero-priority tail of the sorted pending queue.
    ///
    /// Complete sibling groups in the tail are merged into their parents,
    /// repeatedly, until a pass merges nothing. Positive-priority pieces are
    /// never touched. Returns the number of groups merged.
    pub fn reap(&mut self) -> Result<usize> {
        let Some(cache) = self.cache.as_deref_mut() else {
            log::error!("Scheduler: reap without a piece cache");
            return Err(SchedulerError::MissingCache);
        };
        let before = self.to_do.len();
        let non_zero = self.to_do.number_non_zero_priority();
        if non_zero == before {
            return Ok(0);
        }

        let layout = self.layout;
        let degree = self.options.degree;
        let step = self.options.resolution_step();
        let mut tail: Vec<Piece> = self.to_do.split_off(non_zero).drain().collect();
        let mut merges = 0;
        loop {
            let (next, merged) =
                merge_sibling_groups(tail, degree, step, |piece| evict(cache, &layout, piece));
            tail = next;
            merges += merged;
            if merged == 0 {
                break;
            }
        }
        self.to_do.extend(tail);

        let after = self.to_do.len();
        log::debug!("Scheduler: reaped zero-priority tail {before} -> {after} pieces");
        self.events.emit(StreamEvent::Reaped { before, after });
        Ok(merges)
    }
}

/// Drops a piece's cached data, in global numbering.
fn evict<D>(cache: &mut dyn PieceCache<Data = D>, layout: &ProcessLayout, piece: &Piece) {
    let Some(global) = layout.to_global(piece) else {
        return;
    };
    let index = cache.compute_index(global.piece, global.num_pieces);
    cache.delete_piece(index);
}

/// One pass of sibling merging.
///
/// Pieces are bucketed by level (`num_pieces`) and, within a level, by parent
/// (`piece / degree`). A bucket holding one piece for each of the `degree`
/// child slots is replaced by its parent: half the level, one step coarser,
/// with the highest sibling priority. Incomplete groups, duplicates, and
/// pieces already at the coarsest level pass through unchanged.
pub(crate) fn merge_sibling_groups(
    pieces: Vec<Piece>,
    degree: u32,
    step: f64,
    mut evict: impl FnMut(&Piece),
) -> (Vec<Piece>, usize) {
    let degree = degree.max(1);
    let mut levels: BTreeMap<u32, Vec<Piece>> = BTreeMap::new();
    for piece in pieces {
        levels.entry(piece.num_pieces).or_default().push(piece);
    }

    let mut out = Vec::new();
    let mut merges = 0;
    for (num_pieces, level) in levels {
        if num_pieces < degree || num_pieces % degree != 0 {
            out.extend(level);
            continue;
        }

        // Parent index -> one slot per child position, in first-seen order.
        let mut groups: Vec<(u32, Vec<Option<Piece>>)> = Vec::new();
        for piece in level {
            let parent = piece.parent_index(degree);
            let slot = (piece.piece % degree) as usize;
            let i = match groups.iter().position(|(p, _)| *p == parent) {
                Some(i) => i,
                None => {
                    groups.push((parent, vec![None; degree as usize]));
                    groups.len() - 1
                }
            };
            let group = &mut groups[i].1;
            match group[slot] {
                None => group[slot] = Some(piece),
                Some(_) => out.push(piece),
            }
        }

        for (parent, slots) in groups {
            let members: Vec<Piece> = slots.iter().flatten().copied().collect();
            let own = members[0];
            if members.len() < degree as usize || own.resolution <= RESOLUTION_EPSILON {
                out.extend(members);
                continue;
            }

            let priority = members
                .iter()
                .map(|p| p.priority)
                .fold(f64::NEG_INFINITY, f64::max);
            for member in &members {
                evict(member);
            }
            out.push(Piece {
                piece: parent,
                num_pieces: num_pieces / degree,
                resolution: (own.resolution - step).max(0.0),
                priority,
            });
            merges += 1;
        }
    }
    (out, merges)
}
