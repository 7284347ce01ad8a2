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

use super::transitions::merge_sibling_groups;
use super::*;
use approx::assert_relative_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use tessera_core::{GlobalPiece, MemoryPieceCache, SharedPieceCache};

/// Pipeline returning a fixed priority and the global piece index as data.
struct ConstPipeline {
    priority: f64,
    piece: u32,
    updates: Arc<AtomicUsize>,
}

impl ConstPipeline {
    fn new(priority: f64) -> Self {
        Self {
            priority,
            piece: 0,
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl StreamingPipeline for ConstPipeline {
    type Data = u32;

    fn set_update_extent(&mut self, piece: u32, _num_pieces: u32, _ghost_level: u32) {
        self.piece = piece;
    }

    fn set_update_resolution(&mut self, _resolution: f64) {}

    fn compute_priority(&mut self) -> f64 {
        self.priority
    }

    fn update(&mut self) -> Option<Arc<u32>> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(self.piece))
    }
}

fn shared_cache() -> SharedPieceCache<u32> {
    SharedPieceCache::new(MemoryPieceCache::new(|parts: &[Arc<u32>]| {
        parts.iter().map(|p| **p).sum()
    }))
}

fn scheduler(priority: f64, options: StreamingOptions) -> AdaptiveScheduler<u32> {
    let mut s = AdaptiveScheduler::new();
    s.set_pipeline(ConstPipeline::new(priority));
    s.set_cache(shared_cache());
    s.set_options_provider(options).unwrap();
    s
}

fn binary(height: u32) -> StreamingOptions {
    StreamingOptions {
        height,
        degree: 2,
        ..Default::default()
    }
}

#[test]
fn test_clear_priorities_seeds_root() {
    let mut s: AdaptiveScheduler<u32> = AdaptiveScheduler::new();
    s.next_frame_mut().add_piece(Piece::new(1, 2, 0.5, 1.0));
    s.clear_priorities();

    assert_eq!(s.to_do().as_slice(), &[Piece::new(0, 1, 0.0, 1.0)]);
    assert!(s.next_frame().is_empty());
    assert!(s.to_split().is_empty());
    assert_eq!(s.piece_info().as_piece(), Piece::root());
    assert_eq!(*s.state_info(), StateInfo::default());
}

#[test]
fn test_operations_without_collaborators_fail_without_side_effects() {
    let mut s: AdaptiveScheduler<u32> = AdaptiveScheduler::new();
    assert!(matches!(
        s.prepare_first_pass(),
        Err(SchedulerError::MissingCache)
    ));
    assert!(matches!(
        s.choose_next_piece(),
        Err(SchedulerError::MissingCache)
    ));
    assert_eq!(s.to_do().len(), 1);

    s.set_cache(shared_cache());
    assert!(matches!(
        s.prepare_first_pass(),
        Err(SchedulerError::MissingPipeline)
    ));
    assert!(matches!(s.refine(), Err(SchedulerError::MissingPipeline)));
    assert_eq!(s.to_do().as_slice(), &[Piece::root()]);
}

#[test]
fn test_degenerate_options_are_rejected() {
    let mut s: AdaptiveScheduler<u32> = AdaptiveScheduler::new();
    let bad = StreamingOptions {
        degree: 0,
        ..Default::default()
    };
    assert!(matches!(
        s.set_options_provider(bad),
        Err(SchedulerError::Config(_))
    ));
}

#[test]
fn test_first_pass_with_uniform_priority_keeps_seed() {
    let mut s = scheduler(1.0, binary(4));
    s.prepare_first_pass().unwrap();

    assert_eq!(s.to_do().number_non_zero_priority(), 1);
    assert_eq!(s.to_do().as_slice(), &[Piece::root()]);
    assert!(s.state_info().next_append);
}

#[test]
fn test_prioritization_off_forces_unit_priority() {
    let options = StreamingOptions {
        use_prioritization: false,
        ..binary(4)
    };
    let mut s = scheduler(0.0, options);
    s.prepare_first_pass().unwrap();
    assert_eq!(s.to_do().get_piece(0).map(|p| p.priority), Some(1.0));
}

#[test]
fn test_choose_last_piece_ends_wend_and_builds_append() {
    let mut s = scheduler(1.0, binary(4));
    s.prepare_first_pass().unwrap();

    let outcome = s.choose_next_piece().unwrap();
    assert_eq!(outcome.chosen, Some(Piece::root()));
    assert!(outcome.wend_just_ended);
    assert!(!outcome.from_append);
    assert!(s.is_wend_done());
    assert_eq!(s.output().map(|d| **d), Some(0));
    assert_eq!(s.next_frame().len(), 1);
}

#[test]
fn test_empty_queue_ends_wend_without_choice() {
    let mut s = scheduler(1.0, binary(4));
    s.to_do_mut().clear();
    let outcome = s.choose_next_piece().unwrap();
    assert_eq!(outcome.chosen, None);
    assert!(outcome.wend_just_ended);
    assert!(s.is_wend_done());
}

#[test]
fn test_worthless_head_carries_rest_of_queue() {
    let mut s = scheduler(0.0, binary(4));
    s.to_do_mut().clear();
    s.to_do_mut().extend([
        Piece::new(0, 4, 0.5, 0.0),
        Piece::new(1, 4, 0.5, 0.0),
        Piece::new(2, 4, 0.5, 0.0),
    ]);

    let outcome = s.choose_next_piece().unwrap();
    assert_eq!(outcome.chosen, None);
    assert!(s.to_do().is_empty());
    assert_eq!(s.next_frame().len(), 3);
}

#[test]
fn test_finish_pass_detects_remaining_work() {
    let mut s = scheduler(1.0, binary(4));
    s.prepare_first_pass().unwrap();
    s.choose_next_piece().unwrap();
    s.finish_pass();
    assert!(!s.is_all_done());

    // Nothing refinable once the only carried piece is at full resolution.
    s.next_frame_mut().clear();
    s.next_frame_mut().add_piece(Piece::new(0, 1, 1.0, 1.0));
    s.finish_pass();
    assert!(s.is_all_done());
}

#[test]
fn test_finish_pass_before_wend_end_is_noop() {
    let mut s = scheduler(1.0, binary(4));
    s.next_frame_mut().clear();
    s.finish_pass();
    assert!(!s.is_all_done());
}

#[test]
fn test_refine_splits_into_degree_children() {
    let mut s = scheduler(1.0, binary(4));
    s.to_do_mut().clear();
    s.next_frame_mut().add_piece(Piece::new(0, 1, 0.5, 1.0));

    assert_eq!(s.refine().unwrap(), 1);
    let children: Vec<(u32, u32)> = s.to_do().iter().map(|p| (p.piece, p.num_pieces)).collect();
    assert_eq!(children, vec![(0, 2), (1, 2)]);
    for child in s.to_do() {
        assert_relative_eq!(child.resolution, 0.75);
        assert_relative_eq!(child.priority, 1.0);
    }
    assert!(s.to_split().is_empty());
    assert!(s.next_frame().is_empty());
    assert!(!s.is_all_done());
}

#[test]
fn test_refine_respects_split_budget() {
    let options = StreamingOptions {
        max_splits: Some(1),
        ..binary(4)
    };
    let mut s = scheduler(1.0, options);
    s.to_do_mut().clear();
    s.next_frame_mut()
        .extend([Piece::new(0, 2, 0.25, 0.9), Piece::new(1, 2, 0.25, 0.8)]);

    assert_eq!(s.refine().unwrap(), 1);
    let queued: Vec<(u32, u32)> = s.to_do().iter().map(|p| (p.piece, p.num_pieces)).collect();
    assert_eq!(queued, vec![(0, 4), (1, 4), (1, 2)]);
    assert!(s.to_split().is_empty());
}

#[test]
fn test_refine_with_nothing_splittable_is_all_done() {
    let options = StreamingOptions {
        max_depth: Some(1),
        ..binary(4)
    };
    let mut s = scheduler(1.0, options);
    s.to_do_mut().clear();
    s.next_frame_mut().extend([
        Piece::new(0, 2, 0.25, 1.0),
        Piece::new(1, 2, 0.25, 0.0),
    ]);

    assert_eq!(s.refine().unwrap(), 0);
    assert!(s.is_all_done());
    assert_eq!(s.to_do().len(), 2);
}

#[test]
fn test_refine_evicts_parent_from_cache() {
    let cache = shared_cache();
    let mut s = AdaptiveScheduler::new();
    s.set_pipeline(ConstPipeline::new(1.0));
    s.set_cache(cache.clone());
    s.set_options_provider(binary(4)).unwrap();

    let parent = GlobalPiece { piece: 0, num_pieces: 1 };
    cache.lock().insert(parent, 0.5, Arc::new(1));
    s.to_do_mut().clear();
    s.next_frame_mut().add_piece(Piece::new(0, 1, 0.5, 1.0));
    s.refine().unwrap();

    assert!(!cache.in_cache(parent, 0.5));
    assert!(cache.appended_data().is_none());
}

#[test]
fn test_coarsen_merges_sibling_pair() {
    let mut s = scheduler(1.0, binary(4));
    s.next_frame_mut()
        .extend([Piece::new(0, 2, 0.75, 1.0), Piece::new(1, 2, 0.75, 0.5)]);

    assert_eq!(s.coarsen().unwrap(), 1);
    let merged = s.next_frame().as_slice();
    assert_eq!(merged.len(), 1);
    assert_eq!((merged[0].piece, merged[0].num_pieces), (0, 1));
    assert_relative_eq!(merged[0].resolution, 0.5);
    assert_relative_eq!(merged[0].priority, 1.0);
}

#[test]
fn test_coarsen_leaves_unpaired_pieces() {
    let mut s = scheduler(1.0, binary(4));
    s.next_frame_mut().extend([
        Piece::new(1, 4, 0.75, 1.0),
        Piece::new(2, 4, 0.75, 0.5),
        Piece::new(0, 1, 0.25, 0.5),
    ]);

    assert_eq!(s.coarsen().unwrap(), 0);
    assert_eq!(s.next_frame().len(), 3);
}

#[test]
fn test_sibling_merge_needs_every_child_for_higher_degree() {
    let partial = vec![Piece::new(0, 4, 0.5, 0.0), Piece::new(1, 4, 0.5, 0.0)];
    let (out, merges) = merge_sibling_groups(partial, 4, 0.25, |_| {});
    assert_eq!(merges, 0);
    assert_eq!(out.len(), 2);

    let full: Vec<Piece> = (0..4).map(|i| Piece::new(i, 4, 0.5, i as f64)).collect();
    let mut evicted = Vec::new();
    let (out, merges) = merge_sibling_groups(full, 4, 0.25, |p| evicted.push(p.piece));
    assert_eq!(merges, 1);
    assert_eq!(evicted, vec![0, 1, 2, 3]);
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].piece, out[0].num_pieces), (0, 1));
    assert_relative_eq!(out[0].priority, 3.0);
    assert_relative_eq!(out[0].resolution, 0.25);
}

#[test]
fn test_sibling_merge_passes_duplicates_through() {
    let pieces = vec![
        Piece::new(0, 2, 0.5, 0.0),
        Piece::new(0, 2, 0.5, 0.0),
        Piece::new(1, 2, 0.5, 0.0),
    ];
    let (out, merges) = merge_sibling_groups(pieces, 2, 0.5, |_| {});
    assert_eq!(merges, 1);
    assert_eq!(out.len(), 2);
}

#[test]
fn test_reap_coalesces_zero_tail_fully() {
    let mut s = scheduler(1.0, binary(2));
    s.to_do_mut().clear();
    s.to_do_mut().add_piece(Piece::new(0, 4, 1.0, 0.7));
    s.to_do_mut()
        .extend((1..4).map(|i| Piece::new(i, 4, 1.0, 0.0)));

    // 1/4 stays alone (its sibling 0/4 is non-zero); 2/4 and 3/4 merge into 1/2.
    let merges = s.reap().unwrap();
    assert_eq!(merges, 1);
    assert_eq!(s.to_do().number_non_zero_priority(), 1);
    assert_eq!(s.to_do().get_piece(0), Some(&Piece::new(0, 4, 1.0, 0.7)));
    let tail: Vec<(u32, u32)> = s
        .to_do()
        .iter()
        .skip(1)
        .map(|p| (p.piece, p.num_pieces))
        .collect();
    assert_eq!(tail, vec![(1, 2), (1, 4)]);
}

#[test]
fn test_reap_is_noop_when_everything_matters() {
    let mut s = scheduler(1.0, binary(4));
    assert_eq!(s.reap().unwrap(), 0);
    assert_eq!(s.to_do().as_slice(), &[Piece::root()]);
}

#[test]
fn test_events_follow_protocol() {
    let mut s = scheduler(1.0, binary(4));
    let rx = s.subscribe(16);
    s.prepare_first_pass().unwrap();
    s.choose_next_piece().unwrap();

    let events: Vec<StreamEvent> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            StreamEvent::WendStarted {
                queued: 1,
                non_zero: 1
            },
            StreamEvent::PieceChosen {
                piece: Piece::root(),
                hit: false,
                from_append: false
            },
            StreamEvent::WendEnded { carried: 1 },
        ]
    );
}

#[test]
fn test_chosen_piece_already_cached_reports_hit() {
    let cache = shared_cache();
    let mut s = AdaptiveScheduler::new();
    s.set_pipeline(ConstPipeline::new(1.0));
    s.set_cache(cache.clone());
    s.set_options_provider(binary(4)).unwrap();
    cache
        .lock()
        .insert(GlobalPiece { piece: 0, num_pieces: 1 }, 0.0, Arc::new(0));

    s.prepare_first_pass().unwrap();
    let outcome = s.choose_next_piece().unwrap();

    assert_eq!(outcome.chosen, Some(Piece::root()));
    assert!(outcome.hit);
    assert!(!outcome.from_append);
    assert!(s.piece_info().hit);
    assert!(!s.piece_info().from_append);
}

#[test]
fn test_refine_with_zero_budget_splits_nothing() {
    let options = StreamingOptions {
        max_splits: Some(0),
        ..binary(4)
    };
    let mut s = scheduler(1.0, options);
    s.to_do_mut().clear();
    s.next_frame_mut().add_piece(Piece::new(0, 1, 0.5, 1.0));

    assert_eq!(s.refine().unwrap(), 0);
    assert!(s.is_all_done());
    assert_eq!(s.to_do().as_slice(), &[Piece::new(0, 1, 0.5, 1.0)]);
    assert!(s.to_split().is_empty());
    assert!(s.next_frame().is_empty());
}

#[test]
fn test_refine_keeps_parent_when_global_count_overflows() {
    let mut s = scheduler(1.0, binary(64));
    s.set_layout(ProcessLayout::new(3, 4).unwrap());
    let deep = Piece::new(0, 1 << 30, 30.0 / 64.0, 1.0);
    s.to_do_mut().clear();
    s.next_frame_mut().add_piece(deep);

    assert_eq!(s.refine().unwrap(), 0);
    assert_eq!(s.to_do().as_slice(), &[deep]);
    assert!(s.is_all_done());
}

#[test]
fn test_piece_without_global_id_is_carried_not_chosen() {
    let mut s = scheduler(1.0, binary(64));
    s.set_layout(ProcessLayout::new(3, 4).unwrap());
    let deep = Piece::new(5, 1 << 30, 30.0 / 64.0, 1.0);
    s.to_do_mut().clear();
    s.to_do_mut().add_piece(deep);

    let outcome = s.choose_next_piece().unwrap();
    assert_eq!(outcome.chosen, None);
    assert_eq!(outcome.skipped, 1);
    assert!(outcome.wend_just_ended);
    assert_eq!(s.next_frame().as_slice(), &[deep]);
}
