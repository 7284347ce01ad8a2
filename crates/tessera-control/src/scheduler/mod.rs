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

//! The adaptive update scheduler.
//!
//! The scheduler is driven once per render pass by an external loop:
//!
//! 1. [`prepare_first_pass`](AdaptiveScheduler::prepare_first_pass) starts a
//!    wend: carried work is merged back, every piece is re-prioritized, the
//!    queue is sorted and its zero-priority tail reaped.
//! 2. [`choose_next_piece`](AdaptiveScheduler::choose_next_piece) pops the
//!    best piece not already covered by the cache's append aggregate and has
//!    the pipeline produce it, then
//!    [`finish_pass`](AdaptiveScheduler::finish_pass) checks whether any work
//!    remains. Later passes of the same wend use
//!    [`prepare_another_pass`](AdaptiveScheduler::prepare_another_pass).
//! 3. When the wend ends, [`refine`](AdaptiveScheduler::refine) splits the
//!    pieces still worth more detail, or
//!    [`coarsen`](AdaptiveScheduler::coarsen) merges siblings back together.
//!
//! [`clear_priorities`](AdaptiveScheduler::clear_priorities) restarts the
//! sweep from the coarsest single piece.

mod transitions;

use crate::error::{Result, SchedulerError};
use crate::events::{stream_message, EventSink, StreamEvent};
use crate::state::{ChooseOutcome, PieceInfo, StateInfo};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tessera_core::{
    OptionsProvider, Piece, PieceCache, PieceList, ProcessLayout, StreamingOptions,
    StreamingPipeline,
};

/// Multi-pass, priority-driven refine/coarsen scheduler.
///
/// A single instance is not meant for concurrent use; callers that drive it
/// from several threads must serialize access themselves.
pub struct AdaptiveScheduler<D> {
    pipeline: Option<Box<dyn StreamingPipeline<Data = D>>>,
    cache: Option<Box<dyn PieceCache<Data = D>>>,
    options_provider: Box<dyn OptionsProvider>,
    options: StreamingOptions,
    layout: ProcessLayout,

    to_do: PieceList,
    next_frame: PieceList,
    to_split: PieceList,

    piece_info: PieceInfo,
    state: StateInfo,
    output: Option<Arc<D>>,
    events: EventSink,
}

impl<D> Default for AdaptiveScheduler<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> AdaptiveScheduler<D> {
    /// Creates a scheduler with default options, seeded with the root piece.
    pub fn new() -> Self {
        let mut scheduler = Self {
            pipeline: None,
            cache: None,
            options_provider: Box::new(StreamingOptions::default()),
            options: StreamingOptions::default(),
            layout: ProcessLayout::default(),
            to_do: PieceList::new(),
            next_frame: PieceList::new(),
            to_split: PieceList::new(),
            piece_info: PieceInfo::default(),
            state: StateInfo::default(),
            output: None,
            events: EventSink::default(),
        };
        scheduler.clear_priorities();
        scheduler
    }

    /// Attaches the pipeline that computes priorities and piece data.
    pub fn set_pipeline(&mut self, pipeline: impl StreamingPipeline<Data = D> + 'static) {
        self.pipeline = Some(Box::new(pipeline));
    }

    /// Attaches the piece cache.
    pub fn set_cache(&mut self, cache: impl PieceCache<Data = D> + 'static) {
        self.cache = Some(Box::new(cache));
    }

    /// Sets where options are read from at the start of every wend.
    ///
    /// The snapshot is taken immediately as well, so that transitions invoked
    /// before the next wend already see the new values.
    pub fn set_options_provider(
        &mut self,
        provider: impl OptionsProvider + 'static,
    ) -> Result<()> {
        let options = provider.streaming_options();
        options.validate()?;
        self.options = options;
        self.options_provider = Box::new(provider);
        Ok(())
    }

    /// Sets this process's place in the global piece numbering.
    pub fn set_layout(&mut self, layout: ProcessLayout) {
        self.layout = layout;
    }

    /// Subscribes to [`StreamEvent`]s on a bounded channel.
    ///
    /// Replaces any earlier subscriber. The capacity is at least one. Events are
    /// dropped while the channel is full.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<StreamEvent> {
        self.events.subscribe(capacity)
    }

    /// The options snapshot in effect for the current wend.
    pub fn options(&self) -> &StreamingOptions {
        &self.options
    }

    /// The process layout.
    pub fn layout(&self) -> ProcessLayout {
        self.layout
    }

    /// Pieces not yet computed this wend.
    pub fn to_do(&self) -> &PieceList {
        &self.to_do
    }

    /// Mutable access to the pending queue, e.g. to install a queue received
    /// from another process.
    pub fn to_do_mut(&mut self) -> &mut PieceList {
        &mut self.to_do
    }

    /// Pieces carried to the next wend.
    pub fn next_frame(&self) -> &PieceList {
        &self.next_frame
    }

    /// Mutable access to the carried queue.
    pub fn next_frame_mut(&mut self) -> &mut PieceList {
        &mut self.next_frame
    }

    /// Scratch queue used while refining. Empty between calls.
    pub fn to_split(&self) -> &PieceList {
        &self.to_split
    }

    /// The piece currently being, or about to be, computed.
    pub fn piece_info(&self) -> &PieceInfo {
        &self.piece_info
    }

    /// Progress flags.
    pub fn state_info(&self) -> &StateInfo {
        &self.state
    }

    /// True once nothing is left worth refining.
    pub fn is_all_done(&self) -> bool {
        self.state.all_done
    }

    /// True once the current wend is exhausted.
    pub fn is_wend_done(&self) -> bool {
        self.state.wend_done
    }

    /// Data produced for the last chosen piece.
    pub fn output(&self) -> Option<&Arc<D>> {
        self.output.as_ref()
    }

    /// Discards all queued work and restarts from the coarsest single piece.
    pub fn clear_priorities(&mut self) {
        self.to_do.clear();
        self.next_frame.clear();
        self.to_split.clear();

        self.state = StateInfo::default();
        let root = Piece::root();
        self.piece_info = PieceInfo::from_piece(&root);
        self.to_do.add_piece(root);

        stream_message(
            self.options.enable_stream_messages,
            format_args!("Scheduler: priorities cleared, restarting from root piece"),
        );
        self.events.emit(StreamEvent::Cleared);
    }

    /// Begins a new wend.
    ///
    /// Re-reads the options, merges the carried work into the pending queue,
    /// re-prioritizes every piece, sorts, and reaps the zero-priority tail.
    pub fn prepare_first_pass(&mut self) -> Result<()> {
        let options = self.options_provider.streaming_options();
        if let Err(err) = options.validate() {
            log::error!("Scheduler: rejected streaming options: {err}");
            return Err(err.into());
        }
        if self.cache.is_none() {
            log::error!("Scheduler: prepare_first_pass without a piece cache");
            return Err(SchedulerError::MissingCache);
        }
        let Some(pipeline) = self.pipeline.as_deref_mut() else {
            log::error!("Scheduler: prepare_first_pass without a pipeline");
            return Err(SchedulerError::MissingPipeline);
        };
        self.options = options;

        self.to_do.merge_piece_list(&mut self.next_frame);
        for piece in self.to_do.iter_mut() {
            piece.priority = piece_priority(pipeline, &self.options, &self.layout, piece);
        }
        self.to_do.sort_priorities();
        self.reap()?;

        if let Some(head) = self.to_do.get_piece(0) {
            self.piece_info = PieceInfo::from_piece(head);
        }
        self.state = StateInfo::default();

        let non_zero = self.to_do.number_non_zero_priority();
        stream_message(
            self.options.enable_stream_messages,
            format_args!(
                "Scheduler: wend started with {} pieces ({} non-zero)",
                self.to_do.len(),
                non_zero
            ),
        );
        self.events.emit(StreamEvent::WendStarted {
            queued: self.to_do.len(),
            non_zero,
        });
        Ok(())
    }

    /// Advances to the next pass within the current wend.
    pub fn prepare_another_pass(&mut self) {
        if let Some(head) = self.to_do.get_piece(0) {
            self.piece_info = PieceInfo::from_piece(head);
        }
        self.state.all_done = false;
        self.state.wend_done = false;
    }

    /// Selects the next piece to render and has it produced.
    ///
    /// The append aggregate preempts the queue once per wend. Otherwise the
    /// highest-priority piece not already inside the aggregate is chosen; every
    /// popped piece is carried to the next wend regardless of the outcome.
    pub fn choose_next_piece(&mut self) -> Result<ChooseOutcome> {
        let Some(cache) = self.cache.as_deref_mut() else {
            log::error!("Scheduler: choose_next_piece without a piece cache");
            return Err(SchedulerError::MissingCache);
        };
        let Some(pipeline) = self.pipeline.as_deref_mut() else {
            log::error!("Scheduler: choose_next_piece without a pipeline");
            return Err(SchedulerError::MissingPipeline);
        };
        let verbose = self.options.enable_stream_messages;

        if self.state.next_append {
            if let Some(aggregate) = cache.appended_data() {
                self.state.next_append = false;
                self.piece_info = PieceInfo::append_slot();
                self.output = Some(aggregate);

                let piece = self.piece_info.as_piece();
                stream_message(verbose, format_args!("Scheduler: serving append aggregate"));
                self.events.emit(StreamEvent::PieceChosen {
                    piece,
                    hit: true,
                    from_append: true,
                });
                return Ok(ChooseOutcome {
                    chosen: Some(piece),
                    from_append: true,
                    hit: true,
                    skipped: 0,
                    wend_just_ended: false,
                });
            }
        }

        let mut chosen = None;
        let mut hit = false;
        let mut skipped = 0;
        while let Some(piece) = self.to_do.pop_front() {
            self.next_frame.add_piece(piece);

            if piece.is_worthless() {
                // Sorted queue: everything behind a worthless piece is worthless too.
                self.next_frame.merge_piece_list(&mut self.to_do);
                stream_message(
                    verbose,
                    format_args!("Scheduler: rest of queue is worthless, carrying it over"),
                );
                break;
            }

            let Some(global) = self.layout.to_global(&piece) else {
                log::warn!(
                    "Scheduler: piece {}/{} has no global id, carrying it over",
                    piece.piece,
                    piece.num_pieces
                );
                skipped += 1;
                continue;
            };
            if cache.in_append(global, piece.resolution) {
                skipped += 1;
                continue;
            }

            hit = cache.in_cache(global, piece.resolution);
            chosen = Some((piece, global));
            break;
        }

        let Some((piece, global)) = chosen else {
            self.state.wend_done = true;
            self.emit_wend_ended();
            return Ok(ChooseOutcome {
                skipped,
                wend_just_ended: true,
                ..ChooseOutcome::default()
            });
        };

        self.piece_info = PieceInfo {
            hit,
            from_append: false,
            ..PieceInfo::from_piece(&piece)
        };

        let wend_just_ended = self.to_do.is_empty();
        if wend_just_ended {
            cache.append_pieces();
        }

        pipeline.set_update_extent(global.piece, global.num_pieces, self.options.ghost_level);
        pipeline.set_update_resolution(piece.resolution);
        self.output = pipeline.update();
        if self.output.is_none() {
            log::warn!(
                "Scheduler: pipeline produced no data for piece {}/{} at {:.3}",
                global.piece,
                global.num_pieces,
                piece.resolution
            );
        }

        stream_message(
            verbose,
            format_args!(
                "Scheduler: chose piece {}/{} res={:.3} pri={:.3} hit={}",
                piece.piece, piece.num_pieces, piece.resolution, piece.priority, hit
            ),
        );
        self.events.emit(StreamEvent::PieceChosen {
            piece,
            hit,
            from_append: false,
        });

        if wend_just_ended {
            self.state.wend_done = true;
            self.emit_wend_ended();
        }

        Ok(ChooseOutcome {
            chosen: Some(piece),
            from_append: false,
            hit,
            skipped,
            wend_just_ended,
        })
    }

    /// Called after a piece has been rendered.
    ///
    /// Once the wend is over, sets `all_done` unless some carried piece still
    /// has a positive priority and room to refine.
    pub fn finish_pass(&mut self) {
        self.state.all_done = false;
        if !self.state.wend_done {
            return;
        }

        let options = &self.options;
        let work_left = self
            .next_frame
            .iter()
            .any(|p| options.is_refinable(p.resolution, p.priority));
        if !work_left {
            self.mark_all_done();
        }
    }

    fn mark_all_done(&mut self) {
        self.state.all_done = true;
        stream_message(
            self.options.enable_stream_messages,
            format_args!("Scheduler: nothing left worth refining"),
        );
        self.events.emit(StreamEvent::AllDone);
    }

    fn emit_wend_ended(&mut self) {
        let carried = self.next_frame.len();
        stream_message(
            self.options.enable_stream_messages,
            format_args!("Scheduler: wend ended, {carried} pieces carried"),
        );
        self.events.emit(StreamEvent::WendEnded { carried });
    }
}

/// Asks the pipeline how much `piece` is worth, in global numbering.
fn piece_priority<D>(
    pipeline: &mut dyn StreamingPipeline<Data = D>,
    options: &StreamingOptions,
    layout: &ProcessLayout,
    piece: &Piece,
) -> f64 {
    if !options.use_prioritization {
        return 1.0;
    }
    let Some(global) = layout.to_global(piece) else {
        log::warn!(
            "Scheduler: piece {}/{} has no global id, treating it as worthless",
            piece.piece,
            piece.num_pieces
        );
        return 0.0;
    };
    pipeline.set_update_extent(global.piece, global.num_pieces, options.ghost_level);
    pipeline.set_update_resolution(piece.resolution);
    pipeline.compute_priority()
}

#[cfg(test)]
mod tests;
