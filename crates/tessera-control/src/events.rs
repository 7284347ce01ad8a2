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

//! Stream diagnostics.
//!
//! The scheduler reports its progress two ways: through the `log` facade,
//! at `info` when stream messages are enabled and `trace` otherwise, and as
//! [`StreamEvent`]s on an optional bounded channel for tooling that wants to
//! observe a sweep programmatically.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tessera_core::Piece;

/// A progress notification emitted by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// All queues were discarded and the sweep restarted from the root piece.
    Cleared,
    /// A new wend began.
    WendStarted {
        /// Pieces queued for this wend.
        queued: usize,
        /// Queued pieces with a positive priority.
        non_zero: usize,
    },
    /// Trailing zero-priority pieces were coalesced.
    Reaped {
        /// Queue length before reaping.
        before: usize,
        /// Queue length after reaping.
        after: usize,
    },
    /// A piece was selected for rendering.
    PieceChosen {
        /// The selected piece.
        piece: Piece,
        /// Already cached.
        hit: bool,
        /// Served from the append aggregate.
        from_append: bool,
    },
    /// The current wend ran out of pieces.
    WendEnded {
        /// Pieces carried to the next wend.
        carried: usize,
    },
    /// Pieces were split into finer children.
    Refined {
        /// Number of splits performed.
        splits: usize,
        /// Queue length for the next wend.
        queued: usize,
    },
    /// Sibling groups were merged back into their parents.
    Coarsened {
        /// Number of groups merged.
        merges: usize,
        /// Pieces left for the next wend.
        remaining: usize,
    },
    /// Nothing left is worth refining.
    AllDone,
}

/// The sending half of the diagnostics channel.
#[derive(Debug, Default)]
pub(crate) struct EventSink {
    tx: Option<Sender<StreamEvent>>,
}

impl EventSink {
    /// Replaces any previous subscriber with a fresh bounded channel.
    ///
    /// The capacity is at least one; a rendezvous channel would drop every event.
    pub(crate) fn subscribe(&mut self, capacity: usize) -> Receiver<StreamEvent> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.tx = Some(tx);
        rx
    }

    /// Publishes an event. A full channel drops it; a closed one unsubscribes.
    pub(crate) fn emit(&mut self, event: StreamEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => self.tx = None,
        }
    }
}

/// Logs a scheduler progress line at the verbosity selected by the options.
pub(crate) fn stream_message(verbose: bool, args: std::fmt::Arguments<'_>) {
    if verbose {
        log::info!("{args}");
    } else {
        log::trace!("{args}");
    }
}
