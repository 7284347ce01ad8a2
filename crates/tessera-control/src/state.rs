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

//! State records exposed by the scheduler.

use tessera_core::Piece;

/// The piece currently being, or about to be, computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceInfo {
    /// Local piece index.
    pub piece: u32,
    /// Local sibling-group size.
    pub num_pieces: u32,
    /// Resolution of the request.
    pub resolution: f64,
    /// Priority the piece was chosen with.
    pub priority: f64,
    /// The result was already in the cache.
    pub hit: bool,
    /// The result is the cache's append aggregate.
    pub from_append: bool,
}

impl Default for PieceInfo {
    fn default() -> Self {
        Self::from_piece(&Piece::root())
    }
}

impl PieceInfo {
    /// Describes `piece` as a freshly requested, uncached piece.
    pub fn from_piece(piece: &Piece) -> Self {
        Self {
            piece: piece.piece,
            num_pieces: piece.num_pieces,
            resolution: piece.resolution,
            priority: piece.priority,
            hit: false,
            from_append: false,
        }
    }

    /// The info for the synthetic piece standing for the append aggregate.
    pub fn append_slot() -> Self {
        Self {
            hit: true,
            from_append: true,
            ..Self::default()
        }
    }

    /// The piece described by this record.
    pub fn as_piece(&self) -> Piece {
        Piece {
            piece: self.piece,
            num_pieces: self.num_pieces,
            resolution: self.resolution,
            priority: self.priority,
        }
    }
}

/// Progress flags of the multi-pass sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    /// Nothing anywhere is worth refining further. Terminal until cleared.
    pub all_done: bool,
    /// The current wend's sweep is exhausted.
    pub wend_done: bool,
    /// The next choice may be satisfied from the append aggregate.
    pub next_append: bool,
}

impl Default for StateInfo {
    fn default() -> Self {
        Self {
            all_done: false,
            wend_done: false,
            next_append: true,
        }
    }
}

/// What a call to `choose_next_piece` selected.
///
/// A piece can be chosen *and* end the wend in the same call: the caller must
/// render it and also know the sweep is over.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChooseOutcome {
    /// The selected piece, or `None` when the wend had nothing left.
    pub chosen: Option<Piece>,
    /// The selection is the append aggregate.
    pub from_append: bool,
    /// The selection was already cached.
    pub hit: bool,
    /// Queued pieces skipped because the append aggregate already covers them.
    pub skipped: usize,
    /// This call ended the wend.
    pub wend_just_ended: bool,
}
