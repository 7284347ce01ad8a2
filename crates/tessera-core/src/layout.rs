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

//! Mapping of local pieces into the global piece numbering of a multi-process run.

use crate::error::ConfigError;
use crate::piece::Piece;

/// A piece address in the global numbering shared by every rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalPiece {
    /// Global piece index.
    pub piece: u32,
    /// Global sibling-group size.
    pub num_pieces: u32,
}

/// Position of this process within the data decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLayout {
    rank: u32,
    ranks: u32,
}

impl Default for ProcessLayout {
    fn default() -> Self {
        Self { rank: 0, ranks: 1 }
    }
}

impl ProcessLayout {
    /// Creates a layout for `rank` out of `ranks` processes.
    pub fn new(rank: u32, ranks: u32) -> Result<Self, ConfigError> {
        if ranks == 0 || rank >= ranks {
            return Err(ConfigError::InvalidLayout { rank, ranks });
        }
        Ok(Self { rank, ranks })
    }

    /// Local rank.
    pub fn rank(&self) -> u32 {
        self.rank
    }

    /// Total number of ranks.
    pub fn ranks(&self) -> u32 {
        self.ranks
    }

    /// Size of the global sibling group for a local group of `num_pieces`.
    ///
    /// `None` when it does not fit the `u32` numbering.
    pub fn global_count(&self, num_pieces: u32) -> Option<u32> {
        self.ranks.checked_mul(num_pieces)
    }

    /// `rank * num_pieces + piece` out of `ranks * num_pieces`.
    ///
    /// `None` when the global numbering would overflow `u32`.
    pub fn to_global(&self, piece: &Piece) -> Option<GlobalPiece> {
        let num_pieces = self.global_count(piece.num_pieces)?;
        let index = self
            .rank
            .checked_mul(piece.num_pieces)?
            .checked_add(piece.piece)?;
        Some(GlobalPiece {
            piece: index,
            num_pieces,
        })
    }
}
