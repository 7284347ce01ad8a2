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

//! The unit of streamed work.
//!
//! A [`Piece`] addresses one cell of a hierarchical subdivision of the domain:
//! `piece / num_pieces` is the fraction of the whole it covers, `resolution`
//! tells how refined its representation is, and `priority` how much it is
//! worth computing next.

use crate::error::DecodeError;

/// Number of reals a single piece occupies on the wire.
pub const PIECE_WIRE_LEN: usize = 4;

/// One hierarchically-refinable unit of a streamed dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    /// Index within the sibling group, `0 <= piece < num_pieces`.
    pub piece: u32,
    /// Size of the sibling group at this subdivision level.
    pub num_pieces: u32,
    /// Progress from 0.0 (coarsest) to 1.0 (finest).
    pub resolution: f64,
    /// Importance; 0.0 means the piece contributes nothing.
    pub priority: f64,
}

impl Default for Piece {
    fn default() -> Self {
        Self::root()
    }
}

impl Piece {
    /// Creates a piece from its four fields.
    pub fn new(piece: u32, num_pieces: u32, resolution: f64, priority: f64) -> Self {
        debug_assert!(piece < num_pieces, "piece {piece} out of {num_pieces}");
        Self {
            piece,
            num_pieces,
            resolution,
            priority,
        }
    }

    /// The coarsest single piece covering the whole domain.
    pub fn root() -> Self {
        Self::new(0, 1, 0.0, 1.0)
    }

    /// Returns `self` with a different priority.
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Strict "outranks" relation used as the sort predicate.
    #[inline]
    pub fn compare_priority(&self, other: &Piece) -> bool {
        self.priority > other.priority
    }

    /// Copies all four fields from `other`. A missing source is a no-op.
    pub fn copy_from(&mut self, other: Option<&Piece>) {
        match other {
            Some(other) => *self = *other,
            None => log::warn!("Piece::copy_from called without a source piece"),
        }
    }

    /// True when the piece contributes nothing to the image.
    #[inline]
    pub fn is_worthless(&self) -> bool {
        self.priority <= 0.0
    }

    /// Index of the parent this piece would merge into for a given degree.
    #[inline]
    pub fn parent_index(&self, degree: u32) -> u32 {
        self.piece / degree.max(1)
    }

    /// Appends the wire payload `[piece, num_pieces, priority, resolution]`.
    pub fn serialize_into(&self, out: &mut Vec<f64>) {
        out.extend_from_slice(&[
            self.piece as f64,
            self.num_pieces as f64,
            self.priority,
            self.resolution,
        ]);
    }

    /// Decodes one payload from the head of `buf` and returns the unread rest.
    ///
    /// A zero `num_pieces` or a `piece` outside `0..num_pieces` is rejected.
    pub fn deserialize_from(buf: &[f64]) -> Result<(Piece, &[f64]), DecodeError> {
        if buf.len() < PIECE_WIRE_LEN {
            return Err(DecodeError::Truncated {
                needed: PIECE_WIRE_LEN,
                available: buf.len(),
            });
        }
        let (head, rest) = buf.split_at(PIECE_WIRE_LEN);
        let num_pieces = narrow("num_pieces", head[1])?;
        if num_pieces == 0 {
            return Err(DecodeError::InvalidField {
                field: "num_pieces",
                value: head[1],
            });
        }
        let piece = narrow("piece", head[0])?;
        if piece >= num_pieces {
            return Err(DecodeError::InvalidField {
                field: "piece",
                value: head[0],
            });
        }
        let piece = Piece {
            piece,
            num_pieces,
            priority: head[2],
            resolution: head[3],
        };
        Ok((piece, rest))
    }
}

/// Truncates an encoded integer field back to `u32`.
fn narrow(field: &'static str, value: f64) -> Result<u32, DecodeError> {
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(DecodeError::InvalidField { field, value });
    }
    Ok(value.trunc() as u32)
}
