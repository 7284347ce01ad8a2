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

//! An ordered, priority-sortable work queue of [`Piece`]s.
//!
//! The list owns its elements by value. Moving a piece between lists is a
//! pop from one and a push onto the other; [`PieceList::merge_piece_list`]
//! drains the source and [`PieceList::copy_piece_list`] leaves it untouched.
//!
//! # Wire format
//!
//! A serialized list is a flat run of `f64`: the piece count followed by each
//! piece's `[piece, num_pieces, priority, resolution]` payload in list order.

use crate::error::DecodeError;
use crate::piece::{Piece, PIECE_WIRE_LEN};
use std::cmp::Ordering;

/// A mutable queue of pieces.
#[derive(Debug, Clone, Default)]
pub struct PieceList {
    pieces: Vec<Piece>,
    serialized: Vec<f64>,
}

impl PieceList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a piece to the tail; the list owns its own copy.
    pub fn add_piece(&mut self, piece: Piece) {
        self.pieces.push(piece);
    }

    /// Returns the piece at `n`, or `None` when out of range.
    pub fn get_piece(&self, n: usize) -> Option<&Piece> {
        self.pieces.get(n)
    }

    /// Deletes the piece at `n`, shifting later pieces down. Out of range is a no-op.
    pub fn remove_piece(&mut self, n: usize) {
        if n < self.pieces.len() {
            self.pieces.remove(n);
        }
    }

    /// Removes and returns the piece at `n`.
    pub fn pop_piece(&mut self, n: usize) -> Option<Piece> {
        if n < self.pieces.len() {
            Some(self.pieces.remove(n))
        } else {
            None
        }
    }

    /// Removes and returns the head. Right after a sort this is the highest priority piece.
    pub fn pop_front(&mut self) -> Option<Piece> {
        self.pop_piece(0)
    }

    /// Removes every piece.
    pub fn clear(&mut self) {
        self.pieces.clear();
    }

    /// Number of pieces in the list.
    pub fn number_of_pieces(&self) -> usize {
        self.pieces.len()
    }

    /// Alias of [`number_of_pieces`](Self::number_of_pieces).
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// True when the list holds no pieces.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Sorts by descending priority. Equal priorities keep their relative order.
    pub fn sort_priorities(&mut self) {
        self.pieces.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Counts the leading pieces with a positive priority.
    ///
    /// Only meaningful right after [`sort_priorities`](Self::sort_priorities):
    /// the scan walks backward from the tail and stops at the first positive
    /// priority, so on an unsorted list it returns the index past the last
    /// positive piece rather than a count.
    pub fn number_non_zero_priority(&self) -> usize {
        self.pieces
            .iter()
            .rposition(|p| p.priority > 0.0)
            .map_or(0, |i| i + 1)
    }

    /// Replaces the contents of `self` with copies of every piece in `other`.
    pub fn copy_piece_list(&mut self, other: &PieceList) {
        self.pieces.clear();
        self.pieces.extend_from_slice(&other.pieces);
    }

    /// Moves every piece of `other` to the tail of `self`, leaving `other` empty.
    ///
    /// No re-sort is performed.
    pub fn merge_piece_list(&mut self, other: &mut PieceList) {
        self.pieces.append(&mut other.pieces);
    }

    /// Iterates over the pieces in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, Piece> {
        self.pieces.iter()
    }

    /// Iterates mutably over the pieces in list order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Piece> {
        self.pieces.iter_mut()
    }

    /// Splits the list at `at`, returning the tail as a new list.
    ///
    /// `at` past the end yields an empty tail.
    pub fn split_off(&mut self, at: usize) -> PieceList {
        let at = at.min(self.pieces.len());
        self.pieces.split_off(at).into_iter().collect()
    }

    /// Removes every piece, yielding them in list order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Piece> {
        self.pieces.drain(..)
    }

    /// The pieces as a slice.
    pub fn as_slice(&self) -> &[Piece] {
        &self.pieces
    }

    /// Encodes the list into a fresh flat buffer.
    pub fn to_wire(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(1 + self.pieces.len() * PIECE_WIRE_LEN);
        out.push(self.pieces.len() as f64);
        for piece in &self.pieces {
            piece.serialize_into(&mut out);
        }
        out
    }

    /// Encodes the list into the internal buffer exposed by
    /// [`serialized_list`](Self::serialized_list).
    pub fn serialize(&mut self) {
        self.serialized = self.to_wire();
    }

    /// The buffer produced by the last [`serialize`](Self::serialize) call.
    pub fn serialized_list(&self) -> &[f64] {
        &self.serialized
    }

    /// Replaces the contents with the pieces decoded from `buf`.
    ///
    /// The list is cleared first and stays empty when decoding fails.
    pub fn unserialize(&mut self, buf: &[f64]) -> Result<(), DecodeError> {
        self.pieces.clear();
        let decoded = Self::decode(buf)?;
        self.pieces = decoded;
        Ok(())
    }

    /// Builds a list from a flat buffer.
    pub fn from_wire(buf: &[f64]) -> Result<Self, DecodeError> {
        Ok(Self {
            pieces: Self::decode(buf)?,
            serialized: Vec::new(),
        })
    }

    /// Encodes the list as native-endian bytes for transport between processes.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice::<f64, u8>(&self.to_wire()).to_vec()
    }

    /// Decodes a list from bytes produced by [`to_wire_bytes`](Self::to_wire_bytes).
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() % std::mem::size_of::<f64>() != 0 {
            return Err(DecodeError::MisalignedBytes(bytes.len()));
        }
        let values: Vec<f64> = bytes
            .chunks_exact(std::mem::size_of::<f64>())
            .map(bytemuck::pod_read_unaligned::<f64>)
            .collect();
        Self::from_wire(&values)
    }

    fn decode(buf: &[f64]) -> Result<Vec<Piece>, DecodeError> {
        let (&count, mut rest) = buf.split_first().ok_or(DecodeError::Truncated {
            needed: 1,
            available: 0,
        })?;
        if !count.is_finite() || count < 0.0 {
            return Err(DecodeError::InvalidCount(count));
        }
        let count = count.trunc() as usize;
        let needed = count.saturating_mul(PIECE_WIRE_LEN);
        if rest.len() < needed {
            return Err(DecodeError::Truncated {
                needed,
                available: rest.len(),
            });
        }

        let mut pieces = Vec::with_capacity(count);
        for _ in 0..count {
            let (piece, tail) = Piece::deserialize_from(rest)?;
            pieces.push(piece);
            rest = tail;
        }
        Ok(pieces)
    }
}

impl PartialEq for PieceList {
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
    }
}

impl FromIterator<Piece> for PieceList {
    fn from_iter<I: IntoIterator<Item = Piece>>(iter: I) -> Self {
        Self {
            pieces: iter.into_iter().collect(),
            serialized: Vec::new(),
        }
    }
}

impl Extend<Piece> for PieceList {
    fn extend<I: IntoIterator<Item = Piece>>(&mut self, iter: I) {
        self.pieces.extend(iter);
    }
}

impl<'a> IntoIterator for &'a PieceList {
    type Item = &'a Piece;
    type IntoIter = std::slice::Iter<'a, Piece>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.iter()
    }
}
