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

//! # Tessera Core
//!
//! Foundational crate containing the streamed-work value types, the piece
//! queue and its wire format, and the interface contracts the adaptive
//! scheduler uses to talk to the pipeline and the piece cache.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod layout;
pub mod options;
pub mod piece;
pub mod piece_list;
pub mod pipeline;

pub use cache::{CacheIndex, CachingPipeline, MemoryPieceCache, PieceCache, SharedPieceCache};
pub use error::{ConfigError, DecodeError};
pub use layout::{GlobalPiece, ProcessLayout};
pub use options::{OptionsProvider, SharedOptions, StreamingOptions};
pub use piece::Piece;
pub use piece_list::PieceList;
pub use pipeline::StreamingPipeline;
