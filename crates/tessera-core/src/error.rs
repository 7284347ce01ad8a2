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

//! Error types shared by the piece codec and the configuration layer.

use thiserror::Error;

/// An error raised while decoding a flat piece buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The buffer ended before the declared payload was complete.
    #[error("truncated piece buffer: needed {needed} values, found {available}")]
    Truncated {
        /// Number of reals required to finish decoding.
        needed: usize,
        /// Number of reals actually present.
        available: usize,
    },
    /// The leading piece count is negative or not finite.
    #[error("invalid piece count {0}")]
    InvalidCount(f64),
    /// An integer field could not be narrowed from its real encoding.
    #[error("invalid value {value} for field '{field}'")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The raw encoded value.
        value: f64,
    },
    /// A byte payload is not a whole number of 8-byte reals.
    #[error("byte payload of {0} bytes is not a multiple of 8")]
    MisalignedBytes(usize),
}

/// An error raised when streaming options are degenerate or cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `height` must be at least one resolution step.
    #[error("height must be >= 1 (got {0})")]
    InvalidHeight(u32),
    /// `degree` must produce at least one child per split.
    #[error("degree must be >= 1 (got {0})")]
    InvalidDegree(u32),
    /// The process layout places the local rank outside the rank count.
    #[error("rank {rank} is out of range for {ranks} ranks")]
    InvalidLayout {
        /// Local rank.
        rank: u32,
        /// Total number of ranks.
        ranks: u32,
    },
    /// The options file could not be parsed.
    #[error("failed to parse {format} options: {message}")]
    Parse {
        /// Format name (`json` or `ron`).
        format: &'static str,
        /// Parser message.
        message: String,
    },
    /// The options file extension is not recognised.
    #[error("unsupported options file '{0}' (expected .json or .ron)")]
    UnsupportedFormat(String),
    /// The options file could not be read.
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),
}
