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

//! Errors reported by the scheduler.

use tessera_core::ConfigError;
use thiserror::Error;

/// A contract violation detected by the scheduler.
///
/// Operations that fail leave the queues and state exactly as they were.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No pipeline was attached before an operation that needs one.
    #[error("no streaming pipeline attached")]
    MissingPipeline,
    /// No piece cache was attached before an operation that needs one.
    #[error("no piece cache attached")]
    MissingCache,
    /// The options read at the start of the wend are degenerate.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used by the scheduler and the driver.
pub type Result<T> = std::result::Result<T, SchedulerError>;
