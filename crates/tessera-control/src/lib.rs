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

//! # Tessera Control
//!
//! The control plane of progressive streaming. The [`AdaptiveScheduler`]
//! decides, render pass by render pass, which piece of the data set to
//! compute next and at which resolution, splitting valuable pieces into finer
//! children between wends and merging worthless siblings back together.
//! [`StreamingDriver`] wraps the per-pass protocol for hosts that do not need
//! to step it by hand.

#![warn(missing_docs)]

pub mod driver;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod state;

pub use driver::{DriverStats, PassReport, StreamingDriver, WendTransition};
pub use error::{Result, SchedulerError};
pub use events::StreamEvent;
pub use scheduler::AdaptiveScheduler;
pub use state::{ChooseOutcome, PieceInfo, StateInfo};
