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

//! Tunable parameters of the adaptive streaming scheduler.
//!
//! Options are *read*, not pushed: the scheduler asks its [`OptionsProvider`]
//! for a fresh snapshot at the start of every wend, so a control panel holding
//! a [`SharedOptions`] handle can retune the sweep between frames.

use crate::cache::RESOLUTION_EPSILON;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Parameters of the refine/coarsen schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingOptions {
    /// Number of resolution steps; each refinement adds `1 / height`.
    pub height: u32,
    /// Number of children a piece is split into.
    pub degree: u32,
    /// Maximum number of splits per wend. `None` is unbounded.
    pub max_splits: Option<u32>,
    /// Depth below which pieces may still be split. `None` is unbounded.
    pub max_depth: Option<u32>,
    /// When false every priority is 1.0 and the pipeline is never asked.
    pub use_prioritization: bool,
    /// Emits scheduler progress at `info` level instead of `trace`.
    pub enable_stream_messages: bool,
    /// Ghost level forwarded with every extent request.
    pub ghost_level: u32,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            height: 4,
            degree: 2,
            max_splits: None,
            max_depth: None,
            use_prioritization: true,
            enable_stream_messages: false,
            ghost_level: 0,
        }
    }
}

impl StreamingOptions {
    /// Rejects degenerate configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.height < 1 {
            return Err(ConfigError::InvalidHeight(self.height));
        }
        if self.degree < 1 {
            return Err(ConfigError::InvalidDegree(self.degree));
        }
        Ok(())
    }

    /// Resolution gained by one refinement step.
    pub fn resolution_step(&self) -> f64 {
        1.0 / f64::from(self.height.max(1))
    }

    /// Highest resolution a piece may be refined past.
    ///
    /// | `max_depth` | ceiling |
    /// |---|---|
    /// | `None` | 1.0 |
    /// | `Some(d)` | `d / height` |
    pub fn resolution_ceiling(&self) -> f64 {
        match self.max_depth {
            Some(depth) => f64::from(depth) / f64::from(self.height.max(1)),
            None => 1.0,
        }
    }

    /// Number of splits allowed this wend.
    pub fn split_budget(&self) -> usize {
        self.max_splits.map_or(usize::MAX, |n| n as usize)
    }

    /// True when a piece with this resolution and priority may still be split.
    pub fn is_refinable(&self, resolution: f64, priority: f64) -> bool {
        let limit = self.resolution_ceiling().min(1.0);
        priority > 0.0 && resolution + RESOLUTION_EPSILON < limit
    }

    /// Parses and validates options from JSON.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(source).map_err(|e| ConfigError::Parse {
            format: "json",
            message: e.to_string(),
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Parses and validates options from RON.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let options: Self = ron::from_str(source).map_err(|e| ConfigError::Parse {
            format: "ron",
            message: e.to_string(),
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a `.json` or `.ron` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let source = std::fs::read_to_string(path)?;
        match extension.as_deref() {
            Some("json") => Self::from_json_str(&source),
            Some("ron") => Self::from_ron_str(&source),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// A source of streaming options, queried at the start of each wend.
pub trait OptionsProvider {
    /// Returns the current options snapshot.
    fn streaming_options(&self) -> StreamingOptions;
}

impl OptionsProvider for StreamingOptions {
    fn streaming_options(&self) -> StreamingOptions {
        self.clone()
    }
}

/// Options shared between the scheduler and whoever tunes it.
#[derive(Debug, Clone, Default)]
pub struct SharedOptions(Arc<RwLock<StreamingOptions>>);

impl SharedOptions {
    /// Wraps an initial set of options.
    pub fn new(options: StreamingOptions) -> Self {
        Self(Arc::new(RwLock::new(options)))
    }

    /// Applies `f` to the shared options.
    pub fn update(&self, f: impl FnOnce(&mut StreamingOptions)) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl OptionsProvider for SharedOptions {
    fn streaming_options(&self) -> StreamingOptions {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
