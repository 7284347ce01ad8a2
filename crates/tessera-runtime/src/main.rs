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

// Tessera Runtime
// Streams a synthetic interval around a moving focus point.
//
// Usage: tessera-runtime [options.json|options.ron]

mod strip;

use anyhow::{Context, Result};
use serde::Serialize;
use tessera_control::{AdaptiveScheduler, DriverStats, StreamingDriver};
use tessera_core::{
    CachingPipeline, MemoryPieceCache, PieceCache, SharedOptions, SharedPieceCache,
    StreamingOptions,
};

use strip::{Focus, Strip, StripPipeline};

/// Upper bound on passes per sweep.
const MAX_PASSES: usize = 4096;
/// Distance from the focus at which pieces become worthless.
const FALLOFF: f64 = 0.35;

/// Summary of one sweep, logged as JSON.
#[derive(Debug, Serialize)]
struct SweepSummary {
    label: &'static str,
    focus: f64,
    passes: usize,
    wends: usize,
    pieces_rendered: usize,
    cache_hits: usize,
    append_hits: usize,
    splits: usize,
    merges: usize,
    cached_pieces: usize,
    aggregate_samples: usize,
}

impl SweepSummary {
    fn new(
        label: &'static str,
        focus: f64,
        stats: DriverStats,
        cache: &SharedPieceCache<Strip>,
    ) -> Self {
        let cache = cache.lock();
        let aggregate_samples = cache.appended_data().map_or(0, |strip| strip.samples);
        Self {
            label,
            focus,
            passes: stats.passes,
            wends: stats.wends,
            pieces_rendered: stats.pieces_rendered,
            cache_hits: stats.cache_hits,
            append_hits: stats.append_hits,
            splits: stats.splits,
            merges: stats.merges,
            cached_pieces: cache.len(),
            aggregate_samples,
        }
    }

    fn log(&self) -> Result<()> {
        let json = serde_json::to_string(self).context("failed to encode sweep summary")?;
        log::info!("{json}");
        Ok(())
    }
}

fn load_options() -> Result<StreamingOptions> {
    match std::env::args().nth(1) {
        Some(path) => StreamingOptions::load(&path)
            .with_context(|| format!("failed to load streaming options from {path}")),
        None => Ok(StreamingOptions {
            height: 6,
            enable_stream_messages: true,
            ..Default::default()
        }),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let options = SharedOptions::new(load_options()?);
    let focus = Focus::new(0.2);
    let cache = SharedPieceCache::new(MemoryPieceCache::new(Strip::merge));

    let mut scheduler = AdaptiveScheduler::new();
    scheduler.set_pipeline(CachingPipeline::new(
        StripPipeline::new(focus.clone(), FALLOFF),
        cache.clone(),
    ));
    scheduler.set_cache(cache.clone());
    scheduler
        .set_options_provider(options.clone())
        .context("invalid streaming options")?;
    let mut driver = StreamingDriver::new(scheduler);

    let stats = driver.run_to_completion(MAX_PASSES)?;
    SweepSummary::new("initial", focus.get(), stats, &cache).log()?;

    // The viewer moved: restart from the root around the new focus.
    focus.move_to(0.8);
    driver.reset();
    let stats = driver.run_to_completion(MAX_PASSES)?;
    SweepSummary::new("refocused", focus.get(), stats, &cache).log()?;

    // Memory pressure: give back one level of detail and cap the depth.
    options.update(|o| {
        let depth = o.height.saturating_sub(1).max(1);
        o.max_depth = Some(depth);
    });
    driver.request_coarsen();
    let stats = driver.run_to_completion(MAX_PASSES)?;
    SweepSummary::new("coarsened", focus.get(), stats, &cache).log()?;

    Ok(())
}
