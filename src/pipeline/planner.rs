use log::{debug, info};

use crate::audio::AudioAsset;
use crate::error::TranscribeError;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub safety_margin: f64,
    pub expansion_factor: f64,
    pub min_chunk_secs: u32,
    pub max_chunk_secs: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            safety_margin: 0.8,
            expansion_factor: 2.0,
            min_chunk_secs: 60,
            max_chunk_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedChunk {
    pub index: usize,
    pub start_secs: f64,
    pub span_secs: f64,
}

impl PlannedChunk {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.span_secs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    pub duration_secs: f64,
    pub chunk_secs: u32,
    pub chunks: Vec<PlannedChunk>,
}

impl ChunkPlan {
    /// Cuts `[0, duration)` into back-to-back windows of `chunk_secs`, the last
    /// one taking whatever remains.
    pub fn new(duration_secs: f64, chunk_secs: u32) -> Self {
        let step = f64::from(chunk_secs.max(1));
        let count = ((duration_secs / step).ceil() as usize).max(1);

        let chunks = (0..count)
            .map(|index| {
                let start_secs = index as f64 * step;
                let span_secs = if index + 1 == count {
                    duration_secs - start_secs
                } else {
                    step
                };
                PlannedChunk {
                    index,
                    start_secs,
                    span_secs,
                }
            })
            .collect();

        Self {
            duration_secs,
            chunk_secs,
            chunks,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

pub fn chunk_seconds(
    duration_secs: f64,
    size_bytes: u64,
    ceiling_bytes: u64,
    config: &PlannerConfig,
) -> u32 {
    let min = f64::from(config.min_chunk_secs);
    let max = f64::from(config.max_chunk_secs.max(config.min_chunk_secs));

    let safe_budget = ceiling_bytes as f64 * config.safety_margin;
    let bytes_per_second = size_bytes as f64 / duration_secs;
    let raw = (safe_budget / bytes_per_second).floor();
    let normalized = (raw / config.expansion_factor).floor();

    let clamped = if normalized.is_nan() {
        min
    } else {
        normalized.clamp(min, max)
    };

    debug!(
        "Chunk sizing: budget={safe_budget:.0}B, rate={bytes_per_second:.1}B/s, raw={raw}s, normalized={normalized}s, chosen={clamped}s"
    );

    clamped as u32
}

pub fn plan_chunks(
    asset: &AudioAsset,
    ceiling_bytes: u64,
    config: &PlannerConfig,
) -> Result<ChunkPlan, TranscribeError> {
    let duration = asset.require_duration()?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(TranscribeError::DurationUnknown {
            path: asset.path().to_path_buf(),
            reason: format!("unusable duration {duration}"),
        });
    }

    let chunk_secs = chunk_seconds(duration, asset.size_bytes(), ceiling_bytes, config);
    let plan = ChunkPlan::new(duration, chunk_secs);

    info!(
        "Planned {} chunks of {}s for {} ({:.1}s, {} bytes)",
        plan.len(),
        chunk_secs,
        asset.path().display(),
        duration,
        asset.size_bytes()
    );
    for chunk in &plan.chunks {
        debug!(
            "  Chunk {}: {:.2}s - {:.2}s ({:.2}s)",
            chunk.index,
            chunk.start_secs,
            chunk.end_secs(),
            chunk.span_secs
        );
    }

    Ok(plan)
}
