mod assembler;
mod executor;
mod hallucination;
mod orchestrator;
mod planner;
mod router;
mod scratch;
mod segmenter;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use hallucination::HallucinationConfig;
pub use orchestrator::{PlanReport, Transcriber};
pub use planner::PlannerConfig;
pub use router::Route;

use crate::remote::TranscriptionOptions;

pub const DEFAULT_PAYLOAD_CEILING: u64 = 25 * 1024 * 1024;
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const CANONICAL_SAMPLE_RATE: u32 = 16000;
pub const CANONICAL_CHANNELS: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationPolicy {
    #[default]
    FailFast,
    BestEffort,
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationPolicy::FailFast => write!(f, "fail-fast"),
            AggregationPolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(AggregationPolicy::FailFast),
            "best-effort" => Ok(AggregationPolicy::BestEffort),
            other => Err(format!(
                "Unknown aggregation policy: {other}. Use fail-fast or best-effort"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub payload_ceiling: u64,
    pub max_concurrent: usize,
    pub aggregation: AggregationPolicy,
    pub sample_rate: u32,
    pub channels: u16,
    pub planner: PlannerConfig,
    pub hallucination: HallucinationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            payload_ceiling: DEFAULT_PAYLOAD_CEILING,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            aggregation: AggregationPolicy::default(),
            sample_rate: CANONICAL_SAMPLE_RATE,
            channels: CANONICAL_CHANNELS,
            planner: PlannerConfig::default(),
            hallucination: HallucinationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    Ok,
    Discarded,
    Failed(String),
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Ok => "ok",
            ChunkStatus::Discarded => "discarded",
            ChunkStatus::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub index: usize,
    pub text: String,
    pub status: ChunkStatus,
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub path: PathBuf,
    pub options: TranscriptionOptions,
}

impl TranscriptionRequest {
    pub fn new(path: impl Into<PathBuf>, options: TranscriptionOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub model: String,
    pub elapsed: Duration,
    pub route: Route,
    pub chunks: Vec<ChunkResult>,
}
