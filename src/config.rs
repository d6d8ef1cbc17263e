use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::media::{FfmpegTranscoder, FfprobeProber};
use crate::pipeline::{AggregationPolicy, PipelineConfig, Transcriber};
use crate::remote::{
    DEFAULT_BASE_URL, DEFAULT_DIARIZE_MODEL, DEFAULT_MODEL, HttpTranscriptionClient, RemoteConfig,
    TranscriptionOptions,
};

pub const DEFAULT_UPLOAD_LIMIT: usize = 512 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub pipeline: PipelineConfig,
    pub media: MediaConfig,
    pub upload_limit_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let remote = RemoteConfig {
            api_key: get("TRANSCRIBE_API_KEY")
                .or_else(|| get("OPENAI_API_KEY"))
                .unwrap_or_default(),
            base_url: get("TRANSCRIBE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: get("TRANSCRIBE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            diarize_model: get("TRANSCRIBE_DIARIZE_MODEL")
                .unwrap_or_else(|| DEFAULT_DIARIZE_MODEL.to_string()),
        };

        let mut pipeline = PipelineConfig::default();
        if let Some(v) = get("TRANSCRIBE_PAYLOAD_CEILING") {
            pipeline.payload_ceiling = parse_var("TRANSCRIBE_PAYLOAD_CEILING", &v)?;
        }
        if let Some(v) = get("TRANSCRIBE_MAX_CONCURRENT") {
            pipeline.max_concurrent = parse_var("TRANSCRIBE_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = get("TRANSCRIBE_AGGREGATION") {
            pipeline.aggregation = AggregationPolicy::from_str(&v)
                .map_err(|e| anyhow!("TRANSCRIBE_AGGREGATION: {e}"))?;
        }
        if let Some(v) = get("TRANSCRIBE_EXPANSION_FACTOR") {
            pipeline.planner.expansion_factor = parse_var("TRANSCRIBE_EXPANSION_FACTOR", &v)?;
        }
        if let Some(v) = get("TRANSCRIBE_SAFETY_MARGIN") {
            pipeline.planner.safety_margin = parse_var("TRANSCRIBE_SAFETY_MARGIN", &v)?;
        }

        let mut media = MediaConfig::default();
        if let Some(v) = get("FFMPEG_PATH") {
            media.ffmpeg_path = PathBuf::from(v);
        }
        if let Some(v) = get("FFPROBE_PATH") {
            media.ffprobe_path = PathBuf::from(v);
        }

        let upload_limit_bytes = match get("TRANSCRIBE_UPLOAD_LIMIT") {
            Some(v) => parse_var("TRANSCRIBE_UPLOAD_LIMIT", &v)?,
            None => DEFAULT_UPLOAD_LIMIT,
        };

        let config = Self {
            remote,
            pipeline,
            media,
            upload_limit_bytes,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;
        if pipeline.payload_ceiling == 0 {
            return Err(anyhow!("TRANSCRIBE_PAYLOAD_CEILING must be greater than zero"));
        }
        if pipeline.max_concurrent == 0 {
            return Err(anyhow!("TRANSCRIBE_MAX_CONCURRENT must be at least 1"));
        }
        let factor = pipeline.planner.expansion_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(anyhow!("TRANSCRIBE_EXPANSION_FACTOR must be a positive number"));
        }
        let margin = pipeline.planner.safety_margin;
        if !(margin > 0.0 && margin <= 1.0) {
            return Err(anyhow!("TRANSCRIBE_SAFETY_MARGIN must be in (0, 1]"));
        }
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<()> {
        if self.remote.api_key.is_empty() {
            Err(anyhow!("TRANSCRIBE_API_KEY is not set"))
        } else {
            Ok(())
        }
    }

    pub fn build_transcriber(&self) -> Transcriber {
        Transcriber::new(
            Arc::new(HttpTranscriptionClient::new(self.remote.clone())),
            Arc::new(FfprobeProber::new(&self.media.ffprobe_path)),
            Arc::new(FfmpegTranscoder::new(&self.media.ffmpeg_path)),
            self.remote.clone(),
            self.pipeline.clone(),
        )
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow!("{key} has invalid value {value:?}: {e}"))
}

#[derive(Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub audio_file: String,
    pub options: TranscriptionOptions,
}

impl ClientConfig {
    pub fn new(server_url: String, audio_file: String, options: TranscriptionOptions) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            audio_file,
            options,
        }
    }
}
