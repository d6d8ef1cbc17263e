use async_trait::async_trait;
use log::{debug, error};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::TranscribeError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start_secs: f64,
    pub span_secs: f64,
}

impl TimeWindow {
    /// True when the span is below ffmpeg's millisecond resolution and would
    /// be passed as `-t 0.000`.
    pub fn is_empty(&self) -> bool {
        (self.span_secs * 1000.0).round() < 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetCodec {
    StreamCopy,
    Pcm { sample_rate: u32, channels: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub window: Option<TimeWindow>,
    pub codec: TargetCodec,
}

impl TranscodeJob {
    pub fn normalize(input: &Path, output: &Path, sample_rate: u32, channels: u16) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            window: None,
            codec: TargetCodec::Pcm {
                sample_rate,
                channels,
            },
        }
    }

    pub fn extract(input: &Path, output: &Path, window: TimeWindow, codec: TargetCodec) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            window: Some(window),
            codec,
        }
    }
}

#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    async fn transcode(&self, job: &TranscodeJob) -> Result<PathBuf, TranscribeError>;
}

pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<PathBuf, TranscribeError> {
        let failed = |reason: String| TranscribeError::ConversionFailed {
            path: job.input.clone(),
            reason,
        };

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(build_args(job))
            .stdin(std::process::Stdio::null());

        debug!("ffmpeg command: {command:?}");

        let output = command
            .output()
            .await
            .map_err(|e| failed(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "ffmpeg exited with {} for {}: {}",
                output.status,
                job.input.display(),
                stderr.trim()
            );
            return Err(failed(format!("ffmpeg exited with {}", output.status)));
        }

        Ok(job.output.clone())
    }
}

// Argument list for one ffmpeg invocation. Seeking happens before `-i` so
// ffmpeg skips straight to the window instead of decoding up to it.
pub fn build_args(job: &TranscodeJob) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];

    if let Some(window) = job.window {
        args.push("-ss".into());
        args.push(format!("{:.3}", window.start_secs).into());
        args.push("-t".into());
        args.push(format!("{:.3}", window.span_secs).into());
    }

    args.push("-i".into());
    args.push(job.input.clone().into_os_string());
    args.push("-vn".into());

    match job.codec {
        TargetCodec::StreamCopy => {
            args.push("-c:a".into());
            args.push("copy".into());
        }
        TargetCodec::Pcm {
            sample_rate,
            channels,
        } => {
            args.push("-acodec".into());
            args.push("pcm_s16le".into());
            args.push("-ar".into());
            args.push(sample_rate.to_string().into());
            args.push("-ac".into());
            args.push(channels.to_string().into());
        }
    }

    args.push(job.output.clone().into_os_string());
    args
}
