use async_trait::async_trait;
use log::{debug, error};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::TranscribeError;

#[async_trait]
pub trait DurationProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<f64, TranscribeError>;
}

pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

#[async_trait]
impl DurationProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<f64, TranscribeError> {
        let unknown = |reason: String| TranscribeError::DurationUnknown {
            path: path.to_path_buf(),
            reason,
        };

        let mut command = Command::new(&self.ffprobe_path);
        command
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(std::process::Stdio::null());

        debug!("ffprobe command: {command:?}");

        let output = command
            .output()
            .await
            .map_err(|e| unknown(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffprobe exited with {} for {}: {stderr}", output.status, path.display());
            return Err(unknown(format!("ffprobe exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration = parse_duration(&stdout).map_err(unknown)?;
        debug!("Probed {}: {duration:.2}s", path.display());
        Ok(duration)
    }
}

pub fn parse_duration(output: &str) -> Result<f64, String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty());
    let Some(line) = line else {
        return Err("ffprobe reported no duration".to_string());
    };

    let value: f64 = line
        .parse()
        .map_err(|_| format!("ffprobe output {line:?} is not a number"))?;

    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("ffprobe reported a non-positive duration {line:?}"))
    }
}
