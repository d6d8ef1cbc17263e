use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::TranscribeError;
use crate::media::DurationProber;

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

pub fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension)
}

pub fn mime_type_for(extension: &str) -> &'static str {
    match extension {
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "mp4" => "video/mp4",
        "oga" | "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbedDuration {
    Known(f64),
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct AudioAsset {
    path: PathBuf,
    size_bytes: u64,
    duration: ProbedDuration,
    extension: String,
}

impl AudioAsset {
    /// Reads the file size and probes the duration. A failed probe is recorded,
    /// not raised: only the chunked route needs the duration.
    pub async fn inspect(path: &Path, prober: &dyn DurationProber) -> Result<Self, TranscribeError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TranscribeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            )));
        }

        let duration = match prober.probe(path).await {
            Ok(secs) => ProbedDuration::Known(secs),
            Err(e) => {
                warn!("Could not probe {}: {e}", path.display());
                ProbedDuration::Unknown(e.to_string())
            }
        };

        let asset = Self::from_parts(path.to_path_buf(), metadata.len(), duration);
        debug!(
            "Inspected {}: {} bytes, {:?}, extension {:?}",
            asset.path.display(),
            asset.size_bytes,
            asset.duration,
            asset.extension
        );
        Ok(asset)
    }

    pub fn from_parts(path: PathBuf, size_bytes: u64, duration: ProbedDuration) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        Self {
            path,
            size_bytes,
            duration,
            extension,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn duration(&self) -> &ProbedDuration {
        &self.duration
    }

    pub fn require_duration(&self) -> Result<f64, TranscribeError> {
        match &self.duration {
            ProbedDuration::Known(secs) => Ok(*secs),
            ProbedDuration::Unknown(reason) => Err(TranscribeError::DurationUnknown {
                path: self.path.clone(),
                reason: reason.clone(),
            }),
        }
    }

    pub fn is_supported_format(&self) -> bool {
        is_supported_extension(&self.extension)
    }

    pub fn mime_type(&self) -> &'static str {
        mime_type_for(&self.extension)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("audio.{}", self.extension))
    }
}
