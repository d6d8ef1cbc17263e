use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("duration of {path} is unknown: {reason}")]
    DurationUnknown { path: PathBuf, reason: String },

    #[error("conversion of {path} failed: {reason}")]
    ConversionFailed { path: PathBuf, reason: String },

    #[error("remote endpoint rejected credentials: {0}")]
    RemoteAuth(String),

    #[error("remote endpoint rate limit reached: {0}")]
    RemoteRateLimited(String),

    #[error("remote endpoint could not decode the audio: {0}")]
    RemoteFormat(String),

    #[error("remote request failed: {0}")]
    Remote(String),

    #[error("transcription of chunk {index} failed")]
    ChunkTranscriptionFailed {
        index: usize,
        #[source]
        source: Box<TranscribeError>,
    },

    #[error("invalid request options: {0}")]
    InvalidOptions(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscribeError {
    /// Message shown to whoever submitted the audio. Internal details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            TranscribeError::DurationUnknown { .. } => {
                "Could not determine the length of the audio file".to_string()
            }
            TranscribeError::ConversionFailed { .. } => {
                "The audio file could not be converted for transcription".to_string()
            }
            TranscribeError::RemoteAuth(_) => {
                "The transcription service rejected the configured credentials".to_string()
            }
            TranscribeError::RemoteRateLimited(_) => {
                "The transcription service is rate limiting requests, try again later"
                    .to_string()
            }
            TranscribeError::RemoteFormat(_) => {
                "The audio format is not supported or the file is corrupt".to_string()
            }
            TranscribeError::Remote(_) => "The transcription service request failed".to_string(),
            TranscribeError::ChunkTranscriptionFailed { index, source } => {
                format!("Segment {} failed: {}", index + 1, source.user_message())
            }
            TranscribeError::InvalidOptions(reason) => format!("Invalid request: {reason}"),
            TranscribeError::Io(_) => "The audio file could not be read".to_string(),
        }
    }

    pub fn is_content_error(&self) -> bool {
        matches!(self, TranscribeError::RemoteFormat(_))
    }
}
