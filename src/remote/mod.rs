mod client;
mod options;

pub use client::{AudioPayload, HttpTranscriptionClient, TranscriptionClient};
pub use options::{ResponseFormat, TranscriptionOptions};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "whisper-1";
pub const DEFAULT_DIARIZE_MODEL: &str = "gpt-4o-transcribe-diarize";

#[derive(Clone)]
pub struct RemoteConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub diarize_model: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("diarize_model", &self.diarize_model)
            .finish()
    }
}

impl RemoteConfig {
    pub fn model_for(&self, options: &TranscriptionOptions) -> &str {
        if options.diarize {
            &self.diarize_model
        } else {
            &self.model
        }
    }
}
