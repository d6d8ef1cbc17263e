use async_trait::async_trait;
use log::{debug, info};
use reqwest::{StatusCode, multipart};
use std::time::Instant;

use super::RemoteConfig;
use super::options::{ResponseFormat, TranscriptionOptions};
use crate::error::TranscribeError;

#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(
        &self,
        audio: AudioPayload,
        model: &str,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscribeError>;
}

#[derive(serde::Deserialize)]
struct TranscriptionBody {
    text: String,
}

pub struct HttpTranscriptionClient {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl HttpTranscriptionClient {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_form(
        audio: AudioPayload,
        model: &str,
        options: &TranscriptionOptions,
    ) -> Result<multipart::Form, TranscribeError> {
        let file_part = multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(audio.mime_type)
            .map_err(|e| TranscribeError::Remote(format!("mime: {e}")))?;

        let mut form = multipart::Form::new()
            .text("model", model.to_string())
            .text("response_format", options.response_format.as_str())
            .part("file", file_part);

        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = &options.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if let Some(temperature) = options.temperature {
            form = form.text("temperature", temperature.to_string());
        }

        Ok(form)
    }
}

#[async_trait]
impl TranscriptionClient for HttpTranscriptionClient {
    async fn transcribe(
        &self,
        audio: AudioPayload,
        model: &str,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscribeError> {
        let started = Instant::now();
        let size = audio.bytes.len();
        let form = Self::build_form(audio, model, options)?;

        debug!("Sending {size} bytes to {} (model {model})", self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscribeError::Remote(format!("request: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscribeError::Remote(format!("body: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let text = parse_body(options.response_format, &body)?;

        info!(
            "Remote transcription of {size} bytes completed in {:.1}s: {} characters",
            started.elapsed().as_secs_f32(),
            text.len()
        );

        Ok(text)
    }
}

fn parse_body(format: ResponseFormat, body: &str) -> Result<String, TranscribeError> {
    match format {
        ResponseFormat::Text => Ok(body.trim().to_string()),
        ResponseFormat::Json | ResponseFormat::VerboseJson => {
            let parsed: TranscriptionBody = serde_json::from_str(body)
                .map_err(|e| TranscribeError::Remote(format!("invalid JSON response: {e}")))?;
            Ok(parsed.text.trim().to_string())
        }
    }
}

const CONTENT_ERROR_MARKERS: &[&str] = &[
    "invalid file format",
    "unsupported",
    "could not be decoded",
    "corrupt",
    "invalid audio",
    "audio file could not",
];

pub fn classify_failure(status: StatusCode, body: &str) -> TranscribeError {
    let detail = format!("status {status}: {}", body.trim());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranscribeError::RemoteAuth(detail),
        StatusCode::TOO_MANY_REQUESTS => TranscribeError::RemoteRateLimited(detail),
        StatusCode::BAD_REQUEST
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => {
            let lowered = body.to_lowercase();
            if CONTENT_ERROR_MARKERS.iter().any(|m| lowered.contains(m)) {
                TranscribeError::RemoteFormat(detail)
            } else {
                TranscribeError::Remote(detail)
            }
        }
        _ => TranscribeError::Remote(detail),
    }
}
