use std::fmt;
use std::str::FromStr;

use crate::error::TranscribeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
    VerboseJson,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Text => "text",
            ResponseFormat::VerboseJson => "verbose_json",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "text" => Ok(ResponseFormat::Text),
            "verbose_json" | "verbose-json" => Ok(ResponseFormat::VerboseJson),
            other => Err(format!(
                "Unknown response format: {other}. Use json, text, or verbose_json"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptionOptions {
    pub language: Option<String>,
    pub diarize: bool,
    pub response_format: ResponseFormat,
    pub temperature: Option<f32>,
    pub prompt: Option<String>,
}

impl TranscriptionOptions {
    pub fn validated(mut self) -> Result<Self, TranscribeError> {
        self.language = match self.language.take() {
            Some(lang) => {
                let lang = lang.trim().to_lowercase();
                if lang.is_empty() || lang == "auto" {
                    None
                } else if (2..=3).contains(&lang.len())
                    && lang.chars().all(|c| c.is_ascii_lowercase())
                {
                    Some(lang)
                } else {
                    return Err(TranscribeError::InvalidOptions(format!(
                        "language must be an ISO-639 code, got {lang:?}"
                    )));
                }
            }
            None => None,
        };

        if let Some(temperature) = self.temperature {
            if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
                return Err(TranscribeError::InvalidOptions(format!(
                    "temperature must be between 0 and 1, got {temperature}"
                )));
            }
        }

        self.prompt = self
            .prompt
            .take()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(self)
    }
}
