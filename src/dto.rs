use crate::pipeline::{ChunkResult, ChunkStatus, TranscriptionOutcome};

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct TranscriptionDto {
    pub text: String,
    pub model: String,
    pub elapsed_ms: u64,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chunks: Option<Vec<ChunkDto>>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ChunkDto {
    pub index: usize,
    pub status: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorDto {
    pub error: String,
}

impl From<&ChunkResult> for ChunkDto {
    fn from(chunk: &ChunkResult) -> Self {
        let error = match &chunk.status {
            ChunkStatus::Failed(reason) => Some(reason.clone()),
            ChunkStatus::Ok | ChunkStatus::Discarded => None,
        };
        Self {
            index: chunk.index,
            status: chunk.status.as_str().to_string(),
            text: chunk.text.clone(),
            error,
        }
    }
}

impl From<TranscriptionOutcome> for TranscriptionDto {
    fn from(outcome: TranscriptionOutcome) -> Self {
        let chunks = if outcome.chunks.is_empty() {
            None
        } else {
            Some(outcome.chunks.iter().map(ChunkDto::from).collect())
        };
        Self {
            text: outcome.text,
            model: outcome.model,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            route: outcome.route.to_string(),
            chunks,
        }
    }
}

impl ErrorDto {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
