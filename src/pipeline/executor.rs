use futures_util::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use super::hallucination::HallucinationFilter;
use super::segmenter::ChunkSpec;
use super::{AggregationPolicy, ChunkResult, ChunkStatus};
use crate::error::TranscribeError;
use crate::remote::{AudioPayload, TranscriptionClient, TranscriptionOptions};

pub struct BatchExecutor {
    client: Arc<dyn TranscriptionClient>,
    filter: HallucinationFilter,
    max_concurrent: usize,
    policy: AggregationPolicy,
}

impl BatchExecutor {
    pub fn new(
        client: Arc<dyn TranscriptionClient>,
        filter: HallucinationFilter,
        max_concurrent: usize,
        policy: AggregationPolicy,
    ) -> Self {
        Self {
            client,
            filter,
            max_concurrent: max_concurrent.max(1),
            policy,
        }
    }

    /// Returns one result per chunk in index order. Under `FailFast` the first
    /// failing batch ends the run with the lowest failing index.
    pub async fn transcribe_all(
        &self,
        chunks: &[ChunkSpec],
        model: &str,
        options: &TranscriptionOptions,
    ) -> Result<Vec<ChunkResult>, TranscribeError> {
        let started = Instant::now();
        let total = chunks.len();
        let mut results = Vec::with_capacity(total);

        info!(
            "Transcribing {total} chunks, at most {} at a time",
            self.max_concurrent
        );

        for (batch_number, batch) in chunks.chunks(self.max_concurrent).enumerate() {
            // join_all yields outputs in submission order, so each outcome
            // stays paired with its chunk index regardless of finish order
            let outcomes = join_all(batch.iter().map(|chunk| async move {
                (chunk.index, self.transcribe_one(chunk, model, options).await)
            }))
            .await;

            for (index, outcome) in outcomes {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => match self.policy {
                        AggregationPolicy::FailFast => {
                            return Err(TranscribeError::ChunkTranscriptionFailed {
                                index,
                                source: Box::new(e),
                            });
                        }
                        AggregationPolicy::BestEffort => {
                            warn!("Chunk {index} failed, continuing without it: {e}");
                            results.push(ChunkResult {
                                index,
                                text: String::new(),
                                status: ChunkStatus::Failed(e.to_string()),
                            });
                        }
                    },
                }
            }

            info!(
                "Batch {} done: {}/{} chunks after {:.1}s",
                batch_number + 1,
                results.len(),
                total,
                started.elapsed().as_secs_f32()
            );
        }

        results.sort_by_key(|r| r.index);
        Ok(results)
    }

    async fn transcribe_one(
        &self,
        chunk: &ChunkSpec,
        model: &str,
        options: &TranscriptionOptions,
    ) -> Result<ChunkResult, TranscribeError> {
        let Some(path) = chunk.path() else {
            debug!(
                "Chunk {} spans {:.6}s, nothing to send",
                chunk.index, chunk.span_secs
            );
            return Ok(ChunkResult {
                index: chunk.index,
                text: String::new(),
                status: ChunkStatus::Ok,
            });
        };

        let started = Instant::now();
        let bytes = tokio::fs::read(path).await?;
        let payload = AudioPayload {
            bytes,
            file_name: chunk.file_name(),
            mime_type: chunk.mime_type(),
        };

        let text = self.client.transcribe(payload, model, options).await?;

        let result = if self.filter.is_hallucination(&text) {
            warn!(
                "Discarding chunk {} ({:.1}s at {:.1}s): repetitive output",
                chunk.index, chunk.span_secs, chunk.start_secs
            );
            ChunkResult {
                index: chunk.index,
                text: String::new(),
                status: ChunkStatus::Discarded,
            }
        } else {
            ChunkResult {
                index: chunk.index,
                text,
                status: ChunkStatus::Ok,
            }
        };

        info!(
            "Chunk {} transcribed in {:.1}s ({} characters)",
            chunk.index,
            started.elapsed().as_secs_f32(),
            result.text.len()
        );

        Ok(result)
    }
}
