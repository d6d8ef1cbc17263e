use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::assembler::assemble;
use super::executor::BatchExecutor;
use super::hallucination::HallucinationFilter;
use super::planner::{ChunkPlan, plan_chunks};
use super::router::{Route, initial_route};
use super::scratch::ScratchDir;
use super::segmenter::Segmenter;
use super::{ChunkResult, PipelineConfig, TranscriptionOutcome, TranscriptionRequest};
use crate::audio::AudioAsset;
use crate::error::TranscribeError;
use crate::media::{DurationProber, MediaTranscoder, TranscodeJob};
use crate::remote::{AudioPayload, RemoteConfig, TranscriptionClient, TranscriptionOptions};

#[derive(Debug, Clone)]
pub struct PlanReport {
    pub asset: AudioAsset,
    pub route: Route,
    pub plan: Option<ChunkPlan>,
}

pub struct Transcriber {
    client: Arc<dyn TranscriptionClient>,
    prober: Arc<dyn DurationProber>,
    transcoder: Arc<dyn MediaTranscoder>,
    remote: RemoteConfig,
    config: PipelineConfig,
}

impl Transcriber {
    pub fn new(
        client: Arc<dyn TranscriptionClient>,
        prober: Arc<dyn DurationProber>,
        transcoder: Arc<dyn MediaTranscoder>,
        remote: RemoteConfig,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            prober,
            transcoder,
            remote,
            config,
        }
    }

    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionOutcome, TranscribeError> {
        let started = Instant::now();
        let options = request.options.validated()?;
        let model = self.remote.model_for(&options).to_string();

        let asset = AudioAsset::inspect(&request.path, self.prober.as_ref()).await?;
        let scratch = ScratchDir::new()?;
        let ceiling = self.config.payload_ceiling;

        let route = initial_route(&asset, ceiling);
        info!(
            "Transcribing {} ({} bytes, .{}) via {route} route with model {model}",
            asset.path().display(),
            asset.size_bytes(),
            asset.extension()
        );

        let (text, route, chunks) = match route {
            Route::Chunked => {
                let chunks = self.run_chunked(&asset, &model, &options, &scratch).await?;
                (assemble(&chunks), Route::Chunked, chunks)
            }
            Route::Direct => match self.submit_original(&asset, &model, &options).await {
                Ok(text) => (text, Route::Direct, Vec::new()),
                Err(e) if e.is_content_error() => {
                    warn!(
                        "Endpoint rejected {} as sent, normalizing: {e}",
                        asset.path().display()
                    );
                    self.normalize_and_submit(&asset, &model, &options, &scratch)
                        .await?
                }
                Err(e) => return Err(e),
            },
            Route::Normalized => {
                self.normalize_and_submit(&asset, &model, &options, &scratch)
                    .await?
            }
        };

        let elapsed = started.elapsed();
        info!(
            "Finished {} via {route} route in {:.1}s: {} characters",
            asset.path().display(),
            elapsed.as_secs_f32(),
            text.len()
        );

        Ok(TranscriptionOutcome {
            text,
            model,
            elapsed,
            route,
            chunks,
        })
    }

    pub async fn plan(&self, path: &Path) -> Result<PlanReport, TranscribeError> {
        let asset = AudioAsset::inspect(path, self.prober.as_ref()).await?;
        let route = initial_route(&asset, self.config.payload_ceiling);
        let plan = match route {
            Route::Chunked => Some(plan_chunks(
                &asset,
                self.config.payload_ceiling,
                &self.config.planner,
            )?),
            Route::Direct | Route::Normalized => None,
        };

        Ok(PlanReport { asset, route, plan })
    }

    async fn submit_original(
        &self,
        asset: &AudioAsset,
        model: &str,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscribeError> {
        let bytes = tokio::fs::read(asset.path()).await?;
        let payload = AudioPayload {
            bytes,
            file_name: asset.file_name(),
            mime_type: asset.mime_type(),
        };
        self.client.transcribe(payload, model, options).await
    }

    /// Converts the whole file to canonical PCM and submits it. Falls through
    /// to chunking the original when the conversion is still over the ceiling.
    async fn normalize_and_submit(
        &self,
        asset: &AudioAsset,
        model: &str,
        options: &TranscriptionOptions,
        scratch: &ScratchDir,
    ) -> Result<(String, Route, Vec<ChunkResult>), TranscribeError> {
        let normalized = scratch.file("normalized.wav");
        let job = TranscodeJob::normalize(
            asset.path(),
            normalized.path(),
            self.config.sample_rate,
            self.config.channels,
        );
        self.transcoder.transcode(&job).await?;

        let size = normalized.size_bytes().await?;
        if size > self.config.payload_ceiling {
            info!(
                "Normalized {} is {size} bytes, over the {} byte ceiling, chunking the original",
                asset.path().display(),
                self.config.payload_ceiling
            );
            drop(normalized);
            let chunks = self.run_chunked(asset, model, options, scratch).await?;
            return Ok((assemble(&chunks), Route::Chunked, chunks));
        }

        let bytes = tokio::fs::read(normalized.path()).await?;
        let payload = AudioPayload {
            bytes,
            file_name: "normalized.wav".to_string(),
            mime_type: "audio/wav",
        };
        let text = self.client.transcribe(payload, model, options).await?;

        Ok((text, Route::Normalized, Vec::new()))
    }

    async fn run_chunked(
        &self,
        asset: &AudioAsset,
        model: &str,
        options: &TranscriptionOptions,
        scratch: &ScratchDir,
    ) -> Result<Vec<ChunkResult>, TranscribeError> {
        let plan = plan_chunks(asset, self.config.payload_ceiling, &self.config.planner)?;

        let segmenter = Segmenter::new(
            self.transcoder.clone(),
            self.config.sample_rate,
            self.config.channels,
            self.config.payload_ceiling,
        );
        let specs = segmenter.segment(asset, &plan, scratch).await?;

        let executor = BatchExecutor::new(
            self.client.clone(),
            HallucinationFilter::new(self.config.hallucination.clone()),
            self.config.max_concurrent,
            self.config.aggregation,
        );
        executor.transcribe_all(&specs, model, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeTranscoder, FixedProber, Scripted, ScriptedClient, chunk_index};
    use crate::pipeline::planner::chunk_seconds;
    use crate::pipeline::{AggregationPolicy, ChunkStatus};

    const MB: u64 = 1024 * 1024;

    fn remote() -> RemoteConfig {
        RemoteConfig {
            api_key: "test-key".into(),
            base_url: "http://localhost".into(),
            model: "whisper-1".into(),
            diarize_model: "diarizer".into(),
        }
    }

    fn transcriber(
        client: Arc<ScriptedClient>,
        duration: Option<f64>,
        transcoder: Arc<FakeTranscoder>,
        config: PipelineConfig,
    ) -> Transcriber {
        Transcriber::new(
            client,
            Arc::new(FixedProber(duration)),
            transcoder,
            remote(),
            config,
        )
    }

    // Small ceiling so fixtures stay tiny: 1000 bytes, budget 800 bytes.
    fn small_ceiling() -> PipelineConfig {
        PipelineConfig {
            payload_ceiling: 1000,
            ..Default::default()
        }
    }

    fn write_source(dir: &tempfile::TempDir, name: &str, size: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![7u8; size]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_small_supported_file_goes_direct() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "memo.m4a", 500);
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "hello there")));
        let transcoder = Arc::new(FakeTranscoder::default());

        let outcome = transcriber(client.clone(), Some(30.0), transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap();

        assert_eq!(outcome.text, "hello there");
        assert_eq!(outcome.route, Route::Direct);
        assert_eq!(outcome.model, "whisper-1");
        assert!(outcome.chunks.is_empty());
        assert_eq!(transcoder.extraction_count(), 0);
        assert!(transcoder.jobs().is_empty());

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].file_name, "memo.m4a");
        assert_eq!(calls[0].mime_type, "audio/mp4");
        assert_eq!(calls[0].size, 500);
    }

    #[tokio::test]
    async fn test_small_unsupported_file_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "memo.aac", 500);
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "normalized text")));
        let transcoder = Arc::new(FakeTranscoder::producing(900));

        let outcome = transcriber(client.clone(), Some(30.0), transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap();

        assert_eq!(outcome.route, Route::Normalized);
        assert_eq!(outcome.text, "normalized text");
        assert_eq!(transcoder.extraction_count(), 0);
        assert_eq!(client.calls()[0].mime_type, "audio/wav");
        assert_eq!(client.calls()[0].size, 900);
        for output in transcoder.outputs() {
            assert!(!output.exists(), "{} left behind", output.display());
        }
    }

    #[tokio::test]
    async fn test_format_rejection_falls_back_to_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "broken.mp3", 500);
        let client = Arc::new(ScriptedClient::new(|payload| {
            if payload.file_name == "broken.mp3" {
                Scripted::fail(0, TranscribeError::RemoteFormat("Invalid file format".into()))
            } else {
                Scripted::text(0, "recovered")
            }
        }));
        let transcoder = Arc::new(FakeTranscoder::producing(800));

        let outcome = transcriber(client.clone(), Some(30.0), transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap();

        assert_eq!(outcome.route, Route::Normalized);
        assert_eq!(outcome.text, "recovered");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_other_direct_failures_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "memo.mp3", 500);
        let client = Arc::new(ScriptedClient::new(|_| {
            Scripted::fail(0, TranscribeError::RemoteAuth("bad key".into()))
        }));
        let transcoder = Arc::new(FakeTranscoder::default());

        let err = transcriber(client.clone(), Some(30.0), transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::RemoteAuth(_)));
        assert!(transcoder.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_normalization_chunks_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "memo.aac", 900);
        let client = Arc::new(ScriptedClient::new(|payload| {
            let i = chunk_index(&payload.file_name).unwrap();
            Scripted::text(0, &format!("part {i}"))
        }));
        // PCM output larger than the 1000 byte ceiling
        let transcoder = Arc::new(FakeTranscoder::producing(5000));

        let outcome = transcriber(client.clone(), Some(130.0), transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap();

        // 900 bytes over 130s with an 800 byte budget: raw 115s, normalized 57s, clamped 60s
        assert_eq!(outcome.route, Route::Chunked);
        assert_eq!(outcome.text, "part 0 part 1 part 2");
        let jobs = transcoder.jobs();
        assert!(jobs[1..].iter().all(|j| j.input == path));
        assert_eq!(transcoder.extraction_count(), 3);
    }

    #[tokio::test]
    async fn test_end_to_end_chunked_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "lecture.mp3", 4000);
        let client = Arc::new(ScriptedClient::new(|payload| {
            let i = chunk_index(&payload.file_name).unwrap();
            let delay = (12 - i as u64) * 2;
            match i {
                4 => Scripted::text(delay, &"you ".repeat(20)),
                7 => Scripted::text(delay, ""),
                _ => Scripted::text(delay, &format!("segment {i}.")),
            }
        }));
        let transcoder = Arc::new(FakeTranscoder::default());

        // 4000 bytes over 3600s leaves the budget far above 300s, so 12 chunks
        let outcome = transcriber(client.clone(), Some(3600.0), transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap();

        let expected = (0..12)
            .filter(|i| *i != 4 && *i != 7)
            .map(|i| format!("segment {i}."))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(outcome.route, Route::Chunked);
        assert_eq!(outcome.text, expected);
        assert_eq!(outcome.chunks.len(), 12);
        assert_eq!(outcome.chunks[4].status, ChunkStatus::Discarded);
        assert_eq!(outcome.chunks[7].status, ChunkStatus::Ok);
        assert!(client.max_in_flight() <= 3);

        // every chunk file is gone once the request returns
        assert_eq!(transcoder.extraction_count(), 12);
        for output in transcoder.outputs() {
            assert!(!output.exists(), "{} left behind", output.display());
        }
    }

    #[tokio::test]
    async fn test_sub_millisecond_tail_chunk_is_not_sent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "lecture.mp3", 4000);
        let client = Arc::new(ScriptedClient::new(|payload| {
            let i = chunk_index(&payload.file_name).unwrap();
            Scripted::text(0, &format!("segment {i}."))
        }));
        let transcoder = Arc::new(FakeTranscoder::default());

        let outcome = transcriber(client.clone(), Some(3600.000454), transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap();

        assert_eq!(outcome.chunks.len(), 13);
        assert!(outcome.chunks.iter().enumerate().all(|(i, c)| c.index == i));
        assert_eq!(outcome.chunks[12].status, ChunkStatus::Ok);
        assert_eq!(outcome.chunks[12].text, "");
        assert_eq!(client.call_count(), 12);
        assert_eq!(transcoder.extraction_count(), 12);
        assert!(outcome.text.ends_with("segment 11."));
    }

    #[tokio::test]
    async fn test_unknown_duration_fails_before_segmenting() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "long.mp3", 4000);
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "unused")));
        let transcoder = Arc::new(FakeTranscoder::default());

        let err = transcriber(client.clone(), None, transcoder.clone(), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::DurationUnknown { .. }));
        assert!(transcoder.jobs().is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_duration_is_fine_for_small_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "short.wav", 100);
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "short")));

        let outcome = transcriber(client, None, Arc::new(FakeTranscoder::default()), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
            .await
            .unwrap();

        assert_eq!(outcome.text, "short");
    }

    #[tokio::test]
    async fn test_segmentation_failure_aborts_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "long.mp3", 4000);
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "unused")));

        let err = transcriber(
            client.clone(),
            Some(600.0),
            Arc::new(FakeTranscoder::failing()),
            small_ceiling(),
        )
        .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
        .await
        .unwrap_err();

        assert!(matches!(err, TranscribeError::ConversionFailed { .. }));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chunk_failure_policy() {
        let dir = tempfile::tempdir().unwrap();
        // 1100 bytes over 900s plans three 300s chunks
        let path = write_source(&dir, "long.mp3", 1100);
        let script = |payload: &AudioPayload| match chunk_index(&payload.file_name).unwrap() {
            1 => Scripted::fail(0, TranscribeError::Remote("status 502".into())),
            i => Scripted::text(0, &format!("part {i}")),
        };

        let fail_fast = transcriber(
            Arc::new(ScriptedClient::new(script)),
            Some(900.0),
            Arc::new(FakeTranscoder::default()),
            small_ceiling(),
        )
        .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
        .await;
        assert!(matches!(
            fail_fast,
            Err(TranscribeError::ChunkTranscriptionFailed { index: 1, .. })
        ));

        let best_effort = transcriber(
            Arc::new(ScriptedClient::new(script)),
            Some(900.0),
            Arc::new(FakeTranscoder::default()),
            PipelineConfig {
                aggregation: AggregationPolicy::BestEffort,
                ..small_ceiling()
            },
        )
        .transcribe(TranscriptionRequest::new(&path, TranscriptionOptions::default()))
        .await
        .unwrap();
        assert_eq!(best_effort.text, "part 0 part 2");
    }

    #[tokio::test]
    async fn test_diarize_selects_diarization_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "panel.wav", 100);
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "A: hi B: hello")));
        let options = TranscriptionOptions {
            diarize: true,
            language: Some("EN".into()),
            ..Default::default()
        };

        let outcome = transcriber(client.clone(), Some(5.0), Arc::new(FakeTranscoder::default()), small_ceiling())
            .transcribe(TranscriptionRequest::new(&path, options))
            .await
            .unwrap();

        assert_eq!(outcome.model, "diarizer");
        let call = &client.calls()[0];
        assert_eq!(call.model, "diarizer");
        assert_eq!(call.options.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_any_work() {
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "unused")));
        let options = TranscriptionOptions {
            temperature: Some(3.0),
            ..Default::default()
        };

        let err = transcriber(client.clone(), Some(5.0), Arc::new(FakeTranscoder::default()), small_ceiling())
            .transcribe(TranscriptionRequest::new("/nonexistent/file.wav", options))
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::InvalidOptions(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_plan_report() {
        let dir = tempfile::tempdir().unwrap();
        let big = write_source(&dir, "big.mp3", 4000);
        let small = write_source(&dir, "small.mp3", 10);
        let client = Arc::new(ScriptedClient::new(|_| Scripted::text(0, "unused")));
        let t = transcriber(client, Some(3600.0), Arc::new(FakeTranscoder::default()), small_ceiling());

        let report = t.plan(&big).await.unwrap();
        assert_eq!(report.route, Route::Chunked);
        assert_eq!(report.plan.unwrap().len(), 12);

        let report = t.plan(&small).await.unwrap();
        assert_eq!(report.route, Route::Direct);
        assert!(report.plan.is_none());
    }

    #[test]
    fn test_hour_scenario_numbers() {
        // S=100MB, D=3600s, C=25MB with the default planner
        let secs = chunk_seconds(3600.0, 100 * MB, 25 * MB, &Default::default());
        assert_eq!(secs, 300);
        assert_eq!(ChunkPlan::new(3600.0, secs).len(), 12);
    }
}
