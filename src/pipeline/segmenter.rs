use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::planner::ChunkPlan;
use super::scratch::{ScratchDir, ScratchFile};
use crate::audio::{AudioAsset, mime_type_for};
use crate::error::TranscribeError;
use crate::media::{MediaTranscoder, TargetCodec, TimeWindow, TranscodeJob};

/// A planned window materialized as its own file. Windows too short for
/// ffmpeg to cut carry no file.
#[derive(Debug)]
pub struct ChunkSpec {
    pub index: usize,
    pub start_secs: f64,
    pub span_secs: f64,
    file: Option<ScratchFile>,
}

impl ChunkSpec {
    pub fn new(index: usize, start_secs: f64, span_secs: f64, file: ScratchFile) -> Self {
        Self {
            index,
            start_secs,
            span_secs,
            file: Some(file),
        }
    }

    pub fn without_audio(index: usize, start_secs: f64, span_secs: f64) -> Self {
        Self {
            index,
            start_secs,
            span_secs,
            file: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(ScratchFile::path)
    }

    pub fn extension(&self) -> &str {
        self.path()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .unwrap_or_default()
    }

    pub fn mime_type(&self) -> &'static str {
        mime_type_for(self.extension())
    }

    pub fn file_name(&self) -> String {
        self.path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct Segmenter {
    transcoder: Arc<dyn MediaTranscoder>,
    sample_rate: u32,
    channels: u16,
    payload_ceiling: u64,
}

impl Segmenter {
    pub fn new(
        transcoder: Arc<dyn MediaTranscoder>,
        sample_rate: u32,
        channels: u16,
        payload_ceiling: u64,
    ) -> Self {
        Self {
            transcoder,
            sample_rate,
            channels,
            payload_ceiling,
        }
    }

    /// Materializes every chunk of the plan. The first failure aborts, and the
    /// files written so far are removed as the partial list is dropped.
    pub async fn segment(
        &self,
        asset: &AudioAsset,
        plan: &ChunkPlan,
        scratch: &ScratchDir,
    ) -> Result<Vec<ChunkSpec>, TranscribeError> {
        let started = Instant::now();
        let mut specs = Vec::with_capacity(plan.len());

        for planned in &plan.chunks {
            let window = TimeWindow {
                start_secs: planned.start_secs,
                span_secs: planned.span_secs,
            };
            if window.is_empty() {
                debug!(
                    "Chunk {} spans {:.6}s at {:.3}s, nothing to extract",
                    planned.index, planned.span_secs, planned.start_secs
                );
                specs.push(ChunkSpec::without_audio(
                    planned.index,
                    planned.start_secs,
                    planned.span_secs,
                ));
                continue;
            }

            let file = self.extract(asset, planned.index, window, scratch).await?;
            specs.push(ChunkSpec::new(
                planned.index,
                planned.start_secs,
                planned.span_secs,
                file,
            ));
        }

        info!(
            "Segmented {} into {} chunks in {:.1}s",
            asset.path().display(),
            specs.len(),
            started.elapsed().as_secs_f32()
        );

        Ok(specs)
    }

    async fn extract(
        &self,
        asset: &AudioAsset,
        index: usize,
        window: TimeWindow,
        scratch: &ScratchDir,
    ) -> Result<ScratchFile, TranscribeError> {
        if asset.is_supported_format() {
            let file = scratch.file(&format!("chunk-{index:04}.{}", asset.extension()));
            let job =
                TranscodeJob::extract(asset.path(), file.path(), window, TargetCodec::StreamCopy);

            match self.transcoder.transcode(&job).await {
                Ok(_) => {
                    let size = file.size_bytes().await?;
                    if size <= self.payload_ceiling {
                        return Ok(file);
                    }
                    warn!(
                        "Copied chunk {index} is {size} bytes, over the {} byte ceiling, re-encoding",
                        self.payload_ceiling
                    );
                }
                Err(e) => warn!("Stream copy of chunk {index} failed, re-encoding: {e}"),
            }
            // the copy may share the PCM file name, so it goes first
            drop(file);
        }

        let file = scratch.file(&format!("chunk-{index:04}.wav"));
        let codec = TargetCodec::Pcm {
            sample_rate: self.sample_rate,
            channels: self.channels,
        };
        let job = TranscodeJob::extract(asset.path(), file.path(), window, codec);
        self.transcoder.transcode(&job).await?;

        Ok(file)
    }
}
