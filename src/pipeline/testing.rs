//! In-process stand-ins for ffprobe, ffmpeg and the speech endpoint.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::TranscribeError;
use crate::media::{DurationProber, MediaTranscoder, TranscodeJob};
use crate::remote::{AudioPayload, TranscriptionClient, TranscriptionOptions};

pub fn chunk_index(file_name: &str) -> Option<usize> {
    file_name.strip_prefix("chunk-")?.get(..4)?.parse().ok()
}

pub struct Scripted {
    pub delay_ms: u64,
    pub result: Result<String, TranscribeError>,
}

impl Scripted {
    pub fn text(delay_ms: u64, text: &str) -> Self {
        Self {
            delay_ms,
            result: Ok(text.to_string()),
        }
    }

    pub fn fail(delay_ms: u64, error: TranscribeError) -> Self {
        Self {
            delay_ms,
            result: Err(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallEvent {
    pub index: usize,
    pub started: bool,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub file_name: String,
    pub mime_type: &'static str,
    pub size: usize,
    pub model: String,
    pub options: TranscriptionOptions,
}

type Script = Box<dyn Fn(&AudioPayload) -> Scripted + Send + Sync>;

pub struct ScriptedClient {
    script: Script,
    calls: Mutex<Vec<RecordedCall>>,
    events: Mutex<Vec<CallEvent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(script: impl Fn(&AudioPayload) -> Scripted + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionClient for ScriptedClient {
    async fn transcribe(
        &self,
        audio: AudioPayload,
        model: &str,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscribeError> {
        let index = chunk_index(&audio.file_name).unwrap_or(usize::MAX);
        self.calls.lock().unwrap().push(RecordedCall {
            file_name: audio.file_name.clone(),
            mime_type: audio.mime_type,
            size: audio.bytes.len(),
            model: model.to_string(),
            options: options.clone(),
        });
        self.events.lock().unwrap().push(CallEvent {
            index,
            started: true,
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let scripted = (self.script)(&audio);
        tokio::time::sleep(Duration::from_millis(scripted.delay_ms)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(CallEvent {
            index,
            started: false,
        });
        scripted.result
    }
}

pub struct FixedProber(pub Option<f64>);

#[async_trait]
impl DurationProber for FixedProber {
    async fn probe(&self, path: &Path) -> Result<f64, TranscribeError> {
        self.0.ok_or_else(|| TranscribeError::DurationUnknown {
            path: path.to_path_buf(),
            reason: "ffprobe exited with 1".into(),
        })
    }
}

// Writes placeholder output files. Whole-file conversions produce
// `normalized_size` bytes, extractions a few bytes each.
#[derive(Default)]
pub struct FakeTranscoder {
    pub normalized_size: usize,
    pub fail: bool,
    jobs: Mutex<Vec<TranscodeJob>>,
}

impl FakeTranscoder {
    pub fn producing(normalized_size: usize) -> Self {
        Self {
            normalized_size,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn extraction_count(&self) -> usize {
        self.jobs().iter().filter(|j| j.window.is_some()).count()
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.jobs().into_iter().map(|j| j.output).collect()
    }
}

#[async_trait]
impl MediaTranscoder for FakeTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<PathBuf, TranscribeError> {
        self.jobs.lock().unwrap().push(job.clone());
        if self.fail {
            return Err(TranscribeError::ConversionFailed {
                path: job.input.clone(),
                reason: "ffmpeg exited with 1".into(),
            });
        }

        let contents = match job.window {
            Some(window) => format!("{:.0}", window.start_secs).into_bytes(),
            None => vec![0u8; self.normalized_size],
        };
        tokio::fs::write(&job.output, contents).await?;
        Ok(job.output.clone())
    }
}
