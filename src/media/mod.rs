mod probe;
mod transcode;

pub use probe::{DurationProber, FfprobeProber};
pub use transcode::{FfmpegTranscoder, MediaTranscoder, TargetCodec, TimeWindow, TranscodeJob};
