use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::remote::{ResponseFormat, TranscriptionOptions};

#[derive(Parser)]
#[command(
    name = "relay-transcribe",
    about = "Relay Transcribe - Long-form audio transcription through a remote speech API",
    long_about = "Transcribes audio files of any length through an OpenAI-compatible transcription endpoint. Files over the endpoint's upload ceiling are split into time-based chunks, transcribed a few at a time and stitched back together.",
    after_help = "EXAMPLES:\n    # Start the transcription server\n    relay-transcribe serve\n\n    # Transcribe a local file\n    relay-transcribe file interview.m4a --language en\n\n    # Show how a file would be routed and chunked\n    relay-transcribe plan lecture.mp3\n\n    # Upload to a running server\n    relay-transcribe upload meeting.wav --server-url http://my-server:8080\n\nThe remote endpoint is configured through TRANSCRIBE_API_KEY and the other\nTRANSCRIBE_* variables, read from the environment or a .env file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(name = "serve")]
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Transcribe a local file in-process
    #[command(name = "file")]
    TranscribeFile {
        audio_file: PathBuf,

        #[command(flatten)]
        options: OptionArgs,

        /// Overrides TRANSCRIBE_MAX_CONCURRENT
        #[arg(long, value_parser = validate_max_concurrent)]
        max_concurrent: Option<usize>,

        /// Write the transcript here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Probe a file and print its route and chunk plan without transcribing
    #[command(name = "plan")]
    Plan { audio_file: PathBuf },
    /// Send a file to a running server
    #[command(name = "upload")]
    Upload {
        audio_file: String,

        #[arg(long, default_value = "http://localhost:8080")]
        server_url: String,

        #[command(flatten)]
        options: OptionArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct OptionArgs {
    /// ISO-639 language code, omit for auto-detection
    #[arg(long, short = 'l')]
    pub language: Option<String>,

    /// Use the speaker-labelling model
    #[arg(long)]
    pub diarize: bool,

    /// Vocabulary or style hint forwarded to the model
    #[arg(long)]
    pub prompt: Option<String>,

    #[arg(long, value_parser = validate_temperature)]
    pub temperature: Option<f32>,

    #[arg(long, default_value = "json", value_parser = validate_response_format)]
    pub response_format: ResponseFormat,
}

impl From<OptionArgs> for TranscriptionOptions {
    fn from(args: OptionArgs) -> Self {
        Self {
            language: args.language,
            diarize: args.diarize,
            response_format: args.response_format,
            temperature: args.temperature,
            prompt: args.prompt,
        }
    }
}

pub fn validate_temperature(s: &str) -> Result<f32, String> {
    match s.parse::<f32>() {
        Ok(t) if (0.0..=1.0).contains(&t) => Ok(t),
        Ok(_) => Err("Temperature must be between 0 and 1".to_string()),
        Err(_) => Err("Invalid temperature value".to_string()),
    }
}

pub fn validate_response_format(s: &str) -> Result<ResponseFormat, String> {
    s.parse()
}

pub fn validate_max_concurrent(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("At least one concurrent request is required".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err("Invalid concurrency value".to_string()),
    }
}
