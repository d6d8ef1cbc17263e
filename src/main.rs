mod audio;
mod cli;
mod client;
mod config;
mod dto;
mod error;
mod media;
mod pipeline;
mod remote;
mod server;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use log::error;
use std::path::Path;

use crate::audio::ProbedDuration;
use crate::config::{AppConfig, ClientConfig};
use crate::pipeline::{PlanReport, TranscriptionRequest};
use crate::remote::TranscriptionOptions;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = AppConfig::from_env()?;
            config.require_api_key()?;
            server::run_server(host, port, config).await?;
        }
        Commands::TranscribeFile {
            audio_file,
            options,
            max_concurrent,
            output,
        } => {
            let mut config = AppConfig::from_env()?;
            config.require_api_key()?;
            if let Some(n) = max_concurrent {
                config.pipeline.max_concurrent = n;
            }
            transcribe_file(&config, &audio_file, options.into(), output.as_deref()).await?;
        }
        Commands::Plan { audio_file } => {
            let config = AppConfig::from_env()?;
            let report = config.build_transcriber().plan(&audio_file).await?;
            print_plan(&report, config.pipeline.payload_ceiling);
        }
        Commands::Upload {
            audio_file,
            server_url,
            options,
        } => {
            client::run_client(ClientConfig::new(server_url, audio_file, options.into())).await?;
        }
    }

    Ok(())
}

async fn transcribe_file(
    config: &AppConfig,
    audio_file: &Path,
    options: TranscriptionOptions,
    output: Option<&Path>,
) -> Result<()> {
    let transcriber = config.build_transcriber();
    let request = TranscriptionRequest::new(audio_file, options);

    let outcome = match transcriber.transcribe(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Transcription of {} failed: {e}", audio_file.display());
            return Err(anyhow::anyhow!(e.user_message()));
        }
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, format!("{}\n", outcome.text)).await?;
            println!(
                "✅ Wrote {} characters to {} ({} route, {:.1}s)",
                outcome.text.len(),
                path.display(),
                outcome.route,
                outcome.elapsed.as_secs_f32()
            );
        }
        None => println!("{}", outcome.text),
    }

    Ok(())
}

fn print_plan(report: &PlanReport, ceiling: u64) {
    let asset = &report.asset;
    println!("📁 {}", asset.path().display());
    println!("   Size: {} bytes (ceiling {ceiling} bytes)", asset.size_bytes());
    println!(
        "   Format: .{} ({})",
        asset.extension(),
        if asset.is_supported_format() {
            "accepted as-is"
        } else {
            "needs conversion"
        }
    );
    match asset.duration() {
        ProbedDuration::Known(secs) => println!("   Duration: {secs:.1}s"),
        ProbedDuration::Unknown(reason) => println!("   Duration: unknown ({reason})"),
    }
    println!("   Route: {}", report.route);

    if let Some(plan) = &report.plan {
        println!(
            "   Chunks: {} x {}s over {:.1}s",
            plan.len(),
            plan.chunk_secs,
            plan.duration_secs
        );
        for chunk in &plan.chunks {
            println!(
                "     #{:<3} {:>8.1}s - {:>8.1}s",
                chunk.index,
                chunk.start_secs,
                chunk.end_secs()
            );
        }
    }
}
