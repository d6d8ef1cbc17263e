use anyhow::{Result, anyhow};
use std::path::Path;

use crate::config::ClientConfig;
use crate::dto::{ErrorDto, TranscriptionDto};
use crate::remote::TranscriptionOptions;

fn build_form(
    audio_data: Vec<u8>,
    file_name: String,
    options: &TranscriptionOptions,
) -> reqwest::multipart::Form {
    let mut form = reqwest::multipart::Form::new()
        .part(
            "audio",
            reqwest::multipart::Part::bytes(audio_data).file_name(file_name),
        )
        .text("diarize", options.diarize.to_string())
        .text("response_format", options.response_format.to_string());

    if let Some(language) = &options.language {
        form = form.text("language", language.clone());
    }
    if let Some(prompt) = &options.prompt {
        form = form.text("prompt", prompt.clone());
    }
    if let Some(temperature) = options.temperature {
        form = form.text("temperature", temperature.to_string());
    }
    form
}

pub async fn send_transcription_request(config: &ClientConfig) -> Result<TranscriptionDto> {
    let client = reqwest::Client::new();

    let path = Path::new(&config.audio_file);
    if !path.exists() {
        return Err(anyhow!("Audio file not found: {}", config.audio_file));
    }
    let audio_data = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow!("Failed to read audio file: {}", e))?;

    println!(
        "📁 Audio source: {} ({} bytes)",
        config.audio_file,
        audio_data.len()
    );

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let form = build_form(audio_data, file_name, &config.options);

    println!(
        "🚀 Sending transcription request to: {}/api/v1/transcribe",
        config.server_url
    );
    println!(
        "   Language: {}, Diarize: {}, Format: {}",
        config.options.language.as_deref().unwrap_or("auto"),
        config.options.diarize,
        config.options.response_format
    );

    let response = client
        .post(format!("{}/api/v1/transcribe", config.server_url))
        .multipart(form)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to send request: {}", e))?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response: {}", e))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorDto>(&response_text)
            .map(|body| body.error)
            .unwrap_or(response_text);
        return Err(anyhow!("Server returned error {}: {}", status, message));
    }

    serde_json::from_str(&response_text)
        .map_err(|e| anyhow!("Failed to parse JSON response: {}", e))
}

pub async fn check_server_health(server_url: &str) -> Result<()> {
    let client = reqwest::Client::new();

    println!("🔍 Checking server health at: {server_url}/api/v1/health");

    let response = client
        .get(format!("{server_url}/api/v1/health"))
        .send()
        .await
        .map_err(|e| anyhow!("Failed to connect to server: {}", e))?;

    if response.status().is_success() {
        println!("✅ Server is healthy");
        Ok(())
    } else {
        Err(anyhow!("Server health check failed: {}", response.status()))
    }
}

pub async fn run_client(config: ClientConfig) -> Result<()> {
    println!("🎵 Relay Transcribe Client");
    println!("==========================");
    println!("📁 File: {}", config.audio_file);
    println!();

    if let Err(e) = check_server_health(&config.server_url).await {
        eprintln!("❌ {e}");
        eprintln!("💡 Make sure the server is running: relay-transcribe serve");
        return Err(e);
    }

    match send_transcription_request(&config).await {
        Ok(result) => {
            println!(
                "\n✅ Transcription completed via {} route in {} ms",
                result.route, result.elapsed_ms
            );
            if let Some(chunks) = &result.chunks {
                let failed = chunks.iter().filter(|c| c.status == "failed").count();
                let discarded = chunks.iter().filter(|c| c.status == "discarded").count();
                println!(
                    "   {} chunks, {} discarded, {} failed",
                    chunks.len(),
                    discarded,
                    failed
                );
            }
            println!("📝 Result:");
            println!("{}", result.text);
        }
        Err(e) => {
            eprintln!("❌ Transcription failed: {e}");
            return Err(e);
        }
    }

    Ok(())
}
