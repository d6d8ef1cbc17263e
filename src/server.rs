use actix_cors::Cors;
use actix_multipart::{Field, Multipart};
use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware::Logger, post, web};
use futures_util::{Stream, TryStreamExt};
use log::{debug, error, info, warn};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::config::AppConfig;
use crate::dto::{ErrorDto, TranscriptionDto};
use crate::error::TranscribeError;
use crate::pipeline::{Transcriber, TranscriptionRequest};
use crate::remote::{ResponseFormat, TranscriptionOptions};

pub struct AppState {
    pub transcriber: Transcriber,
    pub upload_limit_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
enum FieldError {
    #[error("field exceeds {0} bytes")]
    TooLarge(usize),
    #[error(transparent)]
    Read(#[from] actix_web::Error),
    #[error(transparent)]
    Store(#[from] std::io::Error),
}

#[get("/api/v1/health")]
pub async fn health_check() -> impl Responder {
    debug!("Health check endpoint called");
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "Transcription relay is running"
    }))
}

#[post("/api/v1/transcribe")]
pub async fn transcribe_upload(
    data: web::Data<AppState>,
    mut payload: Multipart,
) -> impl Responder {
    debug!("Transcription request received");

    let mut upload: Option<NamedTempFile> = None;
    let mut options = TranscriptionOptions::default();

    loop {
        let field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart request: {e}");
                return error_response(StatusCode::BAD_REQUEST, "Malformed multipart request");
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let extension = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .and_then(upload_extension);
                match stream_upload(field, data.upload_limit_bytes, extension.as_deref()).await {
                    Ok(file) => upload = Some(file),
                    Err(FieldError::TooLarge(limit)) => {
                        warn!("Upload rejected, larger than {limit} bytes");
                        return error_response(
                            StatusCode::PAYLOAD_TOO_LARGE,
                            &format!("Audio file exceeds the {limit} byte upload limit"),
                        );
                    }
                    Err(FieldError::Read(e)) => {
                        error!("Failed to read audio data: {e}");
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            "Failed to read audio data",
                        );
                    }
                    Err(FieldError::Store(e)) => {
                        error!("Failed to store upload: {e}");
                        return error_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Failed to store audio data",
                        );
                    }
                }
            }
            "language" | "diarize" | "prompt" | "temperature" | "response_format" => {
                let value = match read_text_field(field).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Unreadable {name} field: {e}");
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            &format!("Field {name} must be UTF-8 text"),
                        );
                    }
                };
                if let Err(message) = apply_option(&mut options, &name, value) {
                    return error_response(StatusCode::BAD_REQUEST, &message);
                }
            }
            other => debug!("Ignoring multipart field {other:?}"),
        }
    }

    let Some(upload) = upload else {
        warn!("No audio file provided in transcription request");
        return error_response(StatusCode::BAD_REQUEST, "No audio file provided");
    };

    info!(
        "Processing upload {} (language={:?}, diarize={}, format={})",
        upload.path().display(),
        options.language,
        options.diarize,
        options.response_format
    );

    let request = TranscriptionRequest::new(upload.path(), options);
    match data.transcriber.transcribe(request).await {
        Ok(outcome) => {
            info!(
                "Transcription completed via {} route: {} characters",
                outcome.route,
                outcome.text.len()
            );
            HttpResponse::Ok().json(TranscriptionDto::from(outcome))
        }
        Err(e) => {
            error!("Transcription failed: {e}");
            error_response(status_for(&e), &e.user_message())
        }
    }
}

fn apply_option(
    options: &mut TranscriptionOptions,
    name: &str,
    value: String,
) -> Result<(), String> {
    let value = value.trim();
    match name {
        "language" => options.language = Some(value.to_string()),
        "prompt" => options.prompt = Some(value.to_string()),
        "diarize" => {
            options.diarize = match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" | "" => false,
                other => return Err(format!("diarize must be true or false, got {other:?}")),
            }
        }
        "temperature" if value.is_empty() => options.temperature = None,
        "temperature" => {
            let temperature = value
                .parse::<f32>()
                .map_err(|_| format!("temperature must be a number, got {value:?}"))?;
            options.temperature = Some(temperature);
        }
        "response_format" => options.response_format = value.parse::<ResponseFormat>()?,
        _ => {}
    }
    Ok(())
}

fn upload_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_lowercase())
}

/// Writes the audio field to a temporary file as it arrives. The limit
/// applies to the running total, so an oversized upload stops at the first
/// chunk past it.
async fn stream_upload<S, E>(
    mut stream: S,
    limit: usize,
    extension: Option<&str>,
) -> Result<NamedTempFile, FieldError>
where
    S: Stream<Item = Result<web::Bytes, E>> + Unpin,
    E: Into<actix_web::Error>,
{
    let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
    let upload = tempfile::Builder::new()
        .prefix("relay-upload-")
        .suffix(&suffix)
        .tempfile()?;
    let mut file = tokio::fs::File::create(upload.path()).await?;

    let mut written = 0usize;
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| FieldError::Read(e.into()))?
    {
        written += chunk.len();
        if written > limit {
            return Err(FieldError::TooLarge(limit));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!("Audio data received: {written} bytes");
    Ok(upload)
}

async fn read_field_data(mut field: Field, limit: usize) -> Result<Vec<u8>, FieldError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(actix_web::Error::from)? {
        if data.len() + chunk.len() > limit {
            return Err(FieldError::TooLarge(limit));
        }
        data.extend_from_slice(&chunk);
    }
    debug!("Read field data: {} bytes", data.len());
    Ok(data)
}

async fn read_text_field(field: Field) -> Result<String, FieldError> {
    // option fields are short; anything bigger is not a form value
    let bytes = read_field_data(field, 64 * 1024).await?;
    String::from_utf8(bytes).map_err(|e| {
        FieldError::Read(actix_web::error::ErrorBadRequest(e.to_string()))
    })
}

fn status_for(err: &TranscribeError) -> StatusCode {
    match err {
        TranscribeError::InvalidOptions(_) => StatusCode::BAD_REQUEST,
        TranscribeError::RemoteFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        TranscribeError::DurationUnknown { .. } | TranscribeError::ConversionFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TranscribeError::RemoteRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        TranscribeError::RemoteAuth(_) | TranscribeError::Remote(_) => StatusCode::BAD_GATEWAY,
        TranscribeError::ChunkTranscriptionFailed { source, .. } => status_for(source),
        TranscribeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(ErrorDto::new(message))
}

pub async fn run_server(host: String, port: u16, config: AppConfig) -> std::io::Result<()> {
    info!("Starting transcription relay");
    info!(
        "Using configuration: base_url={}, model={}, ceiling={} bytes, max_concurrent={}, aggregation={}",
        config.remote.base_url,
        config.remote.model,
        config.pipeline.payload_ceiling,
        config.pipeline.max_concurrent,
        config.pipeline.aggregation
    );

    let app_state = web::Data::new(AppState {
        transcriber: config.build_transcriber(),
        upload_limit_bytes: config.upload_limit_bytes,
    });

    info!("Starting HTTP server on {host}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health_check)
            .service(transcribe_upload)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
