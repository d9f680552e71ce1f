// src/server/handlers.rs

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use super::error::{ApiError, ApiResult};
use super::state::{AppState, RunStatus, UPLOADED_MESSAGE};
use crate::upload::{format_from_filename, OutputVideo, UploadedVideo};

pub const DOWNLOAD_FILENAME: &str = "player_detection_output.mp4";
pub const DOWNLOAD_MIME: &str = "video/mp4";

const INDEX_HTML: &str = include_str!("index.html");

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// POST /api/videos
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    pub run_id: u64,
    pub status: &'static str,
    pub message: &'static str,
}

/// Accepts a multipart form with a `file` field (mp4, avi or mov).
///
/// The format and the processing slot are checked before the body is read.
/// The run itself happens on a blocking worker; poll `GET /api/status`.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadAccepted>)> {
    let mut file_data: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        format_from_filename(&filename)?;
        // Refuse before buffering or storing anything
        state.ensure_idle()?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        file_data = Some((filename, data));
    }

    let (filename, data) = file_data.ok_or(crate::error::UploadError::MissingFile)?;

    let temp_dir = state.temp_dir().to_path_buf();
    let (upload, output) = tokio::task::spawn_blocking(move || {
        let upload = UploadedVideo::persist(&filename, &data, &temp_dir)?;
        let output = OutputVideo::create(&temp_dir)?;
        Ok::<_, ApiError>((upload, output))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let run_id = state.begin_run()?;
    info!(
        "📼 {} (run {}, {} bytes of {})",
        UPLOADED_MESSAGE,
        run_id,
        upload.size_bytes(),
        upload.format().extension()
    );

    let service = state.service();
    let worker_state = state.clone();
    tokio::spawn(async move {
        let progress = worker_state.progress_sink(run_id);
        let outcome = tokio::task::spawn_blocking(move || {
            let result = service.annotate_video(upload.path(), output.path(), &progress);
            // Input temp file goes away here; output only survives a success
            drop(upload);
            result.map(|summary| (output, summary))
        })
        .await;

        match outcome {
            Ok(Ok((output, summary))) => worker_state.complete_run(run_id, output, summary),
            Ok(Err(e)) => worker_state.fail_run(run_id, e.to_string()),
            Err(e) => {
                error!("Processing task for run {} aborted: {}", run_id, e);
                worker_state.fail_run(run_id, "Processing stopped unexpectedly".to_string());
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadAccepted {
            run_id,
            status: "processing",
            message: UPLOADED_MESSAGE,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

pub async fn run_status(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.status())
}

// ---------------------------------------------------------------------------
// GET /api/download
// ---------------------------------------------------------------------------

/// Serves the finished video as an attachment. 404 unless the last run
/// completed successfully.
pub async fn download_output(State(state): State<AppState>) -> ApiResult<Response> {
    let path = state
        .output_path()
        .ok_or_else(|| ApiError::NotFound("No annotated video is available".to_string()))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let file_size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .len();

    let stream = ReaderStream::new(file);

    Ok((
        [
            (header::CONTENT_TYPE, DOWNLOAD_MIME.to_string()),
            (header::CONTENT_LENGTH, file_size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
