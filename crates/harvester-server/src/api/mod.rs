//! HTTP API surface
//!
//! Thin axum handlers over the orchestrator and the metadata/blob stores:
//!
//! - `POST /api/scrape` - submit a batch of seed URLs and keywords
//! - `POST /api/download` - synchronous single-video download
//! - `GET /api/videos`, `GET /api/pdfs` - persisted record listings
//! - `GET /api/videos/:id/download`, `GET /api/pdfs/:id/download` - stream
//!   a stored blob back to the client

pub mod types;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::db::MetadataStore;
use crate::error::AppError;
use crate::scrape::{ScrapeOrchestrator, DOCUMENT_MIME};
use crate::storage::BlobStore;

use self::types::{DownloadRequest, ScrapeRequest};

/// Shared state for API routes
#[derive(Clone)]
pub struct ApiState {
    pub records: Arc<dyn MetadataStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub orchestrator: ScrapeOrchestrator,
}

/// Create the API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/scrape", post(submit_scrape))
        .route("/download", post(download_video))
        .route("/videos", get(list_videos))
        .route("/pdfs", get(list_documents))
        .route("/videos/:id/download", get(download_video_file))
        .route("/pdfs/:id/download", get(download_document_file))
        .with_state(state)
}

/// Submit a scrape batch; work continues in the background
async fn submit_scrape(
    State(state): State<ApiState>,
    Json(request): Json<ScrapeRequest>,
) -> impl IntoResponse {
    let status = state.orchestrator.submit(request.into_batch());
    Json(status)
}

/// Download a single video synchronously (bounded by the per-video budget)
async fn download_video(
    State(state): State<ApiState>,
    Json(request): Json<DownloadRequest>,
) -> impl IntoResponse {
    let outcome = state.orchestrator.download_video(request.url).await;
    Json(outcome)
}

/// List all media records
async fn list_videos(State(state): State<ApiState>) -> Result<Response, AppError> {
    let records = state
        .records
        .list_media()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(records).into_response())
}

/// List all document records
async fn list_documents(State(state): State<ApiState>) -> Result<Response, AppError> {
    let records = state
        .records
        .list_documents()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(records).into_response())
}

/// Stream a stored video file
async fn download_video_file(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = state
        .records
        .find_media(id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Video {id} not found")))?;

    stream_blob(&state, record.blob_object_name.as_deref(), &record.filename, "video/mp4").await
}

/// Stream a stored document file
async fn download_document_file(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = state
        .records
        .find_document(id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;

    stream_blob(&state, record.blob_object_name.as_deref(), &record.filename, DOCUMENT_MIME).await
}

/// Stream a blob back to the client. A record without a blob object name is
/// a failed or partial ingest and is never served.
async fn stream_blob(
    state: &ApiState,
    object_name: Option<&str>,
    filename: &str,
    content_type: &str,
) -> Result<Response, AppError> {
    let object_name = object_name
        .ok_or_else(|| AppError::NotFound(format!("{filename} has no stored file")))?;

    let reader = state
        .blobs
        .get(object_name)
        .await
        .map_err(|e| AppError::NotFound(format!("stored file unavailable: {e}")))?;

    let body = Body::from_stream(ReaderStream::new(reader));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
