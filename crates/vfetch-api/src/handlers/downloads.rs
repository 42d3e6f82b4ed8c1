//! Download job handlers: submit, poll, fetch.

use axum::body::Body;
use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::{Form, Json};
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::info;

use vfetch_models::Job;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Form body of `POST /download`.
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub download_id: String,
}

/// Status document: the job record plus a `download_id` alias of its id.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub download_id: String,
    #[serde(flatten)]
    pub job: Job,
}

impl From<Job> for StatusResponse {
    fn from(job: Job) -> Self {
        Self {
            download_id: job.id.to_string(),
            job,
        }
    }
}

/// Accept a URL and start downloading it in the background.
pub async fn submit_download(
    State(state): State<AppState>,
    form: Result<Form<SubmitForm>, FormRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let Form(form) = form.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let url = form.url.unwrap_or_default();

    let job = state.tracker.create(&url).await?;
    state.worker.spawn(job.id.clone());

    metrics::record_job_submitted();
    info!(job_id = %job.id, "Download submitted");

    Ok(Json(SubmitResponse {
        download_id: job.id.to_string(),
    }))
}

/// Poll a job.
pub async fn get_status(
    State(state): State<AppState>,
    Path(download_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job = state.tracker.get_status(&download_id).await?;
    Ok(Json(job.into()))
}

/// Stream one of a job's files as an attachment.
pub async fn fetch_file(
    State(state): State<AppState>,
    Path((download_id, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    let path = state.tracker.resolve_artifact(&download_id, &filename).await?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Download not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to open file: {}", e))),
    };
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to stat file: {}", e)))?
        .len();

    let content_type = MimeGuess::from_path(&path).first_or_octet_stream();
    let body = Body::from_stream(ReaderStream::new(file));

    metrics::record_file_served();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(body)
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
