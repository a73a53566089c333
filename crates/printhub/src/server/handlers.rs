//! HTTP handlers for intake and dispatch.

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::db::order_repo::OrderFilter;
use crate::error::ValidationError;
use crate::intake::{self, FileMetadata, Submission, UploadedFile};
use crate::order::{Order, OrderStatus};
use crate::pricing::CURRENCY;

/// Runs store work on the blocking pool.
async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

fn malformed(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.body_text());
    }
    ApiError::from(crate::PrintHubError::from(ValidationError::MalformedUpload(
        err.body_text(),
    )))
}

/// Reads the multipart body into an owned submission.
async fn read_submission(mut multipart: Multipart) -> ApiResult<Submission> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content = field.bytes().await.map_err(malformed)?;
                submission.files.push(UploadedFile {
                    name: file_name,
                    content: content.to_vec(),
                });
            }
            "fileRanges" => submission.file_ranges = Some(field.text().await.map_err(malformed)?),
            "gateway" => submission.gateway = field.text().await.map_err(malformed)?,
            "totalCost" => submission.total_cost = Some(field.text().await.map_err(malformed)?),
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(submission)
}

pub async fn submit_order(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let submission = read_submission(multipart).await?;
    let intake = state.intake.clone();
    let order_id = blocking(move || intake.accept(submission)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order created successfully.",
            "orderId": order_id,
        })),
    ))
}

pub async fn next_job(State(state): State<AppState>) -> ApiResult<Json<Order>> {
    let dispatcher = state.dispatcher.clone();
    match blocking(move || dispatcher.poll_next_job()).await? {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::not_found("No new print jobs found.")),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let status = crate::dispatch::JobDispatcher::parse_reported_status(&body.status)?;
    let dispatcher = state.dispatcher.clone();
    let ack = blocking(move || dispatcher.report_status(&id, status)).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Job status updated to {}", ack.status),
        "ack": ack,
    })))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let dispatcher = state.dispatcher.clone();
    Ok(Json(blocking(move || dispatcher.get_order(&id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let filter = OrderFilter {
        status,
        limit: params.limit,
        offset: params.offset,
    };

    let dispatcher = state.dispatcher.clone();
    let (orders, total) = blocking(move || dispatcher.list_orders(&filter)).await?;
    Ok(Json(json!({ "orders": orders, "total": total })))
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
}

pub async fn quote(
    request: Result<Json<QuoteRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = request.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let quote = intake::quote_metadata(&request.files);
    Ok(Json(json!({
        "totalPages": quote.total_pages,
        "totalCost": quote.total_cost,
        "currency": CURRENCY,
    })))
}

pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let dispatcher = state.dispatcher.clone();
    let counts = blocking(move || dispatcher.status_counts()).await?;
    Ok(Json(json!({
        "status": "ok",
        "pending": counts.pending,
        "processing": counts.processing,
        "completed": counts.completed,
        "failed": counts.failed,
    })))
}
