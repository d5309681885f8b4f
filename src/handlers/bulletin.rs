// src/handlers/bulletin.rs

use crate::{
    errors::{AppError, AppResult},
    models::{
        ArchiveRequest, Bulletin, DeliveryOptions, DeliveryReceipt, DeliveryRecord,
        GenerateBatchRequest,
        GenerateBatchResponse, GenerateBulletinRequest,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use tracing::error;
use uuid::Uuid;

/// Header listing the bulletins left out of an archive.
pub const FAILED_BULLETINS_HEADER: &str = "x-failed-bulletins";

fn join_ids<'a>(ids: impl Iterator<Item = &'a Uuid>) -> String {
    ids.map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> AppResult<Response> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok((headers, body).into_response())
}

/// Compute and persist the bulletin of one employee for one period
#[utoipa::path(
    post,
    path = "/api/v1/bulletins",
    request_body = GenerateBulletinRequest,
    responses(
        (status = 201, description = "Bulletin generated", body = Bulletin),
        (status = 400, description = "Invalid amounts or period"),
        (status = 409, description = "A current bulletin already exists for this period"),
        (status = 422, description = "Employee profile is incomplete"),
    ),
    tag = "Bulletins"
)]
pub async fn generate_bulletin(
    State(state): State<AppState>,
    Json(body): Json<GenerateBulletinRequest>,
) -> AppResult<(StatusCode, Json<Bulletin>)> {
    let bulletin = state.pipeline.generate(body).await?;
    Ok((StatusCode::CREATED, Json(bulletin)))
}

/// Get a persisted bulletin, superseded versions included
#[utoipa::path(
    get,
    path = "/api/v1/bulletins/{bulletin_id}",
    params(("bulletin_id" = Uuid, Path, description = "Bulletin ID")),
    responses(
        (status = 200, description = "Bulletin", body = Bulletin),
        (status = 404, description = "Bulletin not found"),
    ),
    tag = "Bulletins"
)]
pub async fn get_bulletin(
    State(state): State<AppState>,
    Path(bulletin_id): Path<Uuid>,
) -> AppResult<Json<Bulletin>> {
    Ok(Json(state.pipeline.get(bulletin_id).await?))
}

/// Download a bulletin as PDF
#[utoipa::path(
    get,
    path = "/api/v1/bulletins/{bulletin_id}/pdf",
    params(("bulletin_id" = Uuid, Path, description = "Bulletin ID")),
    responses(
        (status = 200, description = "PDF document", body = Vec<u8>, content_type = "application/pdf"),
        (status = 404, description = "Bulletin not found"),
        (status = 422, description = "Bulletin cannot be rendered"),
    ),
    tag = "Bulletins"
)]
pub async fn download_bulletin_pdf(
    State(state): State<AppState>,
    Path(bulletin_id): Path<Uuid>,
) -> AppResult<Response> {
    let (bulletin, document) = state.pipeline.render_pdf(bulletin_id).await?;
    attachment("application/pdf", &bulletin.document_name(), document)
}

/// Email a bulletin to its employee, optionally copying HR
#[utoipa::path(
    post,
    path = "/api/v1/bulletins/{bulletin_id}/deliver",
    params(("bulletin_id" = Uuid, Path, description = "Bulletin ID")),
    request_body = DeliveryOptions,
    responses(
        (status = 200, description = "Bulletin delivered", body = DeliveryReceipt),
        (status = 404, description = "Bulletin not found"),
        (status = 502, description = "Mail delivery failed"),
    ),
    tag = "Delivery"
)]
pub async fn deliver_bulletin(
    State(state): State<AppState>,
    Path(bulletin_id): Path<Uuid>,
    Json(body): Json<DeliveryOptions>,
) -> AppResult<Json<DeliveryReceipt>> {
    Ok(Json(state.pipeline.deliver(bulletin_id, &body).await?))
}

/// List delivery attempts recorded for a bulletin
#[utoipa::path(
    get,
    path = "/api/v1/bulletins/{bulletin_id}/deliveries",
    params(("bulletin_id" = Uuid, Path, description = "Bulletin ID")),
    responses(
        (status = 200, description = "Delivery history", body = Vec<DeliveryRecord>),
        (status = 404, description = "Bulletin not found"),
    ),
    tag = "Delivery"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    Path(bulletin_id): Path<Uuid>,
) -> AppResult<Json<Vec<DeliveryRecord>>> {
    Ok(Json(state.pipeline.deliveries(bulletin_id).await?))
}

/// Generate the bulletins of a whole period and return them as one archive.
/// Items fail independently; the report says which.
#[utoipa::path(
    post,
    path = "/api/v1/bulletins/batch",
    request_body = GenerateBatchRequest,
    responses(
        (status = 200, description = "Per-item report and base64 ZIP archive", body = GenerateBatchResponse),
        (status = 400, description = "No rules for this period"),
    ),
    tag = "Bulletins"
)]
pub async fn generate_batch(
    State(state): State<AppState>,
    Json(body): Json<GenerateBatchRequest>,
) -> AppResult<Json<GenerateBatchResponse>> {
    // Dropping the request (client gone) cancels the run; work already
    // started still completes inside the task.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.generate_batch(body, &cancel).await })
        .await
        .map_err(|e| {
            error!("Batch task failed: {}", e);
            AppError::Internal("batch task failed".to_string())
        })??;

    Ok(Json(GenerateBatchResponse {
        archive_name: outcome.archive_name(),
        archive_base64: general_purpose::STANDARD.encode(&outcome.archive),
        period: outcome.period,
        items: outcome.reports,
    }))
}

/// Bundle persisted bulletins into one ZIP archive
#[utoipa::path(
    post,
    path = "/api/v1/bulletins/archive",
    request_body = ArchiveRequest,
    responses(
        (status = 200, description = "ZIP archive; X-Failed-Bulletins lists bulletins left out", body = Vec<u8>, content_type = "application/zip"),
        (status = 400, description = "No bulletin requested"),
        (status = 404, description = "Unknown bulletin"),
    ),
    tag = "Bulletins"
)]
pub async fn archive_bulletins(
    State(state): State<AppState>,
    Json(body): Json<ArchiveRequest>,
) -> AppResult<Response> {
    if body.bulletin_ids.is_empty() {
        return Err(AppError::BadRequest("bulletin_ids must not be empty".to_string()));
    }

    let cancel = state.shutdown.child_token();
    let (archive, report) = state.pipeline.archive(&body.bulletin_ids, &cancel).await?;

    let mut response = attachment("application/zip", "bulletins.zip", archive)?;
    let left_out = join_ids(
        report
            .failed
            .iter()
            .map(|(id, _)| id)
            .chain(report.cancelled.iter()),
    );
    if !left_out.is_empty() {
        let value =
            HeaderValue::from_str(&left_out).map_err(|e| AppError::Internal(e.to_string()))?;
        response.headers_mut().insert(FAILED_BULLETINS_HEADER, value);
    }
    Ok(response)
}
