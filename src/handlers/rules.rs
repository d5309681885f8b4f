// src/handlers/rules.rs

use crate::{
    errors::AppResult,
    models::{ContributionPreviewRequest, ContributionResult, RuleTable, RulesQuery},
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;

/// Get the contribution and tax rules in effect on a date (default: today)
#[utoipa::path(
    get,
    path = "/api/v1/rules",
    params(RulesQuery),
    responses(
        (status = 200, description = "Rule table in effect", body = RuleTable),
        (status = 400, description = "No rules in effect on that date"),
    ),
    tag = "Rules"
)]
pub async fn get_rules(
    State(state): State<AppState>,
    Query(query): Query<RulesQuery>,
) -> AppResult<Json<RuleTable>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let table = state.pipeline.rules().in_effect_on(date)?;
    Ok(Json(table.clone()))
}

/// Compute CNSS, AMO, CIMR and IR for a salary without creating a bulletin
#[utoipa::path(
    post,
    path = "/api/v1/contributions/preview",
    request_body = ContributionPreviewRequest,
    responses(
        (status = 200, description = "Statutory contributions", body = ContributionResult),
        (status = 400, description = "Invalid amounts or period"),
    ),
    tag = "Rules"
)]
pub async fn preview_contributions(
    State(state): State<AppState>,
    Json(body): Json<ContributionPreviewRequest>,
) -> AppResult<Json<ContributionResult>> {
    Ok(Json(state.pipeline.preview(&body)?))
}
