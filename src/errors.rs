// src/errors.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::PayrollPeriod;

/// Failures of the payroll pipeline itself. Every variant that concerns a
/// single bulletin names the employee and/or period so batch reports can
/// point at the offending item.
#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Incomplete profile for employee {employee_id}: missing {}", .missing.join(", "))]
    IncompleteProfile {
        employee_id: Uuid,
        missing: Vec<&'static str>,
    },

    #[error("A current bulletin already exists for employee {employee_id} in {period}")]
    DuplicateBulletin { employee_id: Uuid, period: PayrollPeriod },

    #[error("Concurrent write rejected for employee {employee_id} in {period}")]
    PersistenceConflict { employee_id: Uuid, period: PayrollPeriod },

    #[error("Cannot render bulletin {bulletin_id}: {reason}")]
    RenderError { bulletin_id: Uuid, reason: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Delivery failed ({}) after {attempts} attempt(s): {reason}", failure_kind(.permanent))]
    DeliveryFailure {
        permanent: bool,
        attempts: u32,
        reason: String,
    },

    #[error("No contribution rules in effect on {0}")]
    NoRulesInEffect(NaiveDate),

    #[error("Invalid rule book: {0}")]
    InvalidRules(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type PayrollResult<T> = Result<T, PayrollError>;

fn failure_kind(permanent: &bool) -> &'static str {
    if *permanent { "permanent" } else { "transient" }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Payroll(#[from] PayrollError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Payroll(e) => match e {
                PayrollError::InvalidInput(_) | PayrollError::NoRulesInEffect(_) => {
                    StatusCode::BAD_REQUEST
                }
                PayrollError::NotFound(_) => StatusCode::NOT_FOUND,
                PayrollError::DuplicateBulletin { .. } | PayrollError::PersistenceConflict { .. } => {
                    StatusCode::CONFLICT
                }
                PayrollError::IncompleteProfile { .. } | PayrollError::RenderError { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PayrollError::DeliveryFailure { .. } => StatusCode::BAD_GATEWAY,
                PayrollError::InvalidRules(_)
                | PayrollError::Archive(_)
                | PayrollError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

// Convenience alias
pub type AppResult<T> = Result<T, AppError>;
