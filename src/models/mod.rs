// src/models/mod.rs

mod absence;
mod bulletin;
mod contribution;
mod element;
mod employee;
mod money;
mod period;
mod rules;

pub use absence::{Absence, AbsenceKind};
pub use bulletin::{Bulletin, BulletinBatch, YearToDate, bulletin_id};
pub use contribution::ContributionResult;
pub use element::{DeductionTiming, ElementKind, PayrollElement};
pub use employee::{CompanySnapshot, EmployeeSnapshot, EmployeeStatus, PaymentInfo, PaymentMethod};
pub use money::{DeductionAmount, Money};
pub use period::PayrollPeriod;
pub use rules::{
    AmoRules, CimrRules, CnssRules, DependentRules, ExpenseTier, RuleBook, RuleTable,
    SeniorityTier, TaxBracket,
};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ─── Bulletin generation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateBulletinRequest {
    pub employee: EmployeeSnapshot,
    pub company: CompanySnapshot,
    /// Format: "YYYY-MM"
    #[schema(value_type = String, example = "2025-01")]
    pub period: PayrollPeriod,
    pub payment: PaymentInfo,
    #[serde(default)]
    pub adjustments: Vec<PayrollElement>,
    #[serde(default)]
    pub absences: Vec<Absence>,
    /// Issue a new version replacing the current bulletin of the period.
    #[serde(default)]
    pub supersede: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BatchItem {
    pub employee: EmployeeSnapshot,
    pub payment: PaymentInfo,
    #[serde(default)]
    pub adjustments: Vec<PayrollElement>,
    #[serde(default)]
    pub absences: Vec<Absence>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateBatchRequest {
    pub company: CompanySnapshot,
    /// Format: "YYYY-MM"
    #[schema(value_type = String, example = "2025-01")]
    pub period: PayrollPeriod,
    pub items: Vec<BatchItem>,
    #[serde(default)]
    pub supersede: bool,
    /// Email every generated bulletin once the archive is built.
    #[serde(default)]
    pub deliver: Option<DeliveryOptions>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    Failed,
    /// Not started because the batch was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchItemReport {
    pub employee_id: Uuid,
    pub status: ItemStatus,
    pub bulletin_id: Option<Uuid>,
    pub error: Option<String>,
    pub delivery: Option<DeliveryReceipt>,
    pub delivery_error: Option<String>,
}

impl BatchItemReport {
    pub fn succeeded(employee_id: Uuid, bulletin_id: Uuid) -> Self {
        Self {
            employee_id,
            status: ItemStatus::Succeeded,
            bulletin_id: Some(bulletin_id),
            error: None,
            delivery: None,
            delivery_error: None,
        }
    }

    pub fn cancelled(employee_id: Uuid, bulletin_id: Option<Uuid>) -> Self {
        Self {
            employee_id,
            status: ItemStatus::Cancelled,
            bulletin_id,
            error: None,
            delivery: None,
            delivery_error: None,
        }
    }

    pub fn failed(employee_id: Uuid, bulletin_id: Option<Uuid>, error: impl ToString) -> Self {
        Self {
            employee_id,
            status: ItemStatus::Failed,
            bulletin_id,
            error: Some(error.to_string()),
            delivery: None,
            delivery_error: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateBatchResponse {
    /// Format: "YYYY-MM"
    #[schema(value_type = String, example = "2025-01")]
    pub period: PayrollPeriod,
    pub items: Vec<BatchItemReport>,
    pub archive_name: String,
    /// ZIP archive, base64 encoded.
    pub archive_base64: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ArchiveRequest {
    pub bulletin_ids: Vec<Uuid>,
}

// ─── Delivery ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeliveryOptions {
    /// Copy the company's HR mailbox.
    #[serde(default)]
    pub cc_hr: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DeliveryReceipt {
    pub bulletin_id: Uuid,
    pub recipient: String,
    pub cc: Option<String>,
    pub attempts: u32,
    pub delivered_at: DateTime<Utc>,
}

/// One delivery outcome as stored next to the bulletin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DeliveryRecord {
    pub bulletin_id: Uuid,
    pub recipient: String,
    pub delivered: bool,
    pub attempts: u32,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ─── Rules & contributions ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, IntoParams)]
pub struct RulesQuery {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContributionPreviewRequest {
    pub gross_salary: Money,
    /// Defaults to the gross salary.
    pub taxable_base: Option<Money>,
    /// Format: "YYYY-MM"
    #[schema(value_type = String, example = "2025-01")]
    pub period: PayrollPeriod,
    #[serde(default)]
    pub dependents: u8,
    pub cimr_rate: Option<Decimal>,
}
