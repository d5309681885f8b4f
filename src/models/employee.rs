// src/models/employee.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    Inactive,
    OnLeave,
}

/// Employee record as supplied by the HR directory. The pipeline keeps a
/// copy inside each bulletin and never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EmployeeSnapshot {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Carte d'identité nationale
    pub national_id: String,
    pub cnss_number: Option<String>,
    pub amo_number: Option<String>,
    pub position: String,
    pub department: String,
    pub hire_date: NaiveDate,
    pub base_salary: Option<Money>,
    pub status: EmployeeStatus,
    #[serde(default)]
    pub dependents: u8,
    /// CIMR employee rate in percent; `None` when not enrolled.
    #[serde(default)]
    pub cimr_rate: Option<Decimal>,
}

impl EmployeeSnapshot {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CompanySnapshot {
    pub name: String,
    pub address: String,
    pub city: String,
    /// Identifiant commun de l'entreprise
    pub ice: String,
    pub cnss_affiliation: Option<String>,
    /// Whether employees must carry a CNSS number to be paid.
    #[serde(default = "default_true")]
    pub cnss_number_required: bool,
    #[serde(default)]
    pub amo_number_required: bool,
    pub hr_email: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Cheque,
    Cash,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub bank_name: Option<String>,
    /// Relevé d'identité bancaire
    pub rib: Option<String>,
}
