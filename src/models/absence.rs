// src/models/absence.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceKind {
    /// Congé payé; no effect on pay.
    Paid,
    /// Absence non rémunérée
    Unpaid,
    /// Arrêt maladie; days past the carence period are paid by the CNSS,
    /// not the employer.
    Sick,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Absence {
    pub kind: AbsenceKind,
    pub days: u32,
    #[serde(default)]
    pub note: Option<String>,
}
