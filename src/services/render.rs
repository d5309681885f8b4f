// src/services/render.rs

use async_trait::async_trait;

use crate::{
    errors::{PayrollError, PayrollResult},
    models::Bulletin,
};

/// Turns a bulletin into a document. Implementations must be deterministic:
/// the same bulletin and `template_version` always give the same bytes.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    fn template_version(&self) -> &str;

    async fn render(&self, bulletin: &Bulletin) -> PayrollResult<Vec<u8>>;
}

/// Rejects bulletins that lack what a payslip has to show.
pub fn check_renderable(bulletin: &Bulletin) -> PayrollResult<()> {
    let blank = |s: &str| s.trim().is_empty();
    let employee = &bulletin.employee;
    let company = &bulletin.company;

    let mut missing = Vec::new();
    if blank(&employee.first_name) || blank(&employee.last_name) {
        missing.push("employee name");
    }
    if blank(&employee.national_id) {
        missing.push("national id");
    }
    if company.cnss_number_required && employee.cnss_number.as_deref().is_none_or(blank) {
        missing.push("CNSS number");
    }
    if blank(&company.name) {
        missing.push("company name");
    }
    if blank(&company.ice) {
        missing.push("company ICE");
    }
    if bulletin.elements.is_empty() {
        missing.push("pay elements");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PayrollError::RenderError {
            bulletin_id: bulletin.id,
            reason: format!("missing {}", missing.join(", ")),
        })
    }
}
