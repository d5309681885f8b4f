// src/models/bulletin.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    CompanySnapshot, ContributionResult, DeductionAmount, EmployeeSnapshot, Money, PaymentInfo,
    PayrollElement, PayrollPeriod,
};

const BULLETIN_NAMESPACE: Uuid = Uuid::from_u128(0x6d61_7061_7969_4ea1_9b1e_7c0b_0f2d_5a11);

/// Stable identifier for the `version`-th bulletin of an employee in a period.
pub fn bulletin_id(employee_id: Uuid, period: PayrollPeriod, version: u32) -> Uuid {
    let name = format!("{employee_id}:{period}:v{version}");
    Uuid::new_v5(&BULLETIN_NAMESPACE, name.as_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct YearToDate {
    /// Number of months (including this one) the totals cover.
    pub months: u32,
    pub gross: Money,
    pub taxable: Money,
    pub income_tax: Money,
    pub net: Money,
}

/// A payslip for one employee and one period. Once persisted it is never
/// edited: a correction is a new bulletin with `version + 1` whose
/// `supersedes` points at the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Bulletin {
    pub id: Uuid,
    pub version: u32,
    pub supersedes: Option<Uuid>,
    pub employee: EmployeeSnapshot,
    pub company: CompanySnapshot,
    #[schema(value_type = String, example = "2025-01")]
    pub period: PayrollPeriod,
    pub payment: PaymentInfo,
    pub elements: Vec<PayrollElement>,
    pub contributions: ContributionResult,
    pub gross_total: Money,
    pub taxable_total: Money,
    pub post_tax_deductions: DeductionAmount,
    pub net_total: Money,
    pub generated_at: DateTime<Utc>,
    pub year_to_date: Option<YearToDate>,
}

impl Bulletin {
    pub fn employee_id(&self) -> Uuid {
        self.employee.id
    }

    /// `<employeeId>_<period>.pdf`, the name used inside batch archives.
    pub fn document_name(&self) -> String {
        format!("{}_{}.pdf", self.employee.id, self.period)
    }
}

/// Bulletins of one period processed together. Not persisted.
#[derive(Debug, Clone)]
pub struct BulletinBatch {
    period: PayrollPeriod,
    bulletins: Vec<Bulletin>,
}

impl BulletinBatch {
    pub fn new(period: PayrollPeriod) -> Self {
        Self {
            period,
            bulletins: Vec::new(),
        }
    }

    pub fn period(&self) -> PayrollPeriod {
        self.period
    }

    /// Bulletins from another period are handed back untouched.
    pub fn push(&mut self, bulletin: Bulletin) -> Result<(), Bulletin> {
        if bulletin.period != self.period {
            return Err(bulletin);
        }
        self.bulletins.push(bulletin);
        Ok(())
    }

    pub fn bulletins(&self) -> &[Bulletin] {
        &self.bulletins
    }

    pub fn into_bulletins(self) -> Vec<Bulletin> {
        self.bulletins
    }

    pub fn len(&self) -> usize {
        self.bulletins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bulletins.is_empty()
    }
}
