// src/models/contribution.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DeductionAmount, Money};

/// Statutory charges for one payslip, all derived from the rule table named
/// by `rule_version`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ContributionResult {
    pub rule_version: String,
    /// Salary the CNSS rates were applied to (gross, capped).
    pub cnss_base: Money,
    pub cnss_employee: Money,
    pub cnss_employer: Money,
    /// Allocations familiales, employer only, uncapped.
    pub family_allowance: Money,
    /// Taxe de formation professionnelle, employer only, uncapped.
    pub training_tax: Money,
    pub amo_employee: Money,
    pub amo_employer: Money,
    pub cimr_employee: Option<Money>,
    pub cimr_employer: Option<Money>,
    /// Frais professionnels allowance deducted before income tax.
    pub professional_expenses: Money,
    /// Salaire net imposable
    pub net_taxable: Money,
    pub income_tax: Money,
}

impl ContributionResult {
    /// Everything withheld from the employee: social charges plus IR.
    pub fn employee_side(&self) -> DeductionAmount {
        DeductionAmount::new(self.social_employee() + self.income_tax)
    }

    /// Employee social charges only (the IR-deductible part).
    pub fn social_employee(&self) -> Money {
        self.cnss_employee + self.amo_employee + self.cimr_employee.unwrap_or(Money::ZERO)
    }

    pub fn employer_side(&self) -> Money {
        self.cnss_employer
            + self.family_allowance
            + self.training_tax
            + self.amo_employer
            + self.cimr_employer.unwrap_or(Money::ZERO)
    }
}
