// src/models/element.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DeductionAmount, Money};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    BaseSalary,
    Bonus,
    Benefit,
    Overtime,
    Deduction,
    Contribution,
}

/// When a deduction is taken: before the gross figure is struck (it lowers
/// contributions and tax) or from the final net pay.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeductionTiming {
    PreTax,
    #[default]
    PostTax,
}

/// One line of a payslip. `amount` is always a positive magnitude; the
/// `kind` decides whether it adds to or is taken from pay.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PayrollElement {
    pub kind: ElementKind,
    pub label: String,
    pub amount: Money,
    /// Quantity the amount was derived from (hours, days, salary base).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Decimal>,
    /// Percentage applied to `base`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    /// Earnings left out of the taxable base.
    #[serde(default)]
    pub tax_exempt: bool,
    /// Only meaningful for deductions.
    #[serde(default)]
    pub timing: DeductionTiming,
}

impl PayrollElement {
    pub fn earning(kind: ElementKind, label: impl Into<String>, amount: Money) -> Self {
        Self {
            kind,
            label: label.into(),
            amount,
            base: None,
            rate: None,
            tax_exempt: false,
            timing: DeductionTiming::default(),
        }
    }

    pub fn deduction(label: impl Into<String>, amount: DeductionAmount, timing: DeductionTiming) -> Self {
        Self {
            kind: ElementKind::Deduction,
            label: label.into(),
            amount: amount.magnitude(),
            base: None,
            rate: None,
            tax_exempt: false,
            timing,
        }
    }

    /// A statutory withholding line (CNSS, AMO, IR...).
    pub fn contribution(label: impl Into<String>, amount: DeductionAmount) -> Self {
        Self {
            kind: ElementKind::Contribution,
            ..Self::deduction(label, amount, DeductionTiming::PostTax)
        }
    }

    pub fn with_basis(mut self, base: Decimal, rate: Option<Decimal>) -> Self {
        self.base = Some(base);
        self.rate = rate;
        self
    }

    pub fn exempt(mut self) -> Self {
        self.tax_exempt = true;
        self
    }

    pub fn is_earning(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::BaseSalary | ElementKind::Bonus | ElementKind::Benefit | ElementKind::Overtime
        )
    }

    /// The amount as something that can be taken from pay, for deduction
    /// and contribution lines.
    pub fn as_deduction(&self) -> Option<DeductionAmount> {
        matches!(self.kind, ElementKind::Deduction | ElementKind::Contribution)
            .then(|| DeductionAmount::new(self.amount))
    }
}
