// src/services/aggregator.rs

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::{
    errors::{PayrollError, PayrollResult},
    models::{
        Absence, AbsenceKind, CompanySnapshot, DeductionAmount, DeductionTiming, ElementKind,
        EmployeeSnapshot, EmployeeStatus, Money, PayrollElement, PayrollPeriod, RuleTable,
    },
};

/// Line items of one payslip and the totals struck from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub elements: Vec<PayrollElement>,
    /// Earnings less pre-tax deductions.
    pub gross_total: Money,
    /// `gross_total` less tax-exempt earnings.
    pub taxable_base: Money,
    pub post_tax_deductions: DeductionAmount,
}

/// Builds the earning/deduction lines for `employee` in `period`.
///
/// Order of the lines: base salary, seniority bonus, absence deductions,
/// then `adjustments` as supplied.
pub fn aggregate(
    employee: &EmployeeSnapshot,
    company: &CompanySnapshot,
    period: PayrollPeriod,
    adjustments: &[PayrollElement],
    absences: &[Absence],
    rules: &RuleTable,
) -> PayrollResult<Aggregation> {
    let base_salary = check_profile(employee, company)?;

    if employee.status == EmployeeStatus::Inactive {
        return Err(PayrollError::InvalidInput(format!(
            "employee {} is inactive and cannot be paid for {period}",
            employee.id
        )));
    }
    if employee.hire_date > period.last_day() {
        return Err(PayrollError::InvalidInput(format!(
            "employee {} was hired on {} after the end of {period}",
            employee.id, employee.hire_date
        )));
    }

    let mut elements = vec![PayrollElement::earning(
        ElementKind::BaseSalary,
        "Salaire de base",
        base_salary,
    )];

    let years = completed_years(employee.hire_date, period.last_day());
    let seniority_rate = rules.seniority_rate(years);
    if !seniority_rate.is_zero() {
        elements.push(
            PayrollElement::earning(
                ElementKind::Bonus,
                format!("Prime d'ancienneté ({years} ans)"),
                base_salary.percent(seniority_rate),
            )
            .with_basis(base_salary.amount(), Some(seniority_rate)),
        );
    }

    elements.extend(absence_deductions(base_salary, absences, rules));

    for adjustment in adjustments {
        match adjustment.kind {
            ElementKind::BaseSalary => {
                return Err(PayrollError::InvalidInput(format!(
                    "base salary comes from the employee record, not adjustments (employee {}, {period})",
                    employee.id
                )));
            }
            ElementKind::Contribution => {
                return Err(PayrollError::InvalidInput(format!(
                    "statutory contributions are computed, not supplied (employee {}, {period})",
                    employee.id
                )));
            }
            _ => elements.push(adjustment.clone()),
        }
    }

    let earnings: Money = elements
        .iter()
        .filter(|e| e.is_earning())
        .map(|e| e.amount)
        .sum();
    let exempt: Money = elements
        .iter()
        .filter(|e| e.is_earning() && e.tax_exempt)
        .map(|e| e.amount)
        .sum();
    let pre_tax = deductions(&elements, DeductionTiming::PreTax);
    let post_tax_deductions = deductions(&elements, DeductionTiming::PostTax);

    let gross_total = earnings.checked_deduct(pre_tax).ok_or_else(|| {
        PayrollError::InvalidInput(format!(
            "pre-tax deductions {pre_tax} exceed earnings {earnings} (employee {}, {period})",
            employee.id
        ))
    })?;
    let taxable_base = gross_total.saturating_deduct(DeductionAmount::new(exempt));

    Ok(Aggregation {
        elements,
        gross_total,
        taxable_base,
        post_tax_deductions,
    })
}

/// Returns the base salary once every mandatory field is present.
fn check_profile(employee: &EmployeeSnapshot, company: &CompanySnapshot) -> PayrollResult<Money> {
    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());

    let mut missing = Vec::new();
    if employee.base_salary.is_none_or(Money::is_zero) {
        missing.push("base_salary");
    }
    if employee.national_id.trim().is_empty() {
        missing.push("national_id");
    }
    if company.cnss_number_required && blank(&employee.cnss_number) {
        missing.push("cnss_number");
    }
    if company.amo_number_required && blank(&employee.amo_number) {
        missing.push("amo_number");
    }

    match employee.base_salary {
        Some(base) if missing.is_empty() => Ok(base),
        _ => Err(PayrollError::IncompleteProfile {
            employee_id: employee.id,
            missing,
        }),
    }
}

fn deductions(elements: &[PayrollElement], timing: DeductionTiming) -> DeductionAmount {
    elements
        .iter()
        .filter(|e| e.kind == ElementKind::Deduction && e.timing == timing)
        .filter_map(PayrollElement::as_deduction)
        .sum()
}

/// Pre-tax deductions for unpaid days. Paid leave costs nothing; sick days
/// inside the carence period stay on the employer, the rest are paid by the
/// CNSS and come off the salary.
///
/// The month as a whole never loses more than `working_days_per_month`
/// days, however the absences are split. Amounts are struck from the running
/// day count so the lines add up to at most the base salary.
pub fn absence_deductions(
    base_salary: Money,
    absences: &[Absence],
    rules: &RuleTable,
) -> Vec<PayrollElement> {
    let working_days = rules.working_days_per_month;
    let daily_rate = base_salary.amount() / Decimal::from(working_days);
    let cost = |days: u32| Money::round_non_negative(daily_rate * Decimal::from(days));

    let mut deducted = 0;
    let mut lines = Vec::new();
    for absence in absences {
        let (days, label) = match absence.kind {
            AbsenceKind::Paid => continue,
            AbsenceKind::Unpaid => (absence.days, "Absence non rémunérée".to_string()),
            AbsenceKind::Sick => (
                absence.days.saturating_sub(rules.sick_leave_carence_days),
                format!(
                    "Arrêt maladie (au-delà de {} jours de carence)",
                    rules.sick_leave_carence_days
                ),
            ),
        };
        let days = days.min(working_days - deducted);
        if days == 0 {
            continue;
        }
        let amount = Money::round_non_negative(
            cost(deducted + days).amount() - cost(deducted).amount(),
        );
        deducted += days;
        lines.push(
            PayrollElement::deduction(label, DeductionAmount::new(amount), DeductionTiming::PreTax)
                .with_basis(Decimal::from(days), None),
        );
    }
    lines
}

fn completed_years(from: NaiveDate, to: NaiveDate) -> u32 {
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}
