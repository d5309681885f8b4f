// src/services/bulletin.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    errors::{PayrollError, PayrollResult},
    models::{
        Bulletin, CompanySnapshot, ContributionResult, DeductionAmount, EmployeeSnapshot, Money, PaymentInfo, PayrollElement, PayrollPeriod, RuleTable, YearToDate,
        bulletin_id,
    },
    services::aggregator::Aggregation,
};

/// Everything a bulletin is assembled from.
pub struct BulletinInput {
    pub employee: EmployeeSnapshot,
    pub company: CompanySnapshot,
    pub period: PayrollPeriod,
    pub payment: PaymentInfo,
    pub aggregation: Aggregation,
    pub contributions: ContributionResult,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Replace the current bulletin of the slot with a new version.
    pub supersede: bool,
    pub generated_at: DateTime<Utc>,
    /// Totals of this year's earlier bulletins, if any exist.
    pub year_to_date_before: Option<YearToDate>,
}

pub struct BulletinBuilder;

impl BulletinBuilder {
    /// Assembles a bulletin. `current` is the live bulletin of the same
    /// employee and period, if one has been persisted.
    pub fn build(
        input: BulletinInput,
        rules: &RuleTable,
        current: Option<&Bulletin>,
        options: BuildOptions,
    ) -> PayrollResult<Bulletin> {
        let BulletinInput {
            employee,
            company,
            period,
            payment,
            aggregation,
            contributions,
        } = input;

        if contributions.rule_version != rules.version {
            return Err(PayrollError::InvalidInput(format!(
                "contributions priced with {} but period {period} uses {}",
                contributions.rule_version, rules.version
            )));
        }

        let (version, supersedes) = match current {
            Some(_) if !options.supersede => {
                return Err(PayrollError::DuplicateBulletin {
                    employee_id: employee.id,
                    period,
                });
            }
            Some(existing) => (existing.version + 1, Some(existing.id)),
            None => (1, None),
        };

        let gross_total = aggregation.gross_total;
        let net_total = gross_total
            .checked_deduct(contributions.employee_side())
            .and_then(|rest| rest.checked_deduct(aggregation.post_tax_deductions))
            .ok_or_else(|| {
                PayrollError::InvalidInput(format!(
                    "withholdings exceed gross pay {gross_total} for employee {} in {period}",
                    employee.id
                ))
            })?;

        let year_to_date = Some(accumulate(
            options.year_to_date_before,
            gross_total,
            aggregation.taxable_base,
            contributions.income_tax,
            net_total,
        ));

        let mut elements = aggregation.elements;
        elements.extend(contribution_lines(&contributions, rules, gross_total));

        Ok(Bulletin {
            id: bulletin_id(employee.id, period, version),
            version,
            supersedes,
            employee,
            company,
            period,
            payment,
            elements,
            contributions,
            gross_total,
            taxable_total: aggregation.taxable_base,
            post_tax_deductions: aggregation.post_tax_deductions,
            net_total,
            generated_at: options.generated_at,
            year_to_date,
        })
    }
}

fn accumulate(
    before: Option<YearToDate>,
    gross: Money,
    taxable: Money,
    income_tax: Money,
    net: Money,
) -> YearToDate {
    let before = before.unwrap_or(YearToDate {
        months: 0,
        gross: Money::ZERO,
        taxable: Money::ZERO,
        income_tax: Money::ZERO,
        net: Money::ZERO,
    });
    YearToDate {
        months: before.months + 1,
        gross: before.gross + gross,
        taxable: before.taxable + taxable,
        income_tax: before.income_tax + income_tax,
        net: before.net + net,
    }
}

/// Employee-side withholdings as presentation lines.
fn contribution_lines(
    c: &ContributionResult,
    rules: &RuleTable,
    gross: Money,
) -> Vec<PayrollElement> {
    let line = |label: &str, amount: Money, base: Money, rate: Option<Decimal>| {
        PayrollElement::contribution(label, DeductionAmount::new(amount))
            .with_basis(base.amount(), rate)
    };

    let mut lines = vec![
        line("Cotisation CNSS", c.cnss_employee, c.cnss_base, Some(rules.cnss.employee_rate)),
        line("Cotisation AMO", c.amo_employee, gross, Some(rules.amo.employee_rate)),
    ];
    if let Some(cimr) = c.cimr_employee {
        lines.push(line("Cotisation CIMR", cimr, gross, None));
    }
    lines.push(line("Impôt sur le revenu (IR)", c.income_tax, c.net_taxable, None));
    lines
}
