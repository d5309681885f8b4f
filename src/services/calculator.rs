// src/services/calculator.rs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    errors::{PayrollError, PayrollResult},
    models::{ContributionResult, EmployeeSnapshot, Money, RuleTable},
};

/// Employee attributes that change the statutory figures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributionProfile {
    pub dependents: u8,
    /// CIMR employee rate in percent; `None` when not enrolled.
    pub cimr_rate: Option<Decimal>,
}

impl From<&EmployeeSnapshot> for ContributionProfile {
    fn from(employee: &EmployeeSnapshot) -> Self {
        Self {
            dependents: employee.dependents,
            cimr_rate: employee.cimr_rate,
        }
    }
}

pub struct ContributionCalculator;

impl ContributionCalculator {
    /// CNSS, AMO, CIMR and IR for one month of pay.
    ///
    /// Social charges are assessed on `gross`; income tax on `taxable`
    /// (gross less exempt earnings) after the employee's social charges and
    /// the professional-expense allowance have been taken off.
    pub fn compute(
        gross: Money,
        taxable: Money,
        profile: &ContributionProfile,
        rules: &RuleTable,
    ) -> PayrollResult<ContributionResult> {
        if taxable > gross {
            return Err(PayrollError::InvalidInput(format!(
                "taxable base {taxable} exceeds gross salary {gross}"
            )));
        }
        if let Some(rate) = profile.cimr_rate {
            if rate <= dec!(0) || rate > dec!(100) {
                return Err(PayrollError::InvalidInput(format!(
                    "CIMR rate must be in (0, 100], got {rate}"
                )));
            }
        }

        let cnss_base = gross.min(rules.cnss.ceiling);
        let cnss_employee = cnss_base.percent(rules.cnss.employee_rate);
        let cnss_employer = cnss_base.percent(rules.cnss.employer_rate);
        let family_allowance = gross.percent(rules.cnss.family_allowance_rate);
        let training_tax = gross.percent(rules.cnss.training_tax_rate);

        let amo_employee = gross.percent(rules.amo.employee_rate);
        let amo_employer = gross.percent(rules.amo.employer_rate);

        let cimr_employee = profile.cimr_rate.map(|rate| gross.percent(rate));
        let cimr_employer = profile
            .cimr_rate
            .map(|rate| gross.percent(rate * rules.cimr.employer_factor));

        let professional_expenses = rules
            .expense_tier(taxable)
            .map(|tier| taxable.percent(tier.rate).min(tier.cap))
            .unwrap_or(Money::ZERO);

        let withheld =
            cnss_employee + amo_employee + cimr_employee.unwrap_or(Money::ZERO) + professional_expenses;
        let net_taxable =
            Money::round_non_negative(taxable.amount() - withheld.amount());

        let income_tax = income_tax(net_taxable, profile.dependents, rules);

        Ok(ContributionResult {
            rule_version: rules.version.clone(),
            cnss_base,
            cnss_employee,
            cnss_employer,
            family_allowance,
            training_tax,
            amo_employee,
            amo_employer,
            cimr_employee,
            cimr_employer,
            professional_expenses,
            net_taxable,
            income_tax,
        })
    }
}

/// Contributions when the whole gross is taxable.
pub fn compute_contributions(
    gross: Money,
    profile: &ContributionProfile,
    rules: &RuleTable,
) -> PayrollResult<ContributionResult> {
    ContributionCalculator::compute(gross, gross, profile, rules)
}

fn income_tax(net_taxable: Money, dependents: u8, rules: &RuleTable) -> Money {
    let Some(bracket) = rules.tax_bracket(net_taxable) else {
        return Money::ZERO;
    };
    let dependents = Decimal::from(dependents.min(rules.dependents.max_dependents));
    let family_relief = rules.dependents.monthly_deduction.amount() * dependents;

    Money::round_non_negative(
        net_taxable.amount() * bracket.rate / dec!(100)
            - bracket.deduction.amount()
            - family_relief,
    )
}
