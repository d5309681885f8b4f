// src/models/rules.rs

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Money, PayrollPeriod};
use crate::errors::{PayrollError, PayrollResult};

const BUNDLED_RULES: &str = include_str!("../../rules/morocco.json");

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CnssRules {
    pub employee_rate: Decimal,
    pub employer_rate: Decimal,
    /// Monthly salary ceiling for the capped CNSS rates.
    pub ceiling: Money,
    pub family_allowance_rate: Decimal,
    pub training_tax_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AmoRules {
    pub employee_rate: Decimal,
    pub employer_rate: Decimal,
}

/// Professional-expense allowance tier; the first tier whose `up_to` covers
/// the taxable gross applies.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ExpenseTier {
    pub up_to: Option<Money>,
    pub rate: Decimal,
    pub cap: Money,
}

/// Monthly IR bracket: `tax = income × rate − deduction`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TaxBracket {
    pub up_to: Option<Money>,
    pub rate: Decimal,
    pub deduction: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DependentRules {
    pub monthly_deduction: Money,
    pub max_dependents: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CimrRules {
    /// Employer rate = employee rate × factor.
    pub employer_factor: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SeniorityTier {
    pub min_years: u32,
    pub rate: Decimal,
}

/// Every rate, ceiling and bracket used to price one payslip.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RuleTable {
    pub version: String,
    pub effective_from: NaiveDate,
    pub cnss: CnssRules,
    pub amo: AmoRules,
    pub professional_expenses: Vec<ExpenseTier>,
    pub income_tax: Vec<TaxBracket>,
    pub dependents: DependentRules,
    pub cimr: CimrRules,
    pub seniority: Vec<SeniorityTier>,
    pub working_days_per_month: u32,
    pub sick_leave_carence_days: u32,
}

impl RuleTable {
    pub fn validate(&self) -> PayrollResult<()> {
        let invalid = |msg: String| PayrollError::InvalidRules(format!("{}: {msg}", self.version));

        let rates = [
            ("cnss.employee_rate", self.cnss.employee_rate),
            ("cnss.employer_rate", self.cnss.employer_rate),
            ("cnss.family_allowance_rate", self.cnss.family_allowance_rate),
            ("cnss.training_tax_rate", self.cnss.training_tax_rate),
            ("amo.employee_rate", self.amo.employee_rate),
            ("amo.employer_rate", self.amo.employer_rate),
        ];
        let tiered = self
            .professional_expenses
            .iter()
            .map(|t| ("professional_expenses.rate", t.rate))
            .chain(self.income_tax.iter().map(|b| ("income_tax.rate", b.rate)))
            .chain(self.seniority.iter().map(|s| ("seniority.rate", s.rate)));
        for (name, rate) in rates.into_iter().chain(tiered) {
            if rate < dec!(0) || rate > dec!(100) {
                return Err(invalid(format!("{name} must be between 0 and 100, got {rate}")));
            }
        }
        if self.cimr.employer_factor < dec!(0) {
            return Err(invalid("cimr.employer_factor must not be negative".into()));
        }

        check_ascending(&self.professional_expenses.iter().map(|t| t.up_to).collect::<Vec<_>>())
            .map_err(|e| invalid(format!("professional_expenses {e}")))?;
        check_ascending(&self.income_tax.iter().map(|b| b.up_to).collect::<Vec<_>>())
            .map_err(|e| invalid(format!("income_tax {e}")))?;

        if !self.seniority.windows(2).all(|w| w[0].min_years < w[1].min_years) {
            return Err(invalid("seniority tiers must have ascending min_years".into()));
        }
        if self.working_days_per_month == 0 {
            return Err(invalid("working_days_per_month must be positive".into()));
        }
        Ok(())
    }

    pub fn expense_tier(&self, gross: Money) -> Option<&ExpenseTier> {
        self.professional_expenses
            .iter()
            .find(|t| t.up_to.is_none_or(|limit| gross <= limit))
    }

    pub fn tax_bracket(&self, income: Money) -> Option<&TaxBracket> {
        self.income_tax
            .iter()
            .find(|b| b.up_to.is_none_or(|limit| income <= limit))
    }

    /// Seniority rate for the given completed years of service.
    pub fn seniority_rate(&self, years: u32) -> Decimal {
        self.seniority
            .iter()
            .rev()
            .find(|t| years >= t.min_years)
            .map(|t| t.rate)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Bounds must be strictly ascending and end with an unbounded tier.
fn check_ascending(bounds: &[Option<Money>]) -> Result<(), String> {
    match bounds.last() {
        None => return Err("must not be empty".into()),
        Some(Some(_)) => return Err("last tier must be unbounded".into()),
        Some(None) => {}
    }
    let bounded: Vec<Money> = bounds[..bounds.len() - 1]
        .iter()
        .map(|b| b.ok_or_else(|| "only the last tier may be unbounded".to_string()))
        .collect::<Result<_, _>>()?;
    if bounded.windows(2).all(|w| w[0] < w[1]) {
        Ok(())
    } else {
        Err("bounds must be strictly ascending".into())
    }
}

/// Dated rule tables. A payslip is always priced with the table in force on
/// the first day of its period, so re-running an old period reproduces the
/// original figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleBook {
    tables: Vec<RuleTable>,
}

impl RuleBook {
    pub fn new(mut tables: Vec<RuleTable>) -> PayrollResult<Self> {
        if tables.is_empty() {
            return Err(PayrollError::InvalidRules("rule book has no tables".into()));
        }
        for table in &tables {
            table.validate()?;
        }
        tables.sort_by_key(|t| t.effective_from);
        if let Some(w) = tables.windows(2).find(|w| w[0].effective_from == w[1].effective_from) {
            return Err(PayrollError::InvalidRules(format!(
                "tables {} and {} share effective date {}",
                w[0].version, w[1].version, w[0].effective_from
            )));
        }
        Ok(Self { tables })
    }

    pub fn from_json(json: &str) -> PayrollResult<Self> {
        #[derive(Deserialize)]
        struct Document {
            tables: Vec<RuleTable>,
        }
        let doc: Document =
            serde_json::from_str(json).map_err(|e| PayrollError::InvalidRules(e.to_string()))?;
        Self::new(doc.tables)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PayrollResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PayrollError::InvalidRules(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Moroccan tables shipped with the service (2024 and 2025 finance laws).
    pub fn bundled() -> PayrollResult<Self> {
        Self::from_json(BUNDLED_RULES)
    }

    pub fn tables(&self) -> &[RuleTable] {
        &self.tables
    }

    pub fn in_effect_on(&self, date: NaiveDate) -> PayrollResult<&RuleTable> {
        self.tables
            .iter()
            .rev()
            .find(|t| t.effective_from <= date)
            .ok_or(PayrollError::NoRulesInEffect(date))
    }

    pub fn for_period(&self, period: PayrollPeriod) -> PayrollResult<&RuleTable> {
        self.in_effect_on(period.first_day())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn bundled_book_loads_and_picks_table_by_date() {
        let book = RuleBook::bundled().unwrap();
        assert_eq!(book.in_effect_on(date(2024, 6, 30)).unwrap().version, "MA-2024");
        assert_eq!(book.in_effect_on(date(2025, 1, 1)).unwrap().version, "MA-2025");
        assert_eq!(book.in_effect_on(date(2031, 1, 1)).unwrap().version, "MA-2025");
        assert!(matches!(
            book.in_effect_on(date(2019, 1, 1)),
            Err(PayrollError::NoRulesInEffect(_))
        ));
    }

    #[test]
    fn period_uses_table_in_force_on_its_first_day() {
        let book = RuleBook::bundled().unwrap();
        let dec_2024 = PayrollPeriod::new(2024, 12).unwrap();
        assert_eq!(book.for_period(dec_2024).unwrap().version, "MA-2024");
    }

    #[test]
    fn rejects_out_of_range_rates() {
        let book = RuleBook::bundled().unwrap();
        let mut table = book.tables()[0].clone();
        table.amo.employee_rate = dec!(120);
        assert!(matches!(table.validate(), Err(PayrollError::InvalidRules(_))));
    }

    #[test]
    fn rejects_bounded_last_bracket() {
        let book = RuleBook::bundled().unwrap();
        let mut table = book.tables()[0].clone();
        table.income_tax.last_mut().unwrap().up_to = Some(Money::new(dec!(99999)).unwrap());
        assert!(table.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_effective_dates() {
        let book = RuleBook::bundled().unwrap();
        let mut twin = book.tables()[0].clone();
        twin.version = "MA-2024-bis".into();
        let tables = vec![book.tables()[0].clone(), twin];
        assert!(RuleBook::new(tables).is_err());
    }

    #[test]
    fn seniority_rate_uses_highest_reached_tier() {
        let book = RuleBook::bundled().unwrap();
        let table = &book.tables()[1];
        assert_eq!(table.seniority_rate(1), dec!(0));
        assert_eq!(table.seniority_rate(2), dec!(5));
        assert_eq!(table.seniority_rate(7), dec!(10));
        assert_eq!(table.seniority_rate(30), dec!(25));
    }
}
