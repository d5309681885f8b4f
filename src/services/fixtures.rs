// src/services/fixtures.rs

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::models::{
    Bulletin, CompanySnapshot, EmployeeSnapshot, EmployeeStatus, Money, PaymentInfo,
    PaymentMethod, PayrollElement, PayrollPeriod, RuleBook,
};
use crate::services::{
    aggregator::aggregate,
    bulletin::{BuildOptions, BulletinBuilder, BulletinInput},
    calculator::{ContributionCalculator, ContributionProfile},
};

pub fn period() -> PayrollPeriod {
    PayrollPeriod::new(2025, 1).unwrap()
}

pub fn employee(n: u128) -> EmployeeSnapshot {
    EmployeeSnapshot {
        id: Uuid::from_u128(n),
        first_name: "Youssef".into(),
        last_name: format!("El Amrani {n}"),
        email: format!("employee{n}@example.ma"),
        national_id: format!("AB{n:06}"),
        cnss_number: Some(format!("{n:09}")),
        amo_number: None,
        position: "Développeur".into(),
        department: "IT".into(),
        hire_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
        base_salary: Some(Money::new(dec!(6000)).unwrap()),
        status: EmployeeStatus::Active,
        dependents: 0,
        cimr_rate: None,
    }
}

pub fn company() -> CompanySnapshot {
    CompanySnapshot {
        name: "Atlas Conseil SARL".into(),
        address: "12 Rue Ibn Batouta".into(),
        city: "Casablanca".into(),
        ice: "001234567000089".into(),
        cnss_affiliation: Some("7654321".into()),
        cnss_number_required: true,
        amo_number_required: false,
        hr_email: Some("rh@atlas-conseil.ma".into()),
    }
}

pub fn payment() -> PaymentInfo {
    PaymentInfo {
        method: PaymentMethod::BankTransfer,
        bank_name: Some("Attijariwafa bank".into()),
        rib: Some("007 780 0001234567890123 45".into()),
    }
}

pub fn bulletin_for(employee: EmployeeSnapshot, adjustments: &[PayrollElement]) -> Bulletin {
    let book = RuleBook::bundled().unwrap();
    let rules = book.for_period(period()).unwrap();
    let company = company();
    let aggregation = aggregate(&employee, &company, period(), adjustments, &[], rules).unwrap();
    let contributions = ContributionCalculator::compute(
        aggregation.gross_total,
        aggregation.taxable_base,
        &ContributionProfile::from(&employee),
        rules,
    )
    .unwrap();
    BulletinBuilder::build(
        BulletinInput {
            employee,
            company,
            period: period(),
            payment: payment(),
            aggregation,
            contributions,
        },
        rules,
        None,
        BuildOptions {
            supersede: false,
            generated_at: Utc.with_ymd_and_hms(2025, 1, 31, 18, 0, 0).unwrap(),
            year_to_date_before: None,
        },
    )
    .unwrap()
}

pub fn bulletin(adjustments: &[PayrollElement]) -> Bulletin {
    bulletin_for(employee(1), adjustments)
}
