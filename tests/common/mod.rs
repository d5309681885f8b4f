#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use payroll_ma::{
    models::{
        BatchItem, CompanySnapshot, EmployeeSnapshot, EmployeeStatus, GenerateBatchRequest,
        GenerateBulletinRequest, Money, PaymentInfo, PaymentMethod, PayrollPeriod, RuleBook,
    },
    services::{
        archive::BatchSettings,
        delivery::{DeliveryService, DeliverySettings},
        email::{MailError, Mailer, OutgoingMail},
        pdf::PdfRenderer,
        pipeline::PayrollPipeline,
        repository::InMemoryBulletinRepository,
    },
    state::AppState,
};

pub fn period(year: i32, month: u32) -> PayrollPeriod {
    PayrollPeriod::new(year, month).unwrap()
}

pub fn employee(n: u128, base: Decimal) -> EmployeeSnapshot {
    EmployeeSnapshot {
        id: Uuid::from_u128(n),
        first_name: "Salma".into(),
        last_name: format!("Bennani {n}"),
        email: format!("salma{n}@example.ma"),
        national_id: format!("BE{n:06}"),
        cnss_number: Some(format!("1{n:08}")),
        amo_number: None,
        position: "Comptable".into(),
        department: "Finance".into(),
        hire_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
        base_salary: Some(Money::new(base).unwrap()),
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
        bank_name: Some("Bank of Africa".into()),
        rib: Some("011 780 0000123456789012 34".into()),
    }
}

pub fn request(employee: EmployeeSnapshot, period: PayrollPeriod) -> GenerateBulletinRequest {
    GenerateBulletinRequest {
        employee,
        company: company(),
        period,
        payment: payment(),
        adjustments: Vec::new(),
        absences: Vec::new(),
        supersede: false,
    }
}

pub fn batch_request(employees: Vec<EmployeeSnapshot>, period: PayrollPeriod) -> GenerateBatchRequest {
    GenerateBatchRequest {
        company: company(),
        period,
        items: employees
            .into_iter()
            .map(|employee| BatchItem {
                employee,
                payment: payment(),
                adjustments: Vec::new(),
                absences: Vec::new(),
            })
            .collect(),
        supersede: false,
        deliver: None,
    }
}

/// Replays scripted outcomes, then accepts every mail.
#[derive(Default)]
pub struct ScriptedMailer {
    script: Mutex<Vec<Result<(), MailError>>>,
    pub sent: Mutex<Vec<OutgoingMail>>,
}

impl ScriptedMailer {
    pub fn new(mut script: Vec<Result<(), MailError>>) -> Arc<Self> {
        script.reverse();
        Arc::new(Self {
            script: Mutex::new(script),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for ScriptedMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail.clone());
        self.script.lock().unwrap().pop().unwrap_or(Ok(()))
    }
}

pub fn delivery_settings() -> DeliverySettings {
    DeliverySettings {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        attempt_timeout: Duration::from_secs(2),
        rate_per_minute: 6000,
        default_hr_email: None,
    }
}

pub fn pipeline_with(mailer: Arc<ScriptedMailer>) -> PayrollPipeline {
    PayrollPipeline::new(
        Arc::new(RuleBook::bundled().unwrap()),
        Arc::new(InMemoryBulletinRepository::new()),
        Arc::new(PdfRenderer::new()),
        DeliveryService::new(mailer, delivery_settings()),
        BatchSettings {
            concurrency: 4,
            render_timeout: Duration::from_secs(10),
        },
    )
}

pub fn pipeline() -> PayrollPipeline {
    pipeline_with(ScriptedMailer::new(Vec::new()))
}

pub fn app_state() -> AppState {
    AppState::new(pipeline())
}
