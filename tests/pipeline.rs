mod common;

use std::io::{Cursor, Read};
use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use common::{ScriptedMailer, batch_request, employee, period, pipeline, pipeline_with, request};
use payroll_ma::{
    errors::PayrollError,
    models::{DeliveryOptions, ItemStatus, Money},
    services::{
        email::MailError,
        pdf::PdfRenderer,
        repository::{BulletinRepository, InMemoryBulletinRepository},
    },
};

fn money(value: rust_decimal::Decimal) -> Money {
    Money::new(value).unwrap()
}

fn archive_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[tokio::test]
async fn six_thousand_dirhams_in_january_2025() {
    let pipeline = pipeline();
    let bulletin = pipeline
        .generate(request(employee(1, dec!(6000)), period(2025, 1)))
        .await
        .unwrap();

    let c = &bulletin.contributions;
    assert_eq!(c.rule_version, "MA-2025");
    assert_eq!(c.cnss_employee, money(dec!(268.80)));
    assert_eq!(c.amo_employee, money(dec!(135.60)));
    assert_eq!(c.professional_expenses, money(dec!(2100.00)));
    assert_eq!(c.net_taxable, money(dec!(3495.60)));
    assert_eq!(c.income_tax, money(dec!(16.23)));
    assert_eq!(bulletin.net_total, money(dec!(5579.37)));
    assert_eq!(bulletin.version, 1);

    let stored = pipeline.get(bulletin.id).await.unwrap();
    assert_eq!(stored, bulletin);
}

#[tokio::test]
async fn the_2024_table_applies_to_2024_periods() {
    let bulletin = pipeline()
        .generate(request(employee(1, dec!(6000)), period(2024, 12)))
        .await
        .unwrap();

    assert_eq!(bulletin.contributions.rule_version, "MA-2024");
    assert_eq!(bulletin.contributions.income_tax, money(dec!(99.56)));
    assert_eq!(bulletin.net_total, money(dec!(5496.04)));
}

#[tokio::test]
async fn second_run_for_a_period_needs_supersede() {
    let pipeline = pipeline();
    let first = pipeline
        .generate(request(employee(1, dec!(6000)), period(2025, 1)))
        .await
        .unwrap();

    let err = pipeline
        .generate(request(employee(1, dec!(6500)), period(2025, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, PayrollError::DuplicateBulletin { .. }));

    let mut correction = request(employee(1, dec!(6500)), period(2025, 1));
    correction.supersede = true;
    let second = pipeline.generate(correction).await.unwrap();

    assert_eq!(second.version, 2);
    assert_eq!(second.supersedes, Some(first.id));
    assert_ne!(second.id, first.id);
    // The first version is still readable and unchanged.
    assert_eq!(pipeline.get(first.id).await.unwrap(), first);
}

#[tokio::test]
async fn year_to_date_sums_earlier_months() {
    let pipeline = pipeline();
    pipeline
        .generate(request(employee(1, dec!(6000)), period(2025, 1)))
        .await
        .unwrap();
    let february = pipeline
        .generate(request(employee(1, dec!(6000)), period(2025, 2)))
        .await
        .unwrap();

    let ytd = february.year_to_date.unwrap();
    assert_eq!(ytd.months, 2);
    assert_eq!(ytd.gross, money(dec!(12000)));
    assert_eq!(ytd.income_tax, money(dec!(32.46)));
    assert_eq!(ytd.net, money(dec!(11158.74)));
}

#[tokio::test]
async fn concurrent_persist_of_one_slot_has_a_single_winner() {
    let pipeline = pipeline();
    let bulletin = pipeline
        .generate(request(employee(7, dec!(6000)), period(2025, 1)))
        .await
        .unwrap();

    let repository = Arc::new(InMemoryBulletinRepository::new());
    let (a, b) = tokio::join!(repository.insert(&bulletin), repository.insert(&bulletin));

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(PayrollError::PersistenceConflict { .. }))));
}

#[tokio::test]
async fn batch_of_fifty_with_one_incomplete_profile() {
    let pipeline = pipeline();
    let mut employees: Vec<_> = (1..=50).map(|n| employee(n, dec!(6000))).collect();
    employees[17].cnss_number = None;
    let missing = employees[17].id;

    let outcome = pipeline
        .generate_batch(batch_request(employees, period(2025, 1)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 50);
    let failed: Vec<_> = outcome
        .reports
        .iter()
        .filter(|r| r.status == ItemStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].employee_id, missing);
    assert!(failed[0].error.as_deref().unwrap().contains("cnss_number"));

    let names = archive_names(&outcome.archive);
    assert_eq!(names.len(), 49);
    assert!(!names.iter().any(|n| n.starts_with(&missing.to_string())));
    assert_eq!(outcome.archive_name(), "bulletins_2025-01.zip");
}

#[tokio::test]
async fn cancelled_batch_starts_nothing() {
    let pipeline = pipeline();
    let employees: Vec<_> = (1..=5).map(|n| employee(n, dec!(6000))).collect();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = pipeline
        .generate_batch(batch_request(employees, period(2025, 1)), &token)
        .await
        .unwrap();

    assert!(outcome.reports.iter().all(|r| r.status == ItemStatus::Cancelled));
    assert!(archive_names(&outcome.archive).is_empty());
}

#[tokio::test]
async fn rendering_is_reproducible() {
    let pipeline = pipeline();
    let bulletin = pipeline
        .generate(request(employee(3, dec!(8000)), period(2025, 3)))
        .await
        .unwrap();

    let (_, first) = pipeline.render_pdf(bulletin.id).await.unwrap();
    let (_, second) = pipeline.render_pdf(bulletin.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, PdfRenderer::new().render_document(&bulletin).unwrap());

    let token = CancellationToken::new();
    let (a, _) = pipeline.archive(&[bulletin.id], &token).await.unwrap();
    let (b, _) = pipeline.archive(&[bulletin.id], &token).await.unwrap();
    assert_eq!(a, b);

    let mut zip = ZipArchive::new(Cursor::new(a)).unwrap();
    let mut inside = Vec::new();
    zip.by_index(0).unwrap().read_to_end(&mut inside).unwrap();
    assert_eq!(inside, first);
}

#[tokio::test]
async fn transient_delivery_failure_is_retried() {
    let mailer = ScriptedMailer::new(vec![Err(MailError::Transient("timeout".into()))]);
    let pipeline = pipeline_with(mailer.clone());
    let bulletin = pipeline
        .generate(request(employee(1, dec!(6000)), period(2025, 1)))
        .await
        .unwrap();

    let options = DeliveryOptions {
        cc_hr: true,
        message: "Bonne réception.".into(),
    };
    let receipt = pipeline.deliver(bulletin.id, &options).await.unwrap();

    assert_eq!(receipt.attempts, 2);
    assert_eq!(receipt.cc.as_deref(), Some("rh@atlas-conseil.ma"));
    assert_eq!(mailer.calls(), 2);

    let sent = mailer.sent.lock().unwrap();
    assert!(sent[1].attachment.starts_with(b"%PDF-1.4"));
    assert_eq!(sent[1].attachment_name, bulletin.document_name());
    drop(sent);

    let records = pipeline.deliveries(bulletin.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].delivered);
}

#[tokio::test]
async fn permanent_delivery_failure_keeps_the_bulletin() {
    let mailer = ScriptedMailer::new(vec![Err(MailError::Permanent("550 mailbox unavailable".into()))]);
    let pipeline = pipeline_with(mailer.clone());
    let bulletin = pipeline
        .generate(request(employee(1, dec!(6000)), period(2025, 1)))
        .await
        .unwrap();

    let err = pipeline
        .deliver(bulletin.id, &DeliveryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PayrollError::DeliveryFailure {
            permanent: true,
            attempts: 1,
            ..
        }
    ));
    assert_eq!(mailer.calls(), 1);

    assert_eq!(pipeline.get(bulletin.id).await.unwrap(), bulletin);
    let records = pipeline.deliveries(bulletin.id).await.unwrap();
    assert!(!records[0].delivered);
    assert!(records[0].error.as_deref().unwrap().contains("550"));
}

#[tokio::test]
async fn batch_delivery_failures_do_not_fail_items() {
    let mailer = ScriptedMailer::new(vec![Err(MailError::Permanent("550 unknown user".into()))]);
    let pipeline = pipeline_with(mailer.clone());
    let employees: Vec<_> = (1..=3).map(|n| employee(n, dec!(6000))).collect();
    let mut req = batch_request(employees, period(2025, 1));
    req.deliver = Some(DeliveryOptions::default());

    let outcome = pipeline
        .generate_batch(req, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.reports.iter().all(|r| r.status == ItemStatus::Succeeded));
    assert_eq!(outcome.reports.iter().filter(|r| r.delivery.is_some()).count(), 2);
    assert_eq!(
        outcome
            .reports
            .iter()
            .filter(|r| r.delivery_error.is_some())
            .count(),
        1
    );
    assert_eq!(mailer.calls(), 3);
}
