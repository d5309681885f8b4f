// src/openapi.rs

use crate::models::{
    Absence, AbsenceKind, AmoRules, ArchiveRequest, BatchItem, BatchItemReport, Bulletin,
    CimrRules, CnssRules, CompanySnapshot, ContributionPreviewRequest, ContributionResult,
    DeductionAmount, DeductionTiming, DeliveryOptions, DeliveryReceipt, DeliveryRecord,
    DependentRules, ElementKind, EmployeeSnapshot, EmployeeStatus, ExpenseTier,
    GenerateBatchRequest, GenerateBatchResponse, GenerateBulletinRequest, ItemStatus, Money,
    PaymentInfo, PaymentMethod, PayrollElement, RuleTable, SeniorityTier, TaxBracket, YearToDate,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Paie Maroc API",
        version = "0.1.0",
        description = "Moroccan payroll engine built with Rust and Axum. \
            Computes CNSS, AMO, CIMR and IR from versioned rule tables, builds immutable \
            bulletins de paie, renders them to PDF and ZIP archives, and emails them to employees.",
        license(name = "MIT")
    ),
    paths(
        // Rules
        crate::handlers::rules::get_rules,
        crate::handlers::rules::preview_contributions,
        // Bulletins
        crate::handlers::bulletin::generate_bulletin,
        crate::handlers::bulletin::generate_batch,
        crate::handlers::bulletin::archive_bulletins,
        crate::handlers::bulletin::get_bulletin,
        crate::handlers::bulletin::download_bulletin_pdf,
        // Delivery
        crate::handlers::bulletin::deliver_bulletin,
        crate::handlers::bulletin::list_deliveries,
    ),
    components(
        schemas(
            Money, DeductionAmount,
            EmployeeSnapshot, EmployeeStatus, CompanySnapshot, PaymentInfo, PaymentMethod,
            PayrollElement, ElementKind, DeductionTiming, Absence, AbsenceKind,
            RuleTable, CnssRules, AmoRules, ExpenseTier, TaxBracket, DependentRules,
            CimrRules, SeniorityTier,
            ContributionPreviewRequest, ContributionResult,
            GenerateBulletinRequest, Bulletin, YearToDate,
            GenerateBatchRequest, BatchItem, GenerateBatchResponse, BatchItemReport, ItemStatus,
            ArchiveRequest,
            DeliveryOptions, DeliveryReceipt, DeliveryRecord,
        )
    ),
    tags(
        (name = "Rules", description = "Contribution and income tax rule tables"),
        (name = "Bulletins", description = "Generate, fetch, render and archive bulletins"),
        (name = "Delivery", description = "Email bulletins and review delivery history"),
    )
)]
pub struct ApiDoc;
