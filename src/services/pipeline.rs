// src/services/pipeline.rs

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, future, stream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    errors::{PayrollError, PayrollResult},
    models::{
        BatchItemReport, Bulletin, BulletinBatch, ContributionPreviewRequest, ContributionResult,
        DeliveryOptions, DeliveryReceipt, DeliveryRecord, GenerateBatchRequest,
        GenerateBulletinRequest, ItemStatus, Money, PayrollPeriod, RuleBook, YearToDate,
    },
    services::{
        aggregator::aggregate,
        archive::{ArchiveReport, BatchSettings, render_archive},
        bulletin::{BuildOptions, BulletinBuilder, BulletinInput},
        calculator::{ContributionCalculator, ContributionProfile},
        delivery::DeliveryService,
        render::DocumentRenderer,
        repository::BulletinRepository,
    },
};

/// Result of a batch run: one report per requested item, in request order,
/// and the archive of every bulletin that rendered.
#[derive(Debug)]
pub struct BatchOutcome {
    pub period: PayrollPeriod,
    pub reports: Vec<BatchItemReport>,
    pub archive: Vec<u8>,
}

impl BatchOutcome {
    pub fn archive_name(&self) -> String {
        format!("bulletins_{}.zip", self.period)
    }
}

/// Aggregation, calculation, building, persistence, rendering and delivery
/// wired together.
pub struct PayrollPipeline {
    rules: Arc<RuleBook>,
    repository: Arc<dyn BulletinRepository>,
    renderer: Arc<dyn DocumentRenderer>,
    delivery: DeliveryService,
    batch: BatchSettings,
}

impl PayrollPipeline {
    pub fn new(
        rules: Arc<RuleBook>,
        repository: Arc<dyn BulletinRepository>,
        renderer: Arc<dyn DocumentRenderer>,
        delivery: DeliveryService,
        batch: BatchSettings,
    ) -> Self {
        Self {
            rules,
            repository,
            renderer,
            delivery,
            batch,
        }
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    pub fn template_version(&self) -> &str {
        self.renderer.template_version()
    }

    pub fn storage_backend(&self) -> &'static str {
        self.repository.backend()
    }

    pub async fn check_storage(&self) -> PayrollResult<()> {
        self.repository.ping().await
    }

    /// Statutory figures for a salary without building a bulletin.
    pub fn preview(&self, req: &ContributionPreviewRequest) -> PayrollResult<ContributionResult> {
        let rules = self.rules.for_period(req.period)?;
        let profile = ContributionProfile {
            dependents: req.dependents,
            cimr_rate: req.cimr_rate,
        };
        ContributionCalculator::compute(
            req.gross_salary,
            req.taxable_base.unwrap_or(req.gross_salary),
            &profile,
            rules,
        )
    }

    /// Builds and persists the bulletin of one employee for one period.
    pub async fn generate(&self, req: GenerateBulletinRequest) -> PayrollResult<Bulletin> {
        let employee_id = req.employee.id;
        let period = req.period;
        self.issue(req).await.inspect_err(|e| {
            warn!(%employee_id, %period, error = %e, "Bulletin not generated");
        })
    }

    async fn issue(&self, req: GenerateBulletinRequest) -> PayrollResult<Bulletin> {
        let GenerateBulletinRequest {
            employee,
            company,
            period,
            payment,
            adjustments,
            absences,
            supersede,
        } = req;

        let rules = self.rules.for_period(period)?;
        let aggregation = aggregate(&employee, &company, period, &adjustments, &absences, rules)?;
        let contributions = ContributionCalculator::compute(
            aggregation.gross_total,
            aggregation.taxable_base,
            &ContributionProfile::from(&employee),
            rules,
        )?;

        let current = self.repository.current(employee.id, period).await?;
        let year_to_date_before = self.year_to_date_before(employee.id, period).await?;

        let bulletin = BulletinBuilder::build(
            BulletinInput {
                employee,
                company,
                period,
                payment,
                aggregation,
                contributions,
            },
            rules,
            current.as_ref(),
            BuildOptions {
                supersede,
                generated_at: Utc::now(),
                year_to_date_before,
            },
        )?;

        self.repository.insert(&bulletin).await?;
        info!(
            bulletin_id = %bulletin.id,
            employee_id = %bulletin.employee_id(),
            %period,
            version = bulletin.version,
            net = %bulletin.net_total,
            "Bulletin generated"
        );
        Ok(bulletin)
    }

    /// Totals of the employee's current bulletins for the earlier months of
    /// `period`'s year.
    async fn year_to_date_before(
        &self,
        employee_id: Uuid,
        period: PayrollPeriod,
    ) -> PayrollResult<Option<YearToDate>> {
        let earlier: Vec<Bulletin> = self
            .repository
            .current_for_year(employee_id, period.year())
            .await?
            .into_iter()
            .filter(|b| b.period < period)
            .collect();

        if earlier.is_empty() {
            return Ok(None);
        }
        Ok(Some(YearToDate {
            months: earlier.len() as u32,
            gross: earlier.iter().map(|b| b.gross_total).sum(),
            taxable: earlier.iter().map(|b| b.taxable_total).sum(),
            income_tax: earlier.iter().map(|b| b.contributions.income_tax).sum::<Money>(),
            net: earlier.iter().map(|b| b.net_total).sum(),
        }))
    }

    pub async fn get(&self, id: Uuid) -> PayrollResult<Bulletin> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| PayrollError::NotFound(format!("bulletin {id}")))
    }

    pub async fn render_pdf(&self, id: Uuid) -> PayrollResult<(Bulletin, Vec<u8>)> {
        let bulletin = self.get(id).await?;
        let document = self.renderer.render(&bulletin).await?;
        Ok((bulletin, document))
    }

    /// Archive of already persisted bulletins, in the order requested.
    pub async fn archive(
        &self,
        ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> PayrollResult<(Vec<u8>, ArchiveReport)> {
        let mut bulletins = Vec::with_capacity(ids.len());
        for id in ids {
            bulletins.push(self.get(*id).await?);
        }
        render_archive(self.renderer.clone(), &bulletins, self.batch, cancel).await
    }

    /// Renders and emails a persisted bulletin, recording the outcome.
    pub async fn deliver(
        &self,
        id: Uuid,
        options: &DeliveryOptions,
    ) -> PayrollResult<DeliveryReceipt> {
        let bulletin = self.get(id).await?;
        self.deliver_bulletin(&bulletin, options).await
    }

    /// Delivery attempts recorded for a bulletin, oldest first.
    pub async fn deliveries(&self, id: Uuid) -> PayrollResult<Vec<DeliveryRecord>> {
        self.get(id).await?;
        self.repository.deliveries(id).await
    }

    async fn deliver_bulletin(
        &self,
        bulletin: &Bulletin,
        options: &DeliveryOptions,
    ) -> PayrollResult<DeliveryReceipt> {
        let document = self.renderer.render(bulletin).await?;
        let outcome = self.delivery.deliver(bulletin, document, options).await;

        let record = match &outcome {
            Ok(receipt) => DeliveryRecord {
                bulletin_id: bulletin.id,
                recipient: receipt.recipient.clone(),
                delivered: true,
                attempts: receipt.attempts,
                error: None,
                recorded_at: receipt.delivered_at,
            },
            Err(e) => DeliveryRecord {
                bulletin_id: bulletin.id,
                recipient: bulletin.employee.email.clone(),
                delivered: false,
                attempts: match e {
                    PayrollError::DeliveryFailure { attempts, .. } => *attempts,
                    _ => 0,
                },
                error: Some(e.to_string()),
                recorded_at: Utc::now(),
            },
        };
        if let Err(e) = self.repository.record_delivery(&record).await {
            error!(bulletin_id = %bulletin.id, error = %e, "Failed to record delivery outcome");
        }

        outcome
    }

    /// Generates, persists and archives the bulletins of a whole period.
    ///
    /// Items fail independently and are reported, never dropped. Once
    /// `cancel` fires no new item is started; items already running finish
    /// and keep their outcome.
    pub async fn generate_batch(
        &self,
        req: GenerateBatchRequest,
        cancel: &CancellationToken,
    ) -> PayrollResult<BatchOutcome> {
        let GenerateBatchRequest {
            company,
            period,
            items,
            supersede,
            deliver,
        } = req;
        self.rules.for_period(period)?;

        let employee_ids: Vec<Uuid> = items.iter().map(|item| item.employee.id).collect();
        info!(%period, items = employee_ids.len(), "Batch started");

        let stop = cancel.clone();
        let mut issued = stream::iter(items)
            .take_while(move |_| future::ready(!stop.is_cancelled()))
            .map(|item| {
                let request = GenerateBulletinRequest {
                    employee: item.employee,
                    company: company.clone(),
                    period,
                    payment: item.payment,
                    adjustments: item.adjustments,
                    absences: item.absences,
                    supersede,
                };
                async move {
                    let employee_id = request.employee.id;
                    (employee_id, self.generate(request).await)
                }
            })
            .buffered(self.batch.concurrency.max(1))
            .boxed();

        let mut reports = Vec::with_capacity(employee_ids.len());
        let mut batch = BulletinBatch::new(period);
        while let Some((employee_id, outcome)) = issued.next().await {
            match outcome {
                Ok(bulletin) => {
                    reports.push(BatchItemReport::succeeded(employee_id, bulletin.id));
                    if let Err(stray) = batch.push(bulletin) {
                        let report = BatchItemReport::failed(
                            employee_id,
                            Some(stray.id),
                            format!("bulletin belongs to {}, not {period}", stray.period),
                        );
                        if let Some(last) = reports.last_mut() {
                            *last = report;
                        }
                    }
                }
                Err(e) => reports.push(BatchItemReport::failed(employee_id, None, e)),
            }
        }
        drop(issued);
        reports.extend(
            employee_ids[reports.len()..]
                .iter()
                .map(|id| BatchItemReport::cancelled(*id, None)),
        );

        let (archive, rendered) =
            render_archive(self.renderer.clone(), batch.bulletins(), self.batch, cancel).await?;
        for report in &mut reports {
            let Some(id) = report.bulletin_id else { continue };
            if let Some(reason) = rendered.failure_for(id) {
                report.status = ItemStatus::Failed;
                report.error = Some(reason.to_string());
            } else if rendered.cancelled.contains(&id) {
                report.status = ItemStatus::Cancelled;
            }
        }

        if let Some(options) = deliver {
            self.deliver_batch(&batch, &rendered, &options, &mut reports, cancel)
                .await;
        }

        let failed = reports
            .iter()
            .filter(|r| r.status == ItemStatus::Failed)
            .count();
        info!(
            %period,
            archived = rendered.rendered.len(),
            failed,
            cancelled = reports.len() - rendered.rendered.len() - failed,
            "Batch finished"
        );

        Ok(BatchOutcome {
            period,
            reports,
            archive,
        })
    }

    /// Emails every archived bulletin of `batch`. Failures land on the item's
    /// report and leave the bulletin persisted.
    async fn deliver_batch(
        &self,
        batch: &BulletinBatch,
        rendered: &ArchiveReport,
        options: &DeliveryOptions,
        reports: &mut [BatchItemReport],
        cancel: &CancellationToken,
    ) {
        let archived: Vec<Bulletin> = batch
            .bulletins()
            .iter()
            .filter(|b| rendered.rendered.contains(&b.id))
            .cloned()
            .collect();
        let stop = cancel.clone();
        let outcomes: Vec<(Uuid, PayrollResult<DeliveryReceipt>)> = stream::iter(archived)
            .take_while(move |_| future::ready(!stop.is_cancelled()))
            .map(|bulletin| async move {
                let outcome = self.deliver_bulletin(&bulletin, options).await;
                (bulletin.id, outcome)
            })
            .buffer_unordered(self.batch.concurrency.max(1))
            .boxed()
            .collect()
            .await;

        for (id, outcome) in outcomes {
            let Some(report) = reports.iter_mut().find(|r| r.bulletin_id == Some(id)) else {
                continue;
            };
            match outcome {
                Ok(receipt) => report.delivery = Some(receipt),
                Err(e) => report.delivery_error = Some(e.to_string()),
            }
        }
    }
}
