// src/services/repository/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use tracing::warn;
use uuid::Uuid;

use super::BulletinRepository;
use crate::{
    errors::{PayrollError, PayrollResult},
    models::{Bulletin, DeliveryRecord, PayrollPeriod},
};

/// Bulletins stored as JSONB next to the columns the slot checks need.
#[derive(Clone)]
pub struct PgBulletinRepository {
    db: PgPool,
}

#[derive(FromRow)]
struct PayloadRow {
    payload: Json<Bulletin>,
}

#[derive(FromRow)]
struct DeliveryRow {
    bulletin_id: Uuid,
    recipient: String,
    delivered: bool,
    attempts: i32,
    error: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl From<DeliveryRow> for DeliveryRecord {
    fn from(row: DeliveryRow) -> Self {
        Self {
            bulletin_id: row.bulletin_id,
            recipient: row.recipient,
            delivered: row.delivered,
            attempts: row.attempts.max(0) as u32,
            error: row.error,
            recorded_at: row.recorded_at,
        }
    }
}

impl PgBulletinRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl BulletinRepository for PgBulletinRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> PayrollResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.db).await?;
        Ok(())
    }

    async fn insert(&self, bulletin: &Bulletin) -> PayrollResult<Uuid> {
        let employee_id = bulletin.employee_id();
        let period = bulletin.period;
        let conflict = || PayrollError::PersistenceConflict {
            employee_id,
            period,
        };

        let mut tx = self.db.begin().await?;

        if let Some(prior) = bulletin.supersedes {
            let retired = sqlx::query(
                "UPDATE bulletins SET superseded = TRUE
                 WHERE id = $1 AND superseded = FALSE",
            )
            .bind(prior)
            .execute(&mut *tx)
            .await?;
            if retired.rows_affected() != 1 {
                return Err(conflict());
            }
        }

        let inserted = sqlx::query(
            "INSERT INTO bulletins
                (id, employee_id, period_year, period_month, version, supersedes,
                 net_total, payload, generated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT DO NOTHING",
        )
        .bind(bulletin.id)
        .bind(employee_id)
        .bind(period.year())
        .bind(period.month() as i32)
        .bind(bulletin.version as i32)
        .bind(bulletin.supersedes)
        .bind(bulletin.net_total.amount())
        .bind(Json(bulletin))
        .bind(bulletin.generated_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(done) if done.rows_affected() == 1 => {}
            Ok(_) => return Err(conflict()),
            Err(e) if is_unique_violation(&e) => return Err(conflict()),
            Err(e) => return Err(e.into()),
        }

        tx.commit().await.map_err(|e| {
            if is_unique_violation(&e) {
                conflict()
            } else {
                warn!(bulletin_id = %bulletin.id, error = %e, "Bulletin commit failed");
                e.into()
            }
        })?;

        Ok(bulletin.id)
    }

    async fn get(&self, id: Uuid) -> PayrollResult<Option<Bulletin>> {
        let row = sqlx::query_as::<_, PayloadRow>("SELECT payload FROM bulletins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| r.payload.0))
    }

    async fn current(
        &self,
        employee_id: Uuid,
        period: PayrollPeriod,
    ) -> PayrollResult<Option<Bulletin>> {
        let row = sqlx::query_as::<_, PayloadRow>(
            "SELECT payload FROM bulletins
             WHERE employee_id = $1 AND period_year = $2 AND period_month = $3
               AND superseded = FALSE",
        )
        .bind(employee_id)
        .bind(period.year())
        .bind(period.month() as i32)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| r.payload.0))
    }

    async fn current_for_year(&self, employee_id: Uuid, year: i32) -> PayrollResult<Vec<Bulletin>> {
        let rows = sqlx::query_as::<_, PayloadRow>(
            "SELECT payload FROM bulletins
             WHERE employee_id = $1 AND period_year = $2 AND superseded = FALSE
             ORDER BY period_month",
        )
        .bind(employee_id)
        .bind(year)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|r| r.payload.0).collect())
    }

    async fn record_delivery(&self, record: &DeliveryRecord) -> PayrollResult<()> {
        sqlx::query(
            "INSERT INTO bulletin_deliveries
                (bulletin_id, recipient, delivered, attempts, error, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.bulletin_id)
        .bind(&record.recipient)
        .bind(record.delivered)
        .bind(record.attempts as i32)
        .bind(&record.error)
        .bind(record.recorded_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn deliveries(&self, bulletin_id: Uuid) -> PayrollResult<Vec<DeliveryRecord>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(
            "SELECT bulletin_id, recipient, delivered, attempts, error, recorded_at
             FROM bulletin_deliveries WHERE bulletin_id = $1 ORDER BY id",
        )
        .bind(bulletin_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(DeliveryRecord::from).collect())
    }
}
