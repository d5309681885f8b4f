// src/services/repository/mod.rs

mod memory;
mod postgres;

pub use memory::InMemoryBulletinRepository;
pub use postgres::PgBulletinRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    errors::PayrollResult,
    models::{Bulletin, DeliveryRecord, PayrollPeriod},
};

/// Durable home of bulletins, keyed by (employee, period, version).
///
/// `insert` is a check-and-set on the slot's current bulletin: a bulletin
/// without `supersedes` needs an empty slot, a bulletin with `supersedes`
/// needs that id to still be current. Anything else is a
/// `PersistenceConflict`.
#[async_trait]
pub trait BulletinRepository: Send + Sync {
    /// Short name of the storage engine, reported by the health check.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> PayrollResult<()> {
        Ok(())
    }

    async fn insert(&self, bulletin: &Bulletin) -> PayrollResult<Uuid>;

    async fn get(&self, id: Uuid) -> PayrollResult<Option<Bulletin>>;

    /// The bulletin of the slot that has not been superseded.
    async fn current(&self, employee_id: Uuid, period: PayrollPeriod)
    -> PayrollResult<Option<Bulletin>>;

    /// Current bulletins of an employee for a calendar year, by month.
    async fn current_for_year(&self, employee_id: Uuid, year: i32) -> PayrollResult<Vec<Bulletin>>;

    async fn record_delivery(&self, record: &DeliveryRecord) -> PayrollResult<()>;

    async fn deliveries(&self, bulletin_id: Uuid) -> PayrollResult<Vec<DeliveryRecord>>;
}
