// src/services/repository/memory.rs

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::BulletinRepository;
use crate::{
    errors::{PayrollError, PayrollResult},
    models::{Bulletin, DeliveryRecord, PayrollPeriod},
};

type Slot = (Uuid, PayrollPeriod);

/// Process-local store. Each slot keeps its versions in order, the last one
/// being current; the dashmap entry lock makes `insert` atomic per slot.
#[derive(Default)]
pub struct InMemoryBulletinRepository {
    slots: DashMap<Slot, Vec<Bulletin>>,
    index: DashMap<Uuid, Slot>,
    deliveries: DashMap<Uuid, Vec<DeliveryRecord>>,
}

impl InMemoryBulletinRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BulletinRepository for InMemoryBulletinRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, bulletin: &Bulletin) -> PayrollResult<Uuid> {
        let slot = (bulletin.employee_id(), bulletin.period);
        {
            let mut versions = self.slots.entry(slot).or_default();
            let current = versions.last().map(|b| b.id);
            if current != bulletin.supersedes {
                return Err(PayrollError::PersistenceConflict {
                    employee_id: slot.0,
                    period: slot.1,
                });
            }
            versions.push(bulletin.clone());
        }
        self.index.insert(bulletin.id, slot);
        Ok(bulletin.id)
    }

    async fn get(&self, id: Uuid) -> PayrollResult<Option<Bulletin>> {
        let Some(slot) = self.index.get(&id).map(|s| *s) else {
            return Ok(None);
        };
        Ok(self
            .slots
            .get(&slot)
            .and_then(|versions| versions.iter().find(|b| b.id == id).cloned()))
    }

    async fn current(
        &self,
        employee_id: Uuid,
        period: PayrollPeriod,
    ) -> PayrollResult<Option<Bulletin>> {
        Ok(self
            .slots
            .get(&(employee_id, period))
            .and_then(|versions| versions.last().cloned()))
    }

    async fn current_for_year(&self, employee_id: Uuid, year: i32) -> PayrollResult<Vec<Bulletin>> {
        let mut found: Vec<Bulletin> = self
            .slots
            .iter()
            .filter(|entry| entry.key().0 == employee_id && entry.key().1.year() == year)
            .filter_map(|entry| entry.value().last().cloned())
            .collect();
        found.sort_by_key(|b| b.period);
        Ok(found)
    }

    async fn record_delivery(&self, record: &DeliveryRecord) -> PayrollResult<()> {
        self.deliveries
            .entry(record.bulletin_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn deliveries(&self, bulletin_id: Uuid) -> PayrollResult<Vec<DeliveryRecord>> {
        Ok(self
            .deliveries
            .get(&bulletin_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_inserts_for_one_slot_let_exactly_one_win() {
        let repo = Arc::new(InMemoryBulletinRepository::new());
        let bulletin = fixtures::bulletin(&[]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let bulletin = bulletin.clone();
                tokio::spawn(async move { repo.insert(&bulletin).await })
            })
            .collect();

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(PayrollError::PersistenceConflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!((wins, conflicts), (1, 7));
    }

    #[tokio::test]
    async fn supersede_requires_the_prior_to_be_current() {
        let repo = InMemoryBulletinRepository::new();
        let first = fixtures::bulletin(&[]);
        repo.insert(&first).await.unwrap();

        let mut second = first.clone();
        second.version = 2;
        second.id = crate::models::bulletin_id(first.employee.id, first.period, 2);
        second.supersedes = Some(first.id);
        repo.insert(&second).await.unwrap();

        let mut stale = second.clone();
        stale.version = 3;
        stale.id = crate::models::bulletin_id(first.employee.id, first.period, 3);
        stale.supersedes = Some(first.id);
        assert!(matches!(
            repo.insert(&stale).await,
            Err(PayrollError::PersistenceConflict { .. })
        ));

        let current = repo.current(first.employee.id, first.period).await.unwrap();
        assert_eq!(current.map(|b| b.id), Some(second.id));
        assert_eq!(repo.get(first.id).await.unwrap().map(|b| b.version), Some(1));
    }

    #[tokio::test]
    async fn delivery_records_accumulate() {
        let repo = InMemoryBulletinRepository::new();
        let id = Uuid::from_u128(5);
        for delivered in [false, true] {
            repo.record_delivery(&DeliveryRecord {
                bulletin_id: id,
                recipient: "a@example.ma".into(),
                delivered,
                attempts: 1,
                error: None,
                recorded_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        }
        let records = repo.deliveries(id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].delivered);
    }
}
