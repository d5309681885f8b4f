// src/services/delivery.rs

use std::num::NonZeroU32;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use backoff::{ExponentialBackoffBuilder, future::retry};
use chrono::Utc;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use tracing::{info, warn};

use crate::{
    errors::{PayrollError, PayrollResult},
    models::{Bulletin, DeliveryOptions, DeliveryReceipt},
    services::email::{MailError, Mailer, compose_bulletin_mail},
};

type SendLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Sends tried per bulletin before giving up on transient failures.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// A send still running after this long counts as a transient failure.
    pub attempt_timeout: Duration,
    /// Sends allowed per minute across all deliveries.
    pub rate_per_minute: u32,
    /// HR copy used when the company snapshot has none.
    pub default_hr_email: Option<String>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
            rate_per_minute: 120,
            default_hr_email: None,
        }
    }
}

/// Emails rendered bulletins, retrying transient failures with exponential
/// backoff and pacing every attempt through a shared rate limiter.
#[derive(Clone)]
pub struct DeliveryService {
    mailer: Arc<dyn Mailer>,
    settings: DeliverySettings,
    limiter: Arc<SendLimiter>,
}

impl DeliveryService {
    pub fn new(mailer: Arc<dyn Mailer>, settings: DeliverySettings) -> Self {
        let per_minute = NonZeroU32::new(settings.rate_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
        Self {
            mailer,
            settings,
            limiter,
        }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    pub async fn deliver(
        &self,
        bulletin: &Bulletin,
        document: Vec<u8>,
        options: &DeliveryOptions,
    ) -> PayrollResult<DeliveryReceipt> {
        let mail = compose_bulletin_mail(
            bulletin,
            document,
            options,
            self.settings.default_hr_email.as_deref(),
        );
        let max_attempts = self.settings.max_attempts.max(1);
        let attempts = AtomicU32::new(0);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.settings.initial_backoff)
            .with_max_interval(self.settings.max_backoff)
            .with_max_elapsed_time(None)
            .build();

        let outcome = retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.limiter.until_ready().await;

            let sent = tokio::time::timeout(self.settings.attempt_timeout, self.mailer.send(&mail))
                .await
                .unwrap_or_else(|_| {
                    Err(MailError::Transient(format!(
                        "send timed out after {:?}",
                        self.settings.attempt_timeout
                    )))
                });

            match sent {
                Ok(()) => Ok(()),
                Err(e) if e.is_permanent() || attempt >= max_attempts => {
                    Err(backoff::Error::permanent(e))
                }
                Err(e) => {
                    warn!(
                        bulletin_id = %bulletin.id,
                        attempt,
                        error = %e,
                        "Bulletin delivery attempt failed, retrying"
                    );
                    Err(backoff::Error::transient(e))
                }
            }
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match outcome {
            Ok(()) => {
                info!(bulletin_id = %bulletin.id, attempts, "Bulletin delivered");
                Ok(DeliveryReceipt {
                    bulletin_id: bulletin.id,
                    recipient: mail.to_address,
                    cc: mail.cc,
                    attempts,
                    delivered_at: Utc::now(),
                })
            }
            Err(e) => {
                warn!(bulletin_id = %bulletin.id, attempts, error = %e, "Bulletin delivery failed");
                Err(PayrollError::DeliveryFailure {
                    permanent: e.is_permanent(),
                    attempts,
                    reason: e.to_string(),
                })
            }
        }
    }
}
