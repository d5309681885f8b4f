use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::{archive::BatchSettings, delivery::DeliverySettings};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Without a database bulletins live in memory for the life of the process.
    pub database_url: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from_name: String,
    pub email_from_address: String,
    pub hr_email: Option<String>,
    /// JSON rule book replacing the bundled Moroccan tables.
    pub rules_path: Option<String>,
    /// External document service; the built-in PDF writer is used when unset.
    pub renderer_url: Option<String>,
    pub renderer_template: String,
    pub render_concurrency: usize,
    pub render_timeout_secs: u64,
    pub delivery_max_attempts: u32,
    pub delivery_timeout_secs: u64,
    pub delivery_rate_per_minute: u32,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str, default: &str) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a valid number"))
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parsed("SERVER_PORT", "3000"),
            database_url: optional("DATABASE_URL"),
            smtp_host: env::var("SMTP_HOST").expect("SMTP_HOST must be set"),
            smtp_port: parsed("SMTP_PORT", "587"),
            smtp_username: env::var("SMTP_USERNAME").expect("SMTP_USERNAME must be set"),
            smtp_password: env::var("SMTP_PASSWORD").expect("SMTP_PASSWORD must be set"),
            email_from_name: env::var("EMAIL_FROM_NAME")
                .unwrap_or_else(|_| "Service Paie".to_string()),
            email_from_address: env::var("EMAIL_FROM_ADDRESS")
                .expect("EMAIL_FROM_ADDRESS must be set"),
            hr_email: optional("HR_EMAIL"),
            rules_path: optional("RULES_PATH"),
            renderer_url: optional("RENDERER_URL"),
            renderer_template: env::var("RENDERER_TEMPLATE")
                .unwrap_or_else(|_| "bulletin/1".to_string()),
            render_concurrency: parsed("RENDER_CONCURRENCY", "4"),
            render_timeout_secs: parsed("RENDER_TIMEOUT_SECS", "30"),
            delivery_max_attempts: parsed("DELIVERY_MAX_ATTEMPTS", "3"),
            delivery_timeout_secs: parsed("DELIVERY_TIMEOUT_SECS", "30"),
            delivery_rate_per_minute: parsed("DELIVERY_RATE_PER_MINUTE", "120"),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            concurrency: self.render_concurrency.max(1),
            render_timeout: Duration::from_secs(self.render_timeout_secs),
        }
    }

    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            max_attempts: self.delivery_max_attempts.max(1),
            attempt_timeout: Duration::from_secs(self.delivery_timeout_secs),
            rate_per_minute: self.delivery_rate_per_minute,
            default_hr_email: self.hr_email.clone(),
            ..DeliverySettings::default()
        }
    }
}
