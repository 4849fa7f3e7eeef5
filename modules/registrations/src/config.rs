use std::time::Duration;

use db::RetryConfig;
use serde::{Deserialize, Serialize};

use crate::domain::service::ServiceConfig;

/// Configuration for the registrations module (`modules.registrations`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegistrationsConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_max_bulk_size")]
    pub max_bulk_size: usize,
    #[serde(default = "default_calendar_event_duration", with = "humantime_serde")]
    pub calendar_event_duration: Duration,
    #[serde(default)]
    pub mail: MailConfig,
}

impl Default for RegistrationsConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_bulk_size: default_max_bulk_size(),
            calendar_event_duration: default_calendar_event_duration(),
            mail: MailConfig::default(),
        }
    }
}

impl RegistrationsConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            retry: self.retry.clone(),
            max_bulk_size: self.max_bulk_size,
            calendar_event_duration: self.calendar_event_duration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    /// Envelope sender for every outbound message.
    #[serde(default = "default_from")]
    pub from: String,
    /// Without a relay, messages are only logged.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            smtp: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_max_bulk_size() -> usize {
    500
}

fn default_calendar_event_duration() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_from() -> String {
    "registrations@localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}
