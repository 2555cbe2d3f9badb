use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Time between two sweeps. Not configurable at runtime.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Upper bound for a single probe, connect to last byte of headers.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0}")]
    Validation(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub port: u16,
    pub email_user: String,
    pub email_app_password: String,
    pub notification_emails: Vec<String>,
    pub smtp_host: String,
    pub log_format: LogFormat,
    pub sweep_interval: Duration,
    pub probe_timeout: Duration,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let config = Self {
            port,
            email_user: lookup("EMAIL_USER").ok_or(ConfigError::Missing("EMAIL_USER"))?,
            email_app_password: lookup("EMAIL_APP_PASSWORD")
                .ok_or(ConfigError::Missing("EMAIL_APP_PASSWORD"))?,
            notification_emails: parse_recipients(
                &lookup("NOTIFICATION_EMAILS").ok_or(ConfigError::Missing("NOTIFICATION_EMAILS"))?,
            ),
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            log_format,
            sweep_interval: SWEEP_INTERVAL,
            probe_timeout: PROBE_TIMEOUT,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.email_user.trim().is_empty() {
            return Err(ConfigError::Validation("EMAIL_USER cannot be empty"));
        }

        if self.email_app_password.trim().is_empty() {
            return Err(ConfigError::Validation("EMAIL_APP_PASSWORD cannot be empty"));
        }

        if self.notification_emails.is_empty() {
            return Err(ConfigError::Validation(
                "NOTIFICATION_EMAILS must name at least one recipient",
            ));
        }

        if self.smtp_host.trim().is_empty() {
            return Err(ConfigError::Validation("SMTP_HOST cannot be empty"));
        }

        Ok(())
    }

    pub fn log_configuration(&self) {
        info!(
            port = self.port,
            email_user = %self.email_user,
            recipients = %self.notification_emails.join(", "),
            smtp_host = %self.smtp_host,
            sweep_interval = ?self.sweep_interval,
            probe_timeout = ?self.probe_timeout,
            "Monitor configuration loaded"
        );
    }
}

fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}
