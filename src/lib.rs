pub mod config;
pub mod http_client;
pub mod monitor;
pub mod notifier;
pub mod prober;
pub mod status;
pub mod target;
pub mod telemetry;

pub use config::{ConfigError, MonitorConfig};
pub use http_client::{HttpClient, HttpClientError, MockHttpClient, ReqwestHttpClient};
pub use monitor::Monitor;
pub use notifier::{Email, EmailSender, MockEmailSender, Notifier, NotifyError, SmtpEmailSender};
pub use prober::{ProbeError, ProbeOutcome, Prober};
pub use status::router;
pub use target::{Target, TargetRegistry, TargetStatus, Transition};
