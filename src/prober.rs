use crate::http_client::{HttpClient, HttpClientError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Only this exact status counts as healthy; 201-299 are failures.
pub const HEALTHY_STATUS: u16 = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Server returned status {0}")]
    UnexpectedStatus(u16),
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure(ProbeError),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success)
    }

    /// Classifies a raw client result.
    pub fn classify(result: Result<u16, HttpClientError>) -> Self {
        match result {
            Ok(HEALTHY_STATUS) => ProbeOutcome::Success,
            Ok(status_code) => ProbeOutcome::Failure(ProbeError::UnexpectedStatus(status_code)),
            Err(e) => ProbeOutcome::Failure(ProbeError::Transport(e.to_string())),
        }
    }
}

pub struct Prober {
    http_client: Box<dyn HttpClient>,
}

impl Prober {
    pub fn new(http_client: Box<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// One GET, no retries. The timeout is owned by the client.
    pub async fn probe(&self, name: &str, url: &str) -> ProbeOutcome {
        let started = Instant::now();
        let result = self.http_client.get(url).await.map(|r| r.status_code());
        let outcome = ProbeOutcome::classify(result);
        let elapsed_ms = elapsed_millis(started.elapsed());

        match &outcome {
            ProbeOutcome::Success => {
                info!(target_name = %name, elapsed_ms, "Response OK ({HEALTHY_STATUS})");
            }
            ProbeOutcome::Failure(e) => {
                warn!(target_name = %name, elapsed_ms, error = %e, "Probe failed");
            }
        }

        outcome
    }
}

fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::MockHttpClient;

    const URL: &str = "https://service.example.com";

    fn prober_with(client: MockHttpClient) -> Prober {
        Prober::new(Box::new(client))
    }

    #[tokio::test]
    async fn test_probe_200_is_success() {
        let prober = prober_with(MockHttpClient::new().with_response(URL, 200));

        assert_eq!(prober.probe("svc", URL).await, ProbeOutcome::Success);
    }

    #[tokio::test]
    async fn test_probe_201_is_failure() {
        let prober = prober_with(MockHttpClient::new().with_response(URL, 201));

        let outcome = prober.probe("svc", URL).await;
        assert_eq!(outcome, ProbeOutcome::Failure(ProbeError::UnexpectedStatus(201)));
    }

    #[tokio::test]
    async fn test_probe_server_error_description() {
        let prober = prober_with(MockHttpClient::new().with_response(URL, 500));

        match prober.probe("svc", URL).await {
            ProbeOutcome::Failure(e) => assert_eq!(e.to_string(), "Server returned status 500"),
            ProbeOutcome::Success => panic!("500 must not be healthy"),
        }
    }

    #[tokio::test]
    async fn test_probe_transport_error_keeps_message() {
        let prober = prober_with(MockHttpClient::new().with_error(URL, "operation timed out"));

        let outcome = prober.probe("svc", URL).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Failure(ProbeError::Transport("operation timed out".to_string()))
        );
    }

    #[tokio::test]
    async fn test_probe_issues_exactly_one_request() {
        let client = std::sync::Arc::new(MockHttpClient::new().with_response(URL, 503));
        let prober = Prober::new(Box::new(client.clone()));

        let _ = prober.probe("svc", URL).await;

        assert_eq!(client.requests().len(), 1);
    }

    #[test]
    fn test_classify_redirect_status_is_failure() {
        let outcome = ProbeOutcome::classify(Ok(302));
        assert!(!outcome.is_success());
    }
}
