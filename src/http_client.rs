use async_trait::async_trait;
use reqwest::Client;
use std::collections::{HashMap, VecDeque};
use std::error::Error as _;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("{0}")]
    Transport(String),
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues a single GET. Any status code is returned as a response; only
    /// transport failures map to an error.
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError>;
}

#[async_trait]
impl<T: HttpClient + ?Sized> HttpClient for std::sync::Arc<T> {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError> {
        (**self).get(url).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
}

impl HttpResponse {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }
}

pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HttpClientError::Build)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpClientError::Transport(describe(&e)))?;

        Ok(HttpResponse {
            status_code: response.status().as_u16(),
        })
    }
}

/// Flattens a reqwest error and its causes into one line, so timeouts and
/// connection resets stay visible in logs and alert emails.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockHttpResponse {
    Status(u16),
    TransportError(String),
}

/// Scripted client for tests and benches. Each URL replays its queued
/// responses in order; the last one repeats once the queue drains.
pub struct MockHttpClient {
    responses: Mutex<HashMap<String, VecDeque<MockHttpResponse>>>,
    default_response: MockHttpResponse,
    requests: Mutex<Vec<String>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            default_response: MockHttpResponse::Status(404),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, url: &str, status_code: u16) -> Self {
        self.with_sequence(url, vec![MockHttpResponse::Status(status_code)])
    }

    pub fn with_error(self, url: &str, message: &str) -> Self {
        self.with_sequence(url, vec![MockHttpResponse::TransportError(message.to_string())])
    }

    pub fn with_sequence(self, url: &str, responses: Vec<MockHttpResponse>) -> Self {
        lock(&self.responses).insert(url.to_string(), responses.into());
        self
    }

    pub fn with_default_response(mut self, status_code: u16) -> Self {
        self.default_response = MockHttpResponse::Status(status_code);
        self
    }

    /// URLs requested so far, in call order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    fn next_response(&self, url: &str) -> MockHttpResponse {
        let mut responses = lock(&self.responses);
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
        .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError> {
        lock(&self.requests).push(url.to_string());

        match self.next_response(url) {
            MockHttpResponse::Status(status_code) => Ok(HttpResponse { status_code }),
            MockHttpResponse::TransportError(message) => Err(HttpClientError::Transport(message)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::{ProbeError, ProbeOutcome, Prober};

    #[tokio::test]
    async fn test_mock_http_client() {
        let client = MockHttpClient::new().with_response("http://example.com/test", 200);

        let response = client.get("http://example.com/test").await.unwrap();

        assert_eq!(response.status_code(), 200);
        assert_eq!(client.requests(), vec!["http://example.com/test".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_http_client_default_response() {
        let client = MockHttpClient::new().with_default_response(500);

        let response = client.get("http://unknown-url.com").await.unwrap();

        assert_eq!(response.status_code(), 500);
    }

    #[tokio::test]
    async fn test_mock_http_client_sequence_repeats_last() {
        let client = MockHttpClient::new().with_sequence(
            "http://example.com",
            vec![MockHttpResponse::Status(500), MockHttpResponse::Status(200)],
        );

        assert_eq!(client.get("http://example.com").await.unwrap().status_code(), 500);
        assert_eq!(client.get("http://example.com").await.unwrap().status_code(), 200);
        assert_eq!(client.get("http://example.com").await.unwrap().status_code(), 200);
    }

    #[tokio::test]
    async fn test_mock_http_client_transport_error() {
        let client = MockHttpClient::new().with_error("http://example.com", "connection refused");

        let err = client.get("http://example.com").await.unwrap_err();

        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_reqwest_client_returns_non_success_status() {
        use axum::{http::StatusCode, routing::get, Router};

        let app = Router::new().route("/", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
        let response = client.get(&format!("http://{addr}/")).await.unwrap();

        assert_eq!(response.status_code(), 503);
    }

    async fn spawn_redirect_server() -> std::net::SocketAddr {
        use axum::{response::Redirect, routing::get, Router};

        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/r", get(|| async { Redirect::temporary("/ok") }))
            .route("/r404", get(|| async { Redirect::temporary("/missing") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "late"
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_redirect_to_ok_route_is_success() {
        let addr = spawn_redirect_server().await;
        let prober = Prober::new(Box::new(ReqwestHttpClient::new(Duration::from_secs(5)).unwrap()));

        let outcome = prober.probe("svc", &format!("http://{addr}/r")).await;

        assert_eq!(outcome, ProbeOutcome::Success);
    }

    #[tokio::test]
    async fn test_redirect_to_missing_route_is_failure() {
        let addr = spawn_redirect_server().await;
        let prober = Prober::new(Box::new(ReqwestHttpClient::new(Duration::from_secs(5)).unwrap()));

        let outcome = prober.probe("svc", &format!("http://{addr}/r404")).await;

        assert_eq!(outcome, ProbeOutcome::Failure(ProbeError::UnexpectedStatus(404)));
    }

    #[tokio::test]
    async fn test_slow_response_times_out_as_transport_failure() {
        let addr = spawn_redirect_server().await;
        let prober = Prober::new(Box::new(ReqwestHttpClient::new(Duration::from_millis(200)).unwrap()));

        let outcome = prober.probe("svc", &format!("http://{addr}/slow")).await;

        assert!(matches!(outcome, ProbeOutcome::Failure(ProbeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_reqwest_client_reports_connection_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
        let result = client.get(&format!("http://{addr}/")).await;

        assert!(matches!(result, Err(HttpClientError::Transport(_))));
    }
}
