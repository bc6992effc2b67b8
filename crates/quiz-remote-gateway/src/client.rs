//! HTTP client for the quiz backend with retry and host fallback.

use parking_lot::RwLock;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::dto::{
    ApiResponse, ExamUnlockData, QuizSessionDto, SyncRequest, SyncResponse, UnlockExamRequest,
    UnlockStatusData,
};
use crate::{BaseUrlRouter, GatewayConfig, GatewayError, GatewayResult, RetryPolicy};

/// Default page size for session listings.
pub const DEFAULT_SESSION_LIMIT: u32 = 50;

/// One logical request, replayable against any host.
#[derive(Debug, Clone)]
pub(crate) struct ApiCall {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<serde_json::Value>,
}

impl ApiCall {
    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn post<B: Serialize>(path: impl Into<String>, body: &B) -> GatewayResult<Self> {
        Ok(Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    pub(crate) fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

/// Client for the quiz backend.
///
/// Each request is tried against the active host with exponential backoff
/// on transient failures. When those attempts are used up, every fallback
/// host other than the active one gets a single attempt. A working
/// fallback becomes the active host; if none works the active host is
/// reset to the configured default.
pub struct RemoteGateway {
    client: Client,
    router: BaseUrlRouter,
    fallback_hosts: Vec<String>,
    retry: RetryPolicy,
    auth_token: RwLock<Option<String>>,
}

impl RemoteGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            router: BaseUrlRouter::new(config.base_url),
            fallback_hosts: config.fallback_hosts,
            retry: config.retry,
            auth_token: RwLock::new(config.auth_token),
        })
    }

    pub fn router(&self) -> &BaseUrlRouter {
        &self.router
    }

    /// Active base URL.
    pub fn current_base_url(&self) -> String {
        self.router.current()
    }

    /// Set or clear the bearer token.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write() = token.filter(|t| !t.is_empty());
    }

    // ==========================================
    // Request pipeline
    // ==========================================

    pub(crate) async fn execute<T: DeserializeOwned>(&self, call: &ApiCall) -> GatewayResult<T> {
        let base = self.router.current();

        match self.send_with_retry(&base, call).await {
            Ok(value) => Ok(value),
            Err(e) if e.should_try_fallback() => self.send_to_fallbacks(&base, call, e).await,
            Err(e) => Err(e),
        }
    }

    async fn send_with_retry<T: DeserializeOwned>(&self, base: &str, call: &ApiCall) -> GatewayResult<T> {
        let mut attempt = 0;

        loop {
            match self.send_once(base, call).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        path = %call.path,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(
                            path = %call.path,
                            attempts = attempt + 1,
                            error = %e,
                            "Max retries exceeded"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn send_to_fallbacks<T: DeserializeOwned>(
        &self,
        original: &str,
        call: &ApiCall,
        original_error: GatewayError,
    ) -> GatewayResult<T> {
        warn!(path = %call.path, "All retries failed, trying fallback hosts");

        for host in self.fallback_hosts.iter().filter(|h| h.as_str() != original) {
            debug!(host = %host, path = %call.path, "Trying fallback host");
            match self.send_once(host, call).await {
                Ok(value) => {
                    info!(host = %host, "Fallback host succeeded");
                    self.router.set(host.clone());
                    return Ok(value);
                }
                Err(e) => {
                    warn!(host = %host, error = %e, "Fallback host failed");
                }
            }
        }

        self.router.reset();
        Err(original_error)
    }

    /// One attempt against one host.
    async fn send_once<T: DeserializeOwned>(&self, base: &str, call: &ApiCall) -> GatewayResult<T> {
        let url = format!("{}{}", base, call.path.trim_start_matches('/'));

        let mut request = self.client.request(call.method.clone(), &url);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        let token = self.auth_token.read().clone();
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        debug!(method = %call.method, url = %url, "Sending request");

        let response = request.send().await?;
        let status = response.status();

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Server {
                status: status.as_u16(),
                body,
            });
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Client {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        if !status.is_success() {
            return Err(GatewayError::Network(format!("unexpected HTTP {}", status)));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    // ==========================================
    // Endpoints outside the sync path
    // ==========================================

    /// Marathon/exam unlock flags and progress.
    pub async fn unlock_status(&self, device_id: &str) -> GatewayResult<UnlockStatusData> {
        let call = ApiCall::get(format!("api/stats/unlock-status/{}", encode_segment(device_id)));
        envelope_data(self.execute(&call).await?)
    }

    pub async fn exam_unlock_status(&self, device_id: &str, exam_number: i64) -> GatewayResult<ExamUnlockData> {
        let call = ApiCall::get(format!(
            "api/stats/exam-unlock/{}/{}",
            encode_segment(device_id),
            exam_number
        ));
        envelope_data(self.execute(&call).await?)
    }

    /// Report a finished exam. Returns the server's message.
    pub async fn unlock_exam(&self, request: &UnlockExamRequest) -> GatewayResult<String> {
        let call = ApiCall::post("api/stats/unlock-exam", request)?;
        let response: ApiResponse<String> = self.execute(&call).await?;
        if !response.success {
            return Err(GatewayError::Rejected(response.failure_reason()));
        }
        Ok(response.data.or(response.message).unwrap_or_default())
    }

    /// Recent sessions stored on the server, newest first.
    pub async fn sessions(&self, device_id: &str, limit: Option<u32>) -> GatewayResult<Vec<QuizSessionDto>> {
        let call = ApiCall::get(format!("api/sessions/{}", encode_segment(device_id)))
            .query("limit", limit.unwrap_or(DEFAULT_SESSION_LIMIT));
        let response: ApiResponse<Vec<QuizSessionDto>> = self.execute(&call).await?;
        if !response.success {
            return Err(GatewayError::Rejected(response.failure_reason()));
        }
        Ok(response.data.unwrap_or_default())
    }

    /// Store one session. Returns the server-side session ID.
    pub async fn save_session(&self, device_id: &str, session: &QuizSessionDto) -> GatewayResult<i64> {
        let call = ApiCall::post("api/sessions/save", session)?.query("deviceId", device_id);
        envelope_data(self.execute(&call).await?)
    }

    /// Push a full snapshot as a backup. Returns the backup ID.
    pub async fn create_backup(&self, snapshot: &SyncRequest) -> GatewayResult<String> {
        let call = ApiCall::post("api/backup/create", snapshot)?;
        envelope_data(self.execute(&call).await?)
    }

    pub async fn restore_backup(&self, device_id: &str) -> GatewayResult<SyncResponse> {
        let call = ApiCall::get(format!("api/backup/restore/{}", encode_segment(device_id)));
        self.execute(&call).await
    }
}

/// Unwrap `data` from a successful envelope.
pub(crate) fn envelope_data<T>(response: ApiResponse<T>) -> GatewayResult<T> {
    if !response.success {
        return Err(GatewayError::Rejected(response.failure_reason()));
    }
    match response.data {
        Some(data) => Ok(data),
        None => Err(GatewayError::Rejected(response.failure_reason())),
    }
}

pub(crate) fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

/// Pull `message` or `error` out of a JSON error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

impl std::fmt::Debug for RemoteGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGateway")
            .field("base_url", &self.router.current())
            .field("fallback_hosts", &self.fallback_hosts)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Tiny backoff for tests against local mock servers.
#[cfg(test)]
pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(4),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn gateway(base: &str, fallbacks: &[&str]) -> RemoteGateway {
        RemoteGateway::new(GatewayConfig {
            base_url: format!("{}/", base.trim_end_matches('/')),
            fallback_hosts: fallbacks
                .iter()
                .map(|h| format!("{}/", h.trim_end_matches('/')))
                .collect(),
            retry: fast_retry(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            auth_token: None,
        })
        .unwrap()
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"Device ID is required"}"#), "Device ID is required");
        assert_eq!(error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message("plain"), "plain");
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("abc-123"), "abc-123");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
    }

    #[test]
    fn test_envelope_data() {
        let ok = ApiResponse { success: true, data: Some(5i64), message: None, error: None };
        assert_eq!(envelope_data(ok).unwrap(), 5);

        let rejected: ApiResponse<i64> = ApiResponse {
            success: false,
            data: None,
            message: Some("Exam already unlocked".into()),
            error: None,
        };
        assert!(matches!(envelope_data(rejected), Err(GatewayError::Rejected(m)) if m == "Exam already unlocked"));
    }

    #[tokio::test]
    async fn test_server_error_retried_then_fallback_used() {
        let primary = MockServer::start_async().await;
        let fallback = MockServer::start_async().await;

        let failing = primary
            .mock_async(|when, then| {
                when.method(GET).path("/api/sessions/dev-1");
                then.status(503);
            })
            .await;
        let working = fallback
            .mock_async(|when, then| {
                when.method(GET).path("/api/sessions/dev-1").query_param("limit", "50");
                then.status(200)
                    .json_body(json!({"success": true, "data": []}));
            })
            .await;

        let gateway = gateway(&primary.base_url(), &[&primary.base_url(), &fallback.base_url()]);
        let sessions = gateway.sessions("dev-1", None).await.unwrap();

        assert!(sessions.is_empty());
        assert_eq!(failing.hits_async().await, 3);
        assert_eq!(working.hits_async().await, 1);
        assert_eq!(gateway.current_base_url(), format!("{}/", fallback.base_url()));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let primary = MockServer::start_async().await;
        let fallback = MockServer::start_async().await;

        let bad_request = primary
            .mock_async(|when, then| {
                when.method(POST).path("/api/stats/unlock-exam");
                then.status(409).json_body(json!({"message": "Exam already unlocked"}));
            })
            .await;
        let untouched = fallback
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200);
            })
            .await;

        let gateway = gateway(&primary.base_url(), &[&fallback.base_url()]);
        let request = UnlockExamRequest {
            device_id: "dev-1".into(),
            exam_number: 1,
            score: 75,
            passed: true,
        };
        let err = gateway.unlock_exam(&request).await.unwrap_err();

        match err {
            GatewayError::Client { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Exam already unlocked");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(bad_request.hits_async().await, 1);
        assert_eq!(untouched.hits_async().await, 0);
        assert!(gateway.router().is_default());
    }

    #[tokio::test]
    async fn test_total_failure_resets_to_default() {
        let a = MockServer::start_async().await;
        let b = MockServer::start_async().await;

        let a_down = a
            .mock_async(|when, then| {
                when.method(GET).path("/api/stats/unlock-status/dev-1");
                then.status(500);
            })
            .await;
        let b_up = b
            .mock_async(|when, then| {
                when.method(GET).path("/api/stats/unlock-status/dev-1");
                then.status(200).json_body(json!({
                    "success": true,
                    "data": {"marathonUnlocked": false, "examsUnlocked": true,
                             "currentProgress": 55, "required": 50, "remaining": 0}
                }));
            })
            .await;

        let gateway = gateway(&a.base_url(), &[&a.base_url(), &b.base_url()]);
        let status = gateway.unlock_status("dev-1").await.unwrap();
        assert!(status.exams_unlocked);
        assert_eq!(gateway.current_base_url(), format!("{}/", b.base_url()));

        b_up.delete_async().await;
        let b_down = b
            .mock_async(|when, then| {
                when.method(GET).path("/api/stats/unlock-status/dev-1");
                then.status(502);
            })
            .await;

        let err = gateway.unlock_status("dev-1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Server { status: 502, .. }));
        // B got three attempts as the active host, A one as a fallback.
        assert_eq!(b_down.hits_async().await, 3);
        assert_eq!(a_down.hits_async().await, 4);
        assert!(gateway.router().is_default());
    }

    #[tokio::test]
    async fn test_unreachable_host_falls_back() {
        let fallback = MockServer::start_async().await;
        let working = fallback
            .mock_async(|when, then| {
                when.method(POST).path("/api/backup/create");
                then.status(200).json_body(json!({"success": true, "data": "backup-7"}));
            })
            .await;

        // Nothing listens on port 9.
        let gateway = gateway("http://127.0.0.1:9", &[&fallback.base_url()]);
        let snapshot = SyncRequest {
            device_id: "dev-1".into(),
            user_stats: None,
            quiz_sessions: None,
            last_sync: 0,
        };

        assert_eq!(gateway.create_backup(&snapshot).await.unwrap(), "backup-7");
        assert_eq!(working.hits_async().await, 1);
        assert_eq!(gateway.current_base_url(), format!("{}/", fallback.base_url()));
    }

    #[tokio::test]
    async fn test_bearer_token_and_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/sessions/save")
                    .query_param("deviceId", "dev-1")
                    .header("Authorization", "Bearer secret");
                then.status(200).json_body(json!({"success": true, "data": 42}));
            })
            .await;

        let gateway = gateway(&server.base_url(), &[]);
        gateway.set_auth_token(Some("secret".into()));

        let session = QuizSessionDto {
            session_id: None,
            total_questions: 10,
            correct_answers: 8,
            wrong_answers: 2,
            percentage: 80.0,
            completed_at: None,
            is_completed: true,
        };
        assert_eq!(gateway.save_session("dev-1", &session).await.unwrap(), 42);
        mock.assert_async().await;
    }
}
