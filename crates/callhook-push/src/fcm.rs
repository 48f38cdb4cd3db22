//! FCM HTTP v1 transport: `POST /v1/projects/{project}/messages:send`.

use async_trait::async_trait;
use callhook_core::auth::TokenSource;
use callhook_core::config::PushConfig;
use callhook_core::error::{CallhookError, Result};
use callhook_core::message::PushMessage;
use callhook_core::traits::PushTransport;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Firebase Cloud Messaging sender.
pub struct FcmTransport {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    tokens: Arc<TokenSource>,
    timeout: std::time::Duration,
    validate_only: bool,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

impl FcmTransport {
    pub fn new(project_id: &str, config: &PushConfig, tokens: Arc<TokenSource>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            tokens,
            timeout: std::time::Duration::from_secs(config.timeout_secs),
            validate_only: config.validate_only,
        }
    }

    fn send_url(&self) -> String {
        format!("{}/v1/projects/{}/messages:send", self.endpoint, self.project_id)
    }

    fn request_body(&self, message: &PushMessage) -> Value {
        let mut body = serde_json::json!({ "message": message });
        if self.validate_only {
            body["validate_only"] = Value::Bool(true);
        }
        body
    }
}

/// Summarize an FCM error body: `STATUS (ERROR_CODE): message`.
fn describe_error(body: &str) -> String {
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let err = &v["error"];
    let message = err["message"].as_str().unwrap_or("unknown error");
    let status = err["status"].as_str().unwrap_or("UNKNOWN");
    let fcm_code = err["details"]
        .as_array()
        .into_iter()
        .flatten()
        .find_map(|d| d["errorCode"].as_str());
    match fcm_code {
        Some(code) => format!("{status} ({code}): {message}"),
        None => format!("{status}: {message}"),
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    fn name(&self) -> &str {
        "fcm"
    }

    async fn send(&self, message: &PushMessage) -> Result<String> {
        let req = self
            .client
            .post(self.send_url())
            .json(&self.request_body(message))
            .timeout(self.timeout);
        let resp = self
            .tokens
            .authorize(req)
            .await?
            .send()
            .await
            .map_err(|e| CallhookError::Push(format!("FCM send failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            let body: SendResponse = resp
                .json()
                .await
                .map_err(|e| CallhookError::Push(format!("Invalid FCM response: {e}")))?;
            Ok(body.name)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(CallhookError::Push(format!("FCM API error {status}: {}", describe_error(&body))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use callhook_core::message::PushNotification;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Path, bearer header and body of each request the local server received.
    type SeenLog = Arc<Mutex<Vec<(String, Option<String>, String)>>>;

    /// Answer every request with `status` and `body` on an ephemeral local port.
    async fn serve_stub(status: StatusCode, body: &'static str) -> (String, SeenLog) {
        let log: SeenLog = Arc::new(Mutex::new(Vec::new()));
        let seen = log.clone();
        let app = axum::Router::new().fallback(move |uri: Uri, headers: HeaderMap, req_body: String| {
            let seen = seen.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                seen.lock().unwrap().push((uri.path().to_string(), auth, req_body));
                (status, body)
            }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), log)
    }

    fn transport_at(endpoint: &str, tokens: TokenSource) -> FcmTransport {
        let config = PushConfig {
            endpoint: endpoint.to_string(),
            ..PushConfig::default()
        };
        FcmTransport::new("demo", &config, Arc::new(tokens))
    }

    fn transport(validate_only: bool) -> FcmTransport {
        let config = PushConfig {
            endpoint: "https://fcm.example.test/".into(),
            validate_only,
            ..PushConfig::default()
        };
        FcmTransport::new("demo", &config, Arc::new(TokenSource::Anonymous))
    }

    fn message() -> PushMessage {
        PushMessage {
            token: "tok123".into(),
            notification: PushNotification {
                title: "Incoming Call".into(),
                body: "Alice is calling...".into(),
            },
            data: BTreeMap::new(),
            android: None,
            apns: None,
        }
    }

    #[test]
    fn test_send_url() {
        assert_eq!(
            transport(false).send_url(),
            "https://fcm.example.test/v1/projects/demo/messages:send"
        );
    }

    #[test]
    fn test_request_body() {
        let body = transport(false).request_body(&message());
        assert_eq!(body["message"]["token"], "tok123");
        assert!(body.get("validate_only").is_none());

        let body = transport(true).request_body(&message());
        assert_eq!(body["validate_only"], true);
    }

    #[test]
    fn test_describe_error() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND",
            "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#;
        assert_eq!(describe_error(body), "NOT_FOUND (UNREGISTERED): Requested entity was not found.");
        assert_eq!(describe_error("bad gateway"), "bad gateway");
    }

    #[tokio::test]
    async fn test_send_returns_message_name() {
        let (endpoint, log) =
            serve_stub(StatusCode::OK, r#"{"name":"projects/demo/messages/0:1700000000000000%abc"}"#).await;
        let transport = transport_at(&endpoint, TokenSource::Static("ya29.test".into()));

        let id = transport.send(&message()).await.unwrap();
        assert_eq!(id, "projects/demo/messages/0:1700000000000000%abc");

        let requests = log.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        let (path, auth, body) = &requests[0];
        assert_eq!(path, "/v1/projects/demo/messages:send");
        assert_eq!(auth.as_deref(), Some("Bearer ya29.test"));
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["message"]["token"], "tok123");
        assert_eq!(body["message"]["notification"]["body"], "Alice is calling...");
    }

    #[tokio::test]
    async fn test_send_error_is_decoded() {
        let (endpoint, _log) = serve_stub(
            StatusCode::NOT_FOUND,
            r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND",
                "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#,
        )
        .await;
        let transport = transport_at(&endpoint, TokenSource::Anonymous);

        let err = transport.send(&message()).await.unwrap_err();
        match err {
            CallhookError::Push(msg) => {
                assert!(msg.contains("404"));
                assert!(msg.contains("NOT_FOUND (UNREGISTERED): Requested entity was not found."));
            }
            other => panic!("expected a push error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_garbled_success_is_an_error() {
        let (endpoint, _log) = serve_stub(StatusCode::OK, "not json").await;
        let transport = transport_at(&endpoint, TokenSource::Anonymous);

        let err = transport.send(&message()).await.unwrap_err();
        assert!(matches!(err, CallhookError::Push(ref m) if m.contains("Invalid FCM response")));
    }
}
