//! HTTP client for the AI pipeline endpoints.
//!
//! Every pipeline answers with `{"success": true, "data": {...}}`. Anything else (a
//! `success: false` envelope, a non-2xx status carrying FastAPI's `{"detail": ...}`, a timeout)
//! is reported as a [`RemoteError`].

use crate::error::RemoteError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("wfm-dash/{}", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `body` to `path` and unwrap the success envelope into `Resp`.
    pub async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RemoteError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        tracing::debug!(endpoint = path, "posting pipeline request");
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(|e| transport_error(path, e))?;
        decode_envelope(path, status, &bytes)
    }
}

fn transport_error(endpoint: &str, source: reqwest::Error) -> RemoteError {
    if source.is_timeout() {
        RemoteError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        RemoteError::Transport {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

/// Interpret a pipeline response body.
pub(crate) fn decode_envelope<Resp: DeserializeOwned>(
    endpoint: &str,
    status: u16,
    body: &[u8],
) -> Result<Resp, RemoteError> {
    if !(200..300).contains(&status) {
        let detail = serde_json::from_slice::<Envelope>(body)
            .ok()
            .and_then(|e| e.detail.or(e.error))
            .unwrap_or_else(|| truncate(&String::from_utf8_lossy(body), 200));
        return Err(RemoteError::Status {
            endpoint: endpoint.to_string(),
            status,
            detail,
        });
    }

    let envelope: Envelope = serde_json::from_slice(body).map_err(|source| RemoteError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })?;
    if !envelope.success {
        return Err(RemoteError::Rejected {
            endpoint: endpoint.to_string(),
            detail: envelope
                .error
                .or(envelope.detail)
                .unwrap_or_else(|| "pipeline reported failure".to_string()),
        });
    }
    let data = envelope.data.ok_or_else(|| RemoteError::Rejected {
        endpoint: endpoint.to_string(),
        detail: "response carried no data".to_string(),
    })?;
    serde_json::from_value(data).map_err(|source| RemoteError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[derive(Debug, Deserialize)]
    struct Payload {
        total_shifts: u32,
    }

    #[test]
    fn success_envelope_yields_data() {
        let body = br#"{"success": true, "data": {"total_shifts": 42}}"#;
        let p: Payload = decode_envelope("/api/x", 200, body).unwrap();
        assert_eq!(p.total_shifts, 42);
    }

    #[test]
    fn failure_envelope_is_rejected() {
        let body = br#"{"success": false, "error": "agents timed out"}"#;
        let err = decode_envelope::<Value>("/api/x", 200, body).unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { ref detail, .. } if detail == "agents timed out"));
    }

    #[test]
    fn missing_data_is_rejected() {
        let err = decode_envelope::<Value>("/api/x", 200, br#"{"success": true}"#).unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { .. }));
    }

    #[test]
    fn http_error_uses_fastapi_detail() {
        let body = br#"{"detail": "Employee not found"}"#;
        let err = decode_envelope::<Value>("/api/agents/create-learning-path", 404, body).unwrap_err();
        match err {
            RemoteError::Status { status, detail, .. } => {
                assert_eq!(status, 404);
                assert_eq!(detail, "Employee not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_error_with_plain_body_is_truncated() {
        let body = "x".repeat(500);
        let err = decode_envelope::<Value>("/api/x", 502, body.as_bytes()).unwrap_err();
        let RemoteError::Status { detail, .. } = err else {
            panic!("expected status error");
        };
        assert_eq!(detail.chars().count(), 201);
    }

    #[test]
    fn shape_mismatch_is_a_decode_error() {
        let body = br#"{"success": true, "data": {"total_shifts": "many"}}"#;
        let err = decode_envelope::<Payload>("/api/x", 200, body).unwrap_err();
        assert!(matches!(err, RemoteError::Decode { .. }));
        assert_eq!(err.endpoint(), "/api/x");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BackendClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url("/api/agents/analyze-retention"),
            "http://localhost:8000/api/agents/analyze-retention"
        );
    }
}
