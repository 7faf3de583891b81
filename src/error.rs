use thiserror::Error;

/// Failure of a backend AI pipeline call.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("{endpoint} returned HTTP {status}: {detail}")]
    Status {
        endpoint: String,
        status: u16,
        detail: String,
    },
    #[error("{endpoint} reported failure: {detail}")]
    Rejected { endpoint: String, detail: String },
    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RemoteError {
    pub fn endpoint(&self) -> &str {
        match self {
            RemoteError::Transport { endpoint, .. }
            | RemoteError::Timeout { endpoint }
            | RemoteError::Status { endpoint, .. }
            | RemoteError::Rejected { endpoint, .. }
            | RemoteError::Decode { endpoint, .. } => endpoint,
        }
    }
}
