use thiserror::Error;

/// Errors from talking to the dashboard server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("status stream error: {0}")]
    Stream(String),

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from starting or finishing an audio capture.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("audio capture unavailable: {0}")]
    Unavailable(String),

    #[error("audio capture failed: {0}")]
    Capture(String),
}
