use thiserror::Error;

/// Pre-network validation failures. Shown immediately; never reach the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported file format: .{0} (only PDF files are accepted)")]
    UnsupportedFormat(String),
    #[error("file too large: {size} bytes (limit is {limit})")]
    FileTooLarge { size: u64, limit: u64 },
}

/// Failures talking to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network-level failure (DNS, connect, timeout). Retried during
    /// polling; terminal for submit and chat sends.
    #[error("request failed: {0}")]
    Transport(String),
    /// Non-2xx with a structured body. The message is the service's own
    /// `error`/`message`/`detail` field when present.
    #[error("{message}")]
    Service { status: u16, message: String },
    /// 2xx with a body we could not decode.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Chat-history persistence failures. Never user-visible: the tiered store
/// degrades to the local cache instead.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt history payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<ApiError> for HistoryError {
    fn from(e: ApiError) -> Self {
        Self::Store(e.to_string())
    }
}
