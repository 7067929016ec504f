use serde::{Deserialize, Serialize};

/// Errors returned by gateway calls, filters and chat orchestration.
///
/// The wrapping variants (`InstallFailed`, `JoinFailed`, `LeaveFailed`) keep the
/// underlying gateway error as `source` so callers can still inspect the remote code.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ShhError {
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("timeout: {operation}")]
    Timeout { operation: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("runtime error: {message}")]
    Runtime { message: String },

    #[error("filter install failed: {source}")]
    InstallFailed { source: Box<ShhError> },

    #[error("public chat join failed: {source}")]
    JoinFailed { source: Box<ShhError> },

    #[error("public chat leave failed: {source}")]
    LeaveFailed { source: Box<ShhError> },

    #[error("filter is stopped")]
    Stopped,
}

impl ShhError {
    /// Returns `true` for transient errors that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::InstallFailed { source }
            | Self::JoinFailed { source }
            | Self::LeaveFailed { source } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn install_failed(source: ShhError) -> Self {
        Self::InstallFailed { source: Box::new(source) }
    }

    pub fn join_failed(source: ShhError) -> Self {
        Self::JoinFailed { source: Box::new(source) }
    }

    pub fn leave_failed(source: ShhError) -> Self {
        Self::LeaveFailed { source: Box::new(source) }
    }

    /// Innermost error, skipping the install/join/leave wrappers.
    pub fn root_cause(&self) -> &ShhError {
        match self {
            Self::InstallFailed { source }
            | Self::JoinFailed { source }
            | Self::LeaveFailed { source } => source.root_cause(),
            other => other,
        }
    }
}
