use thiserror::Error;

/// Failure of a call to the Drive Copilot API, or of the local checks in front of it.
///
/// Cloneable so one failed fetch can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Not authenticated with Google Drive")]
    NotAuthenticated,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// The request never left the client
    pub fn is_local(&self) -> bool {
        matches!(self, ApiError::NotAuthenticated | ApiError::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                detail: err.to_string(),
            }
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Why a chat submission was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Message is empty")]
    Empty,

    #[error("Still waiting for the previous answer")]
    Pending,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
