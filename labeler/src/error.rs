use derive_more::derive::Display;
use reqwest::StatusCode;

pub type AppResult<T> = Result<T, AppError>;

/// Failure classes of a call to an AI provider.
///
/// The retry policy decides per variant whether a request is repeated,
/// reshaped or abandoned, so keep the mapping from HTTP status codes here.
#[derive(Debug, Display)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    RequestTimeout,
    TooManyRequests,
    Transport(String),
    #[display("Upstream({_0}, {_1})")]
    Upstream(u16, String),
    MalformedResponse(String),
    Internal(anyhow::Error),
}

impl std::error::Error for AppError {}

impl AppError {
    /// Map a non-success HTTP status and its body to an error class.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::BadRequest(body),
            StatusCode::NOT_FOUND => AppError::NotFound(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(body),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AppError::RequestTimeout,
            StatusCode::TOO_MANY_REQUESTS => AppError::TooManyRequests,
            s => AppError::Upstream(s.as_u16(), body),
        }
    }

    /// Transport, timeout, rate limit, server side and envelope failures may
    /// succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::RequestTimeout
            | AppError::TooManyRequests
            | AppError::Transport(_)
            | AppError::MalformedResponse(_) => true,
            AppError::Upstream(code, _) => *code >= 500,
            AppError::BadRequest(_)
            | AppError::NotFound(_)
            | AppError::Unauthorized(_)
            | AppError::Internal(_) => false,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        tracing::debug!("Reqwest error: {:?}", error);
        if error.is_timeout() {
            return AppError::RequestTimeout;
        }
        match error.status() {
            Some(status) => AppError::from_status(status, error.to_string()),
            None if error.is_decode() => AppError::MalformedResponse(error.to_string()),
            None => AppError::Transport(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::MalformedResponse(error.to_string())
    }
}
