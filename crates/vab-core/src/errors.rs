use std::fmt;

/// HTTP verb of a failed upstream request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can treat every failure uniformly at the cycle boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Upstream rejected the login (or kept rejecting the token after a re-login).
    #[error("auth error: {0}")]
    Auth(String),

    #[error("error performing a {method} request to {endpoint}: {reason}")]
    Request {
        method: HttpMethod,
        endpoint: String,
        reason: String,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    /// Malformed user input; recovered locally by re-prompting.
    #[error("{0}")]
    Validation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn request(method: HttpMethod, endpoint: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Request {
            method,
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
