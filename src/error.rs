use thiserror::Error;

/// Errors surfaced by the authorization flow, the token cache and the service clients
#[derive(Error, Debug)]
pub enum ClientError {
    /// No cached credential for the requested key. Informational only: the store
    /// reports a miss as `None`, callers that need an error value use this.
    #[error("No cached credential found")]
    CacheMiss,

    #[error("Authorization failed: {0}")]
    AuthError(String),

    #[error("Authorization rejected by server: {0}")]
    AuthRejected(String),

    #[error("Failed to persist credential: {0}")]
    PersistError(String),

    #[error("Request failed: {0}")]
    TransportError(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::TransportError(e.to_string())
    }
}

impl ClientError {
    /// Token exchange or refresh failed, whether on the wire or by server rejection
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::AuthError(_) | ClientError::AuthRejected(_))
    }

    /// Check if this is a client error (4xx) returned by the API
    pub fn is_client_error(&self) -> bool {
        match self {
            ClientError::ApiError { status, .. } => *status >= 400 && *status < 500,
            _ => false,
        }
    }
}
