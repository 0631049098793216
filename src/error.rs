use thiserror::Error;

/// Why the secondary source could not be used. Never leaves the adapter:
/// every variant is logged and collapsed to "no secondary data".
#[derive(Debug, Error)]
pub enum SecondaryError {
    #[error("no session credential in cookie")]
    MissingCredential,

    #[error("network error: {0}")]
    Network(String),

    #[error("status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for SecondaryError {
    fn from(err: reqwest::Error) -> Self {
        SecondaryError::Network(err.to_string())
    }
}

/// Failures from the message/scoring collaborator. These are shown to the
/// user as-is.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Malformed score response: {0}")]
    MalformedScore(String),

    #[error("No collaborator endpoint configured")]
    NotConfigured,
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        CollaboratorError::Network(err.to_string())
    }
}

/// Two-tier configuration store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("value for {key} is {size} bytes, over the {limit} byte limit")]
    ValueTooLarge { key: String, size: usize, limit: usize },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
