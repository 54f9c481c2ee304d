use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaidanError>;

#[derive(Error, Debug)]
pub enum CaidanError {
    #[error("Role lookup failed: {0}")]
    RoleLookupFailed(String),

    #[error("Not allowed to open '{destination}', redirected to {redirected_to}")]
    UnauthorizedNavigation {
        destination: String,
        redirected_to: String,
    },

    #[error("Resolution superseded by a newer session event")]
    StaleResolution,

    #[error("Could not persist session: {0}")]
    Persistence(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialog error: {0}")]
    Dialog(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaidanError {
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::RoleLookupFailed(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn dialog(msg: impl Into<String>) -> Self {
        Self::Dialog(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the user can fix this by trying the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RoleLookupFailed(_) | Self::Persistence(_) | Self::Http(_)
        )
    }
}

impl From<reqwest::Error> for CaidanError {
    fn from(err: reqwest::Error) -> Self {
        CaidanError::Http(err.to_string())
    }
}
