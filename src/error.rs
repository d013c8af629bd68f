use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("You need to sign in to do that")]
    AuthRequired,

    #[error("News service unavailable: {0}")]
    Upstream(String),

    #[error("Social store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the failure came from the signed-out guard rather than I/O.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, AppError::AuthRequired)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
