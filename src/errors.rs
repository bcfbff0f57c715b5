use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("{context}: {message}")]
    QueryFailed { context: String, message: String },

    #[error("External process '{program}' failed with status {status}")]
    ExternalProcessFailed { program: String, status: i32 },

    #[error("Unable to stage temporary credential file: {0}")]
    CredentialStagingFailed(String),

    #[error("Ambiguous value: {0}")]
    ParseAmbiguous(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl AppError {
    /// Wraps a statement failure with the operation that issued it.
    pub fn query(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AppError::QueryFailed {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
