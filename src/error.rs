use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Malformed value stored under {key:?}: {source}")]
    MalformedValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown key category: {0}")]
    UnknownCategory(String),

    #[error("Value for {id:?} is a {actual} entry, expected {expected}")]
    CategoryMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Query failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<SessionError>,
    },
}

impl From<figment::Error> for SessionError {
    fn from(e: figment::Error) -> Self {
        SessionError::Config(e.to_string())
    }
}

impl SessionError {
    /// True when the error came out of the retry loop rather than from
    /// validation or decoding.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, SessionError::RetriesExhausted { .. })
    }
}
