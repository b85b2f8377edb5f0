use thiserror::Error;

/// PostgreSQL unique_violation, surfaced verbatim by the remote store.
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL foreign_key_violation, e.g. a like for a post that does not exist.
pub const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgREST "expected one row" error.
pub const PGRST_NO_ROWS: &str = "PGRST116";

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Ambiguous result: {0}")]
    Ambiguous(String),

    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store rejected request ({status}, code {code:?}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BlogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlogError::NotFound(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, BlogError::Duplicate(_))
    }

    /// Anything that is not a not-found or duplicate condition.
    pub fn is_store_error(&self) -> bool {
        !self.is_not_found() && !self.is_duplicate()
    }

    /// Classify an error body returned by the remote store.
    pub fn from_remote(status: u16, code: Option<String>, message: String) -> Self {
        match code.as_deref() {
            Some(PG_UNIQUE_VIOLATION) => BlogError::Duplicate(message),
            Some(PGRST_NO_ROWS) | Some(PG_FOREIGN_KEY_VIOLATION) => BlogError::NotFound(message),
            _ => BlogError::Rejected {
                status,
                code,
                message,
            },
        }
    }
}

pub type BlogResult<T> = Result<T, BlogError>;
