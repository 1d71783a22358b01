use thiserror::Error;

/// Application-wide error types.
///
/// Every fallible operation in the harvester returns this enum. Most of the
/// walker's failures never reach the caller: they are caught at the parent
/// node's iteration and recorded in the harvest task log instead.
///
/// # Error Conversion
///
/// Library errors convert automatically through `#[from]`:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `std::io::Error` → `AppError::Io`
///
/// # Examples
///
/// ```
/// use tellus_core::error::AppError;
///
/// let err = AppError::HttpStatus {
///     status: 404,
///     url: "https://example.com/data.csv".to_string(),
/// };
/// assert!(err.is_fetch_error());
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed before a response was received.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// Remote host answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Local file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A locator could not be interpreted as a path or an http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A metadata node lacks a key it is identified by.
    #[error("{entity} is missing required field '{field}'")]
    MissingField { entity: String, field: &'static str },

    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns true for failures raised while retrieving a payload or a
    /// catalog document (non-success status, network, timeout, local IO).
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            AppError::ClientError(_)
                | AppError::HttpStatus { .. }
                | AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::Io(_)
        )
    }

    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::HttpStatus { status, url } => {
                format!(
                    "The server answered HTTP {} for {}\n   The file may have moved or the host may be down.",
                    status, url
                )
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The host may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your configuration file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }
}
