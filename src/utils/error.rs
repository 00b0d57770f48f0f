use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("Marketplace request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Search failed for candidate '{query}': {source}")]
    SearchFailed {
        query: String,
        #[source]
        source: Box<RecommendError>,
    },

    #[error("Marketplace returned HTTP {status} for {endpoint}")]
    HttpStatusError { status: u16, endpoint: String },

    #[error("Failed to decode marketplace response: {message}")]
    DecodeError { message: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    TimeoutError { operation: String, timeout_ms: u64 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Marketplace,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl RecommendError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RecommendError::ApiError(_) | RecommendError::TimeoutError { .. } => {
                ErrorCategory::Network
            }
            RecommendError::HttpStatusError { .. } | RecommendError::DecodeError { .. } => {
                ErrorCategory::Marketplace
            }
            // 搜尋失敗依照底層原因分類
            RecommendError::SearchFailed { source, .. } => source.category(),
            RecommendError::ConfigError { .. }
            | RecommendError::ConfigValidationError { .. }
            | RecommendError::InvalidConfigValueError { .. }
            | RecommendError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RecommendError::SerializationError(_) => ErrorCategory::Data,
            RecommendError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Marketplace => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RecommendError::HttpStatusError { status, .. } if *status == 401 || *status == 403 => {
                "Check the marketplace auth headers in the [marketplace.headers] section"
            }
            RecommendError::HttpStatusError { status, .. } if *status == 429 => {
                "The marketplace is rate limiting requests; wait a moment before searching again"
            }
            RecommendError::SearchFailed { source, .. } => source.recovery_suggestion(),
            _ => match self.category() {
                ErrorCategory::Network => {
                    "Check network connectivity and the configured marketplace endpoints"
                }
                ErrorCategory::Marketplace => {
                    "The marketplace API may have changed or be degraded; try again later"
                }
                ErrorCategory::Configuration => {
                    "Review the configuration file and command line arguments"
                }
                ErrorCategory::Data => "Check that the input JSON is well formed",
                ErrorCategory::System => "Check file permissions and available disk space",
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RecommendError::SearchFailed { query, .. } => {
                format!("Could not search the marketplace for '{}'", query)
            }
            RecommendError::TimeoutError { operation, .. } => {
                format!("The marketplace did not answer in time ({})", operation)
            }
            RecommendError::MissingConfigError { field } => {
                format!("Missing required setting: {}", field)
            }
            RecommendError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}
