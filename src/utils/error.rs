use thiserror::Error;

#[derive(Error, Debug)]
pub enum PppError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Decimal conversion error: {0}")]
    DecimalError(#[from] rust_decimal::Error),

    #[error("File not found at: {path}")]
    FileNotFound { path: String },

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

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Import failed: {message}")]
    ImportError { message: String },

    #[error("Geo-IP lookup failed: {message}")]
    GeoIpError { message: String },

    #[error("Proxy classification failed: {message}")]
    ProxyCheckError { message: String },

    #[error("Unknown pricing plan: {plan}")]
    UnknownPlan { plan: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Storage,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PppError::ApiError(_) | PppError::GeoIpError { .. } | PppError::ProxyCheckError { .. } => {
                ErrorCategory::Network
            }
            PppError::CsvError(_)
            | PppError::SerializationError(_)
            | PppError::DecimalError(_)
            | PppError::ValidationError { .. } => ErrorCategory::Data,
            PppError::DatabaseError(_) | PppError::ImportError { .. } => ErrorCategory::Storage,
            PppError::ConfigError { .. }
            | PppError::ConfigValidationError { .. }
            | PppError::InvalidConfigValueError { .. }
            | PppError::MissingConfigError { .. }
            | PppError::UnknownPlan { .. } => ErrorCategory::Configuration,
            PppError::IoError(_) | PppError::FileNotFound { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 定價路徑上的軟性失敗，呼叫端會走預設值
            PppError::GeoIpError { .. } | PppError::ProxyCheckError { .. } => ErrorSeverity::Low,
            PppError::ApiError(_) => ErrorSeverity::Medium,
            PppError::CsvError(_)
            | PppError::SerializationError(_)
            | PppError::DecimalError(_)
            | PppError::ValidationError { .. }
            | PppError::ImportError { .. }
            | PppError::FileNotFound { .. }
            | PppError::ConfigError { .. }
            | PppError::ConfigValidationError { .. }
            | PppError::InvalidConfigValueError { .. }
            | PppError::MissingConfigError { .. }
            | PppError::UnknownPlan { .. } => ErrorSeverity::High,
            PppError::DatabaseError(_) | PppError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            PppError::FileNotFound { path } => format!(
                "Place the PPP CSV at {} or pass --csv with the correct location",
                path
            ),
            PppError::DatabaseError(_) => {
                "Check that the database path is writable; the previous dataset was left untouched"
                    .to_string()
            }
            PppError::ImportError { .. } | PppError::ValidationError { .. } => {
                "Fix the offending rows in the CSV and re-run the import".to_string()
            }
            PppError::ConfigError { .. }
            | PppError::ConfigValidationError { .. }
            | PppError::InvalidConfigValueError { .. }
            | PppError::MissingConfigError { .. } => {
                "Review the TOML configuration file and any ${VAR} environment variables".to_string()
            }
            PppError::UnknownPlan { .. } => {
                "Use one of the plan names declared under [plans] in the configuration".to_string()
            }
            PppError::ApiError(_) | PppError::GeoIpError { .. } | PppError::ProxyCheckError { .. } => {
                "Check network connectivity and the configured endpoint".to_string()
            }
            PppError::CsvError(_) | PppError::DecimalError(_) | PppError::SerializationError(_) => {
                "Verify the input data format".to_string()
            }
            PppError::IoError(_) => "Check file permissions and available disk space".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Data => format!("Invalid data: {}", self),
            ErrorCategory::Storage => format!("Could not save the PPP dataset: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PppError>;
