use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Failed to fetch {source_name}: {message}")]
    UpstreamFetch {
        source_name: String,
        message: String,
    },

    #[error("Invalid analytics configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid match threshold {0}: must be between 0.0 and 1.0")]
    InvalidThreshold(f64),

    #[error("Invalid {field} value '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Malformed {table} row #{row}: {details}")]
    MalformedRow {
        table: String,
        row: usize,
        details: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AnalyticsError {
    pub fn upstream(source_name: &str, message: impl Into<String>) -> Self {
        Self::UpstreamFetch {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
