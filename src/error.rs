use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount {0}: must be a positive, finite number")]
    InvalidAmount(f64),

    #[error("Invalid time-of-day '{0}': expected zero-padded 24-hour HH:MM")]
    InvalidTime(String),

    #[error("Invalid due day {0}: must be between 1 and 31")]
    InvalidDueDay(u32),

    #[error("Validation failed for {record}: {details}")]
    ValidationError { record: String, details: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
