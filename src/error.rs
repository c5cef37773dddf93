use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpenseAnalyticsError {
    #[error("Invalid thresholds: healthy_max {healthy_max} must satisfy 0 <= healthy_max < critical_min ({critical_min})")]
    InvalidThresholds { healthy_max: f64, critical_min: f64 },

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExpenseAnalyticsError>;
