/// Domain-specific error types for the pricing and simulation engine.
///
/// Every constraint violation surfaces as `InvalidParameter`, raised once by
/// the component that owns the invariant. Numerical limits (T -> 0, sigma -> 0)
/// are handled inside the engines and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid parameter {field}={value}: {constraint}")]
    InvalidParameter {
        field: &'static str,
        value: String,
        constraint: &'static str,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("worker task failed: {0}")]
    Worker(String),
}

impl EngineError {
    #[inline]
    pub fn invalid(field: &'static str, value: impl std::fmt::Display, constraint: &'static str) -> Self {
        EngineError::InvalidParameter {
            field,
            value: value.to_string(),
            constraint,
        }
    }

    /// The offending field, when this is a parameter error.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            EngineError::InvalidParameter { field, .. } => Some(*field),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Worker(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject anything that is not a finite, strictly positive number.
#[inline]
pub fn ensure_positive(field: &'static str, value: f64) -> EngineResult<()> {
    if !value.is_finite() {
        return Err(EngineError::invalid(field, value, "must be finite"));
    }
    if value <= 0.0 {
        return Err(EngineError::invalid(field, value, "must be > 0"));
    }
    Ok(())
}

#[inline]
pub fn ensure_finite(field: &'static str, value: f64) -> EngineResult<()> {
    if !value.is_finite() {
        return Err(EngineError::invalid(field, value, "must be finite"));
    }
    Ok(())
}
