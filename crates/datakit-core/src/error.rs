use thiserror::Error;

/// Unified error type for collections, data sources and decorators
///
/// Errors are `Clone` so that a single failure can be observed by every
/// consumer of a shared computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// Collection, action, chart or data source not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid customization or decorator setup
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Projection references paths that cannot be resolved
    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    /// Filter or condition tree cannot be evaluated
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Aggregation cannot be evaluated
    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),

    /// Operation not supported by this collection
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    /// A computed field evaluator failed or misbehaved
    #[error("Computation failed: {0}")]
    Computation(String),

    /// Connection to a backend failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Generic backend error
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DataError {
    /// Create a "not found" error with custom message
    pub fn not_found(msg: impl Into<String>) -> Self {
        DataError::NotFound(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DataError::InvalidConfiguration(msg.into())
    }

    /// Create an invalid projection error
    pub fn invalid_projection(msg: impl Into<String>) -> Self {
        DataError::InvalidProjection(msg.into())
    }

    /// Create an operation not supported error
    pub fn operation_not_supported(msg: impl Into<String>) -> Self {
        DataError::OperationNotSupported(msg.into())
    }

    /// Create a computation error
    pub fn computation(msg: impl Into<String>) -> Self {
        DataError::Computation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DataError::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
