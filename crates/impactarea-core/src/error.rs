//! Error types for impacted area identification

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImpactError {
    // Session errors
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("Not Authorized")]
    NotAuthorized,

    // Data errors
    #[error("Data unavailable: {reason}")]
    DataUnavailable { reason: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("No matching vegetation index found for name {name}")]
    UnknownIndex { name: String },

    #[error("{index} cannot be computed from spectral bands")]
    UnsupportedIndex { index: String },

    #[error("Array shape mismatch: expected {expected:?}, found {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    // Storage errors
    #[error("Error while uploading folder to {provider}: {reason}")]
    Storage { provider: String, reason: String },

    #[error("Missing {provider} credentials")]
    MissingCredentials { provider: String },

    // Remote service errors
    #[error("{service} request failed: {reason}")]
    Upstream { service: String, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ImpactError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData { reason: reason.into() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::DataUnavailable { reason: reason.into() }
    }

    pub fn upstream(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ImpactError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImpactError>;
