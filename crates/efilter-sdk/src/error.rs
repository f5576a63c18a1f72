//! SDK error types

use efilter_core::FilterError;
use efilter_repository::RepositoryError;
use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Rejected filter request (configuration, validation or conflict)
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Persistence error
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A required collaborator was not provided to the builder
    #[error("Engine not initialized: missing {0}")]
    NotInitialized(&'static str),
}

impl SdkError {
    /// The filter error behind this failure, if any
    pub fn filter_error(&self) -> Option<&FilterError> {
        match self {
            SdkError::Filter(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_config(&self) -> bool {
        self.filter_error().map_or(false, FilterError::is_config)
    }

    pub fn is_validation(&self) -> bool {
        self.filter_error().map_or(false, FilterError::is_validation)
    }

    pub fn is_conflict(&self) -> bool {
        self.filter_error().map_or(false, FilterError::is_conflict)
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
