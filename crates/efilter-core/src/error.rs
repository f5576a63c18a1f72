//! Error taxonomy for the filter engine
//!
//! Every failure is a rejected request: prior persisted state stays valid.

use thiserror::Error;

/// Filter engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A referenced field, custom field, relation type, property type or
    /// sub-filter is absent or incompatible with the target entity type.
    #[error("Configuration error on '{subject}': {message}")]
    Config { subject: String, message: String },

    /// Operator/value mismatch, empty condition list, ownership rule
    /// violation or sub-filter cycle.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        elements: Vec<String>,
    },

    /// The filter is still referenced by other filters or external records.
    #[error("Conflict: {message} (dependents: {})", dependents.join(", "))]
    Conflict {
        message: String,
        dependents: Vec<String>,
    },

    /// The storage collaborator failed to run a filtered read.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl FilterError {
    /// Build a configuration error about `subject`
    pub fn config(subject: impl Into<String>, message: impl Into<String>) -> Self {
        FilterError::Config {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Build a validation error without offending elements
    pub fn validation(message: impl Into<String>) -> Self {
        FilterError::Validation {
            message: message.into(),
            elements: Vec::new(),
        }
    }

    /// Build a validation error naming the offending elements
    pub fn invalid_elements<I, S>(message: impl Into<String>, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterError::Validation {
            message: message.into(),
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a conflict error listing the dependents
    pub fn conflict<I, S>(message: impl Into<String>, dependents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterError::Conflict {
            message: message.into(),
            dependents: dependents.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true for configuration errors
    pub fn is_config(&self) -> bool {
        matches!(self, FilterError::Config { .. })
    }

    /// Returns true for validation errors
    pub fn is_validation(&self) -> bool {
        matches!(self, FilterError::Validation { .. })
    }

    /// Returns true for conflict errors
    pub fn is_conflict(&self) -> bool {
        matches!(self, FilterError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = FilterError::config("image", "this field is not filterable");
        assert_eq!(
            err.to_string(),
            "Configuration error on 'image': this field is not filterable"
        );
        assert!(err.is_config());
    }

    #[test]
    fn test_conflict_lists_dependents() {
        let err = FilterError::conflict("filter is still used", ["f2", "report:7"]);
        assert!(err.to_string().contains("f2, report:7"));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_validation_elements() {
        let err = FilterError::invalid_elements("cycle with a sub-filter", ["f1"]);
        match err {
            FilterError::Validation { elements, .. } => assert_eq!(elements, vec!["f1"]),
            _ => panic!("Expected validation error"),
        }
    }
}
