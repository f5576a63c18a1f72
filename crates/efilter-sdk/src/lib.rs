//! Entity Filter Engine SDK
//!
//! High-level API for creating, validating, authorizing and applying
//! entity filters.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod request;

// Re-export main types
pub use builder::FilterEngineBuilder;
pub use config::{EngineConfig, FilterTypeConfig};
pub use engine::FilterEngine;
pub use error::{Result, SdkError};
pub use request::{FilterRequest, FilterUpdate};

// Re-export commonly used types from dependencies
pub use efilter_core::{
    Access, ActingUser, ConditionDescriptor, EntityFilter, FilterError, FilterId, FilterType,
    HandlerKind, OperatorId, Ownership, Value,
};
pub use efilter_runtime::{EntityId, EvaluationContext};
