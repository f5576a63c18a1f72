//! Entity filter runtime - building, validating and evaluating filters
//!
//! This crate turns raw condition descriptors into validated conditions,
//! guards the sub-filter graph (cycles, ownership rules) and folds filters
//! into predicates run by a storage backend.

pub mod authorizer;
pub mod context;
pub mod cycle;
pub mod directory;
pub mod evaluator;
pub mod handler;
pub mod registry;
pub mod schema;
pub mod storage;

/// Default bound on sub-filter nesting for traversals and evaluation
pub const DEFAULT_MAX_DEPTH: usize = 32;

// Re-export main types
pub use authorizer::OwnershipAuthorizer;
pub use context::EvaluationContext;
pub use cycle::CycleDetector;
pub use directory::MemoryDirectory;
pub use evaluator::FilterEvaluator;
pub use handler::{BuildScope, ConditionBuilder, HandlerRegistry, HandlerSpec, PredicateScope};
pub use registry::{Catalogs, FilterRegistries, FilterTypeRegistry};
pub use schema::MemorySchema;
pub use storage::{EntityId, EntityRecord, MemoryStorage, StorageBackend};
