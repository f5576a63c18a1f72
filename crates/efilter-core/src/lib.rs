//! Entity filter core - data model for composable entity search predicates
//!
//! This crate provides the fundamental types shared by the filter engine:
//! - Runtime values and schema descriptions consumed from the storage layer
//! - Identity types (acting user, teams)
//! - The operator and operand catalogs
//! - Conditions and the `EntityFilter` aggregate
//! - The predicate tree handed to storage backends
//! - Error taxonomy

pub mod condition;
pub mod error;
pub mod filter;
pub mod identity;
pub mod operand;
pub mod operator;
pub mod predicate;
pub mod types;

// Re-export commonly used types
pub use condition::{
    Condition, ConditionDescriptor, ConditionValue, DateRange, HandlerKind, NamedRange,
    ResolvedRange,
};
pub use error::{FilterError, Result};
pub use filter::{
    Access, EntityFilter, ExternalReferences, FilterId, FilterSource, FilterType, Ownership,
};
pub use identity::{ActingUser, IdentityProvider, Team, TeamId, UserId};
pub use operand::{Operand, OperandCatalog, OperandScope};
pub use operator::{Arity, Operator, OperatorCatalog, OperatorId};
pub use predicate::{Comparison, FieldTarget, Predicate, RelatedObject};
pub use types::{
    CustomField, CustomFieldKind, FieldInfo, FieldKind, PropertyType, RelationType,
    SchemaProvider, Value,
};
