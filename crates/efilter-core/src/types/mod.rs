//! Type system for entity filters
//!
//! This module contains:
//! - Value types
//! - Schema descriptions exposed by the storage layer

pub mod schema;
pub mod value;

pub use schema::{
    CustomField, CustomFieldKind, FieldInfo, FieldKind, PropertyType, RelationType,
    SchemaProvider,
};
pub use value::Value;
