//! Storage collaborator
//!
//! The engine never reads entities itself: a backend receives the resolved
//! predicate of a filter and runs the actual filtered read (SQL, search
//! index, in-memory scan...).

mod memory;

pub use memory::{EntityRecord, MemoryStorage};

use efilter_core::{Predicate, Result};

/// Entity identifier as reported by the backend
pub type EntityId = String;

/// Backend able to run a filtered read
pub trait StorageBackend: Send + Sync {
    /// Ids of the `entity_type` entities matching `predicate`, in a stable order
    fn fetch(&self, entity_type: &str, predicate: &Predicate) -> Result<Vec<EntityId>>;
}
