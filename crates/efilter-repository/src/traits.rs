//! Repository trait
//!
//! [`FilterRepository`] extends the read-only [`FilterSource`] view used by
//! validation and evaluation with the write operations of the filter
//! lifecycle. Every write replaces or removes one whole filter, so a reader
//! never observes a half-updated condition list.

use crate::RepositoryResult;
use efilter_core::{EntityFilter, FilterId, FilterSource};

/// Storage for entity filters
pub trait FilterRepository: FilterSource {
    /// Store a new filter; fails if the id is taken
    fn insert(&self, filter: EntityFilter) -> RepositoryResult<()>;

    /// Replace an existing filter as a whole; fails if it does not exist
    fn save(&self, filter: EntityFilter) -> RepositoryResult<()>;

    /// Remove a filter, returning it
    fn remove(&self, id: &FilterId) -> RepositoryResult<EntityFilter>;

    /// Fresh id of the form `<prefix>_<entity_type>-<n>`
    fn next_id(&self, prefix: &str, entity_type: &str) -> FilterId;

    /// Read-only view handed to validation and evaluation
    fn as_source(&self) -> &dyn FilterSource;

    fn contains(&self, id: &FilterId) -> bool {
        self.filter(id).is_some()
    }

    fn len(&self) -> usize {
        self.filters().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
