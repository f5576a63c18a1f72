//! In-memory filter repository

use crate::error::{RepositoryError, RepositoryResult};
use crate::traits::FilterRepository;
use efilter_core::{EntityFilter, FilterId, FilterSource};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Filters held in memory, keyed by id
///
/// Suitable for tests and for embedding; data is lost when the process
/// exits unless wrapped by [`crate::FileFilterRepository`].
#[derive(Debug, Default)]
pub struct MemoryFilterRepository {
    filters: RwLock<BTreeMap<FilterId, EntityFilter>>,
    sequence: AtomicU64,
}

impl MemoryFilterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-filled with `filters`
    pub fn with_filters(filters: impl IntoIterator<Item = EntityFilter>) -> RepositoryResult<Self> {
        let repo = Self::new();
        for filter in filters {
            repo.insert(filter)?;
        }
        Ok(repo)
    }

    /// Copy of every filter, ordered by id
    pub fn snapshot(&self) -> Vec<EntityFilter> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<FilterId, EntityFilter>> {
        self.filters.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<FilterId, EntityFilter>> {
        self.filters.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FilterSource for MemoryFilterRepository {
    fn filter(&self, id: &FilterId) -> Option<EntityFilter> {
        self.read().get(id).cloned()
    }

    fn filters(&self) -> Vec<EntityFilter> {
        self.snapshot()
    }
}

impl FilterRepository for MemoryFilterRepository {
    fn insert(&self, filter: EntityFilter) -> RepositoryResult<()> {
        let mut filters = self.write();
        if filters.contains_key(&filter.id) {
            return Err(RepositoryError::DuplicateId {
                id: filter.id.to_string(),
            });
        }
        debug!(filter = %filter.id, "inserting filter");
        filters.insert(filter.id.clone(), filter);
        Ok(())
    }

    fn save(&self, filter: EntityFilter) -> RepositoryResult<()> {
        let mut filters = self.write();
        match filters.get_mut(&filter.id) {
            Some(slot) => {
                debug!(filter = %filter.id, "replacing filter");
                *slot = filter;
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                id: filter.id.to_string(),
            }),
        }
    }

    fn remove(&self, id: &FilterId) -> RepositoryResult<EntityFilter> {
        self.write()
            .remove(id)
            .ok_or_else(|| RepositoryError::NotFound { id: id.to_string() })
    }

    fn next_id(&self, prefix: &str, entity_type: &str) -> FilterId {
        let filters = self.read();
        loop {
            let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let id = FilterId::new(format!("{}_{}-{}", prefix, entity_type.to_lowercase(), n));
            if !filters.contains_key(&id) {
                return id;
            }
        }
    }

    fn as_source(&self) -> &dyn FilterSource {
        self
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efilter_core::{Condition, ConditionValue, HandlerKind};

    fn filter(id: &str) -> EntityFilter {
        let condition = Condition::new(
            HandlerKind::Property,
            "vip",
            ConditionValue::Property { has: true },
        )
        .unwrap();
        EntityFilter::new(id, id, "Contact", vec![condition]).unwrap()
    }

    #[test]
    fn test_insert_save_remove() {
        let repo = MemoryFilterRepository::new();
        repo.insert(filter("f1")).unwrap();
        assert!(matches!(
            repo.insert(filter("f1")),
            Err(RepositoryError::DuplicateId { .. })
        ));

        let mut renamed = filter("f1");
        renamed.name = "renamed".to_string();
        repo.save(renamed).unwrap();
        assert_eq!(repo.filter(&FilterId::new("f1")).unwrap().name, "renamed");
        assert!(matches!(
            repo.save(filter("f2")),
            Err(RepositoryError::NotFound { .. })
        ));

        let removed = repo.remove(&FilterId::new("f1")).unwrap();
        assert_eq!(removed.name, "renamed");
        assert!(repo.is_empty());
    }

    #[test]
    fn test_next_id_skips_taken_ids() {
        let repo = MemoryFilterRepository::with_filters([filter("userfilter_contact-1")]).unwrap();
        assert_eq!(
            repo.next_id("userfilter", "Contact"),
            FilterId::new("userfilter_contact-2")
        );
        assert_eq!(
            repo.next_id("userfilter", "Contact"),
            FilterId::new("userfilter_contact-3")
        );
    }
}
