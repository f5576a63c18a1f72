//! External references to filters
//!
//! Records living outside the filter set (saved reports, dashboards...)
//! register the filters they use so deletion can be refused while they do.

use efilter_core::{ExternalReferences, FilterId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

/// External references held in memory
#[derive(Debug, Default)]
pub struct MemoryReferences {
    references: RwLock<BTreeMap<FilterId, BTreeSet<String>>>,
}

impl MemoryReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `label` uses filter `id`
    pub fn add(&self, id: &FilterId, label: impl Into<String>) {
        self.references
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_default()
            .insert(label.into());
    }

    /// Forget one reference; returns false if it was not registered
    pub fn remove(&self, id: &FilterId, label: &str) -> bool {
        let mut references = self
            .references
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(labels) = references.get_mut(id) else {
            return false;
        };
        let removed = labels.remove(label);
        if labels.is_empty() {
            references.remove(id);
        }
        removed
    }
}

impl ExternalReferences for MemoryReferences {
    fn references_to(&self, id: &FilterId) -> Vec<String> {
        self.references
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|labels| labels.iter().cloned().collect())
            .unwrap_or_default()
    }
}
