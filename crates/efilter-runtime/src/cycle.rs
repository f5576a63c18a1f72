//! Sub-filter graph traversal
//!
//! An edge F -> S exists whenever F holds a sub-filter or relation
//! sub-filter condition pointing at S. Traversals share one visited set, so
//! diamonds are walked once, and stop at a depth guard so malformed stored
//! graphs cannot recurse forever.

use crate::DEFAULT_MAX_DEPTH;
use efilter_core::{EntityFilter, FilterError, FilterId, FilterSource, Result};
use std::collections::HashSet;
use tracing::debug;

/// Detects cycles and walks the sub-filter graph
#[derive(Debug, Clone, Copy)]
pub struct CycleDetector {
    max_depth: usize,
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl CycleDetector {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Reject `candidate` if one of its sub-filters leads back to it
    ///
    /// The candidate's own edges come from its (unsaved) conditions, every
    /// other edge from `filters`.
    pub fn check(&self, candidate: &EntityFilter, filters: &dyn FilterSource) -> Result<()> {
        let origin = &candidate.id;
        let roots = candidate.sub_filter_ids();
        if roots.contains(origin) {
            debug!(filter = %origin, "filter references itself");
            return Err(cycle_error(origin, origin));
        }

        let mut visited = HashSet::new();
        let mut stack: Vec<(FilterId, usize, FilterId)> = roots
            .into_iter()
            .map(|root| (root.clone(), 1, root))
            .collect();
        while let Some((id, depth, root)) = stack.pop() {
            if &id == origin {
                debug!(filter = %origin, sub_filter = %root, "sub-filter leads back to the filter");
                return Err(cycle_error(origin, &root));
            }
            if depth > self.max_depth {
                return Err(self.too_deep(origin));
            }
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(filter) = filters.filter(&id) {
                stack.extend(
                    filter
                        .sub_filter_ids()
                        .into_iter()
                        .map(|next| (next, depth + 1, root.clone())),
                );
            }
        }
        Ok(())
    }

    /// Every filter reachable from `candidate`'s conditions, in discovery order
    pub fn descendants(
        &self,
        candidate: &EntityFilter,
        filters: &dyn FilterSource,
    ) -> Result<Vec<EntityFilter>> {
        let mut visited: HashSet<FilterId> = HashSet::from([candidate.id.clone()]);
        let mut found = Vec::new();
        let mut stack: Vec<(FilterId, usize)> = candidate
            .sub_filter_ids()
            .into_iter()
            .rev()
            .map(|id| (id, 1))
            .collect();
        while let Some((id, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(self.too_deep(&candidate.id));
            }
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(filter) = filters.filter(&id) {
                stack.extend(
                    filter
                        .sub_filter_ids()
                        .into_iter()
                        .rev()
                        .map(|next| (next, depth + 1)),
                );
                found.push(filter);
            }
        }
        Ok(found)
    }

    /// Every filter that reaches `id`, directly or transitively, sorted
    pub fn ancestors(&self, id: &FilterId, filters: &dyn FilterSource) -> Result<Vec<FilterId>> {
        let mut visited: HashSet<FilterId> = HashSet::from([id.clone()]);
        let mut found = Vec::new();
        let mut stack: Vec<(FilterId, usize)> = vec![(id.clone(), 0)];
        while let Some((current, depth)) = stack.pop() {
            for parent in filters.parents_of(&current) {
                if depth + 1 > self.max_depth {
                    return Err(self.too_deep(id));
                }
                if visited.insert(parent.clone()) {
                    found.push(parent.clone());
                    stack.push((parent, depth + 1));
                }
            }
        }
        found.sort();
        Ok(found)
    }

    fn too_deep(&self, origin: &FilterId) -> FilterError {
        FilterError::invalid_elements(
            format!("sub-filters nested deeper than {} levels", self.max_depth),
            [origin.to_string()],
        )
    }
}

fn cycle_error(origin: &FilterId, sub_filter: &FilterId) -> FilterError {
    let mut elements = vec![origin.to_string()];
    if sub_filter != origin {
        elements.push(sub_filter.to_string());
    }
    FilterError::invalid_elements("cycle with a sub-filter", elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use efilter_core::{Condition, ConditionValue, HandlerKind};
    use std::collections::BTreeMap;

    struct Graph(BTreeMap<FilterId, EntityFilter>);

    impl FilterSource for Graph {
        fn filter(&self, id: &FilterId) -> Option<EntityFilter> {
            self.0.get(id).cloned()
        }

        fn filters(&self) -> Vec<EntityFilter> {
            self.0.values().cloned().collect()
        }
    }

    fn filter(id: &str, subs: &[&str]) -> EntityFilter {
        let mut conditions: Vec<Condition> = subs
            .iter()
            .map(|s| Condition::new(HandlerKind::SubFilter, *s, ConditionValue::SubFilter).unwrap())
            .collect();
        if conditions.is_empty() {
            conditions.push(
                Condition::new(
                    HandlerKind::Property,
                    "vip",
                    ConditionValue::Property { has: true },
                )
                .unwrap(),
            );
        }
        EntityFilter::new(id, id, "Contact", conditions).unwrap()
    }

    fn graph(filters: Vec<EntityFilter>) -> Graph {
        Graph(filters.into_iter().map(|f| (f.id.clone(), f)).collect())
    }

    #[test]
    fn test_self_reference_rejected() {
        let detector = CycleDetector::default();
        let err = detector
            .check(&filter("f1", &["f1"]), &graph(vec![]))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("cycle with a sub-filter"));
    }

    #[test]
    fn test_indirect_cycle_rejected() {
        // f2 -> f3 -> f1, candidate f1 -> f2
        let store = graph(vec![filter("f2", &["f3"]), filter("f3", &["f1"]), filter("f1", &[])]);
        let err = CycleDetector::default()
            .check(&filter("f1", &["f2"]), &store)
            .unwrap_err();
        match err {
            FilterError::Validation { elements, .. } => assert_eq!(elements, vec!["f1", "f2"]),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let store = graph(vec![
            filter("a", &["b", "c"]),
            filter("b", &["d"]),
            filter("c", &["d"]),
            filter("d", &[]),
        ]);
        let detector = CycleDetector::default();
        assert!(detector.check(&filter("top", &["a"]), &store).is_ok());

        let ids: Vec<String> = detector
            .descendants(&filter("top", &["a"]), &store)
            .unwrap()
            .into_iter()
            .map(|f| f.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_depth_guard() {
        let store = graph(vec![filter("a", &["b"]), filter("b", &["c"]), filter("c", &[])]);
        let err = CycleDetector::new(2)
            .check(&filter("top", &["a"]), &store)
            .unwrap_err();
        assert!(err.to_string().contains("deeper than 2"));
        assert!(CycleDetector::new(3).check(&filter("top", &["a"]), &store).is_ok());
    }

    #[test]
    fn test_ancestors() {
        let store = graph(vec![
            filter("a", &["b"]),
            filter("b", &["c"]),
            filter("x", &["c"]),
            filter("c", &[]),
        ]);
        let ancestors = CycleDetector::default()
            .ancestors(&FilterId::new("c"), &store)
            .unwrap();
        assert_eq!(
            ancestors,
            vec![FilterId::new("a"), FilterId::new("b"), FilterId::new("x")]
        );
    }
}
