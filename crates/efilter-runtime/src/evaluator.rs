//! Filter evaluation
//!
//! Folds the conditions of a filter into one [`Predicate`] for a given
//! evaluation context and hands it to the storage backend.
//!
//! Conditions whose references vanished since they were validated (a field
//! was dropped, a sub-filter deleted...) are skipped with a warning instead
//! of failing the read. A filter without any usable condition matches
//! everything.

use crate::context::EvaluationContext;
use crate::handler::PredicateScope;
use crate::registry::Catalogs;
use crate::storage::{EntityId, StorageBackend};
use crate::DEFAULT_MAX_DEPTH;
use efilter_core::{
    Condition, EntityFilter, FilterError, FilterSource, Predicate, Result, SchemaProvider,
};
use tracing::{debug, warn};

/// Compiles filters into predicates and applies them
pub struct FilterEvaluator<'a> {
    catalogs: &'a Catalogs,
    schema: &'a dyn SchemaProvider,
    filters: &'a dyn FilterSource,
    max_depth: usize,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(
        catalogs: &'a Catalogs,
        schema: &'a dyn SchemaProvider,
        filters: &'a dyn FilterSource,
    ) -> Self {
        Self {
            catalogs,
            schema,
            filters,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whole predicate of `filter` for this context
    pub fn predicate(&self, filter: &EntityFilter, ctx: &EvaluationContext) -> Result<Predicate> {
        self.compile(filter, ctx, 0)
    }

    /// Run `filter` against the storage backend
    ///
    /// Structurally impossible filters return an empty result without
    /// reaching the backend.
    pub fn apply(
        &self,
        filter: &EntityFilter,
        ctx: &EvaluationContext,
        storage: &dyn StorageBackend,
    ) -> Result<Vec<EntityId>> {
        let predicate = self.predicate(filter, ctx)?;
        if predicate.is_never() {
            debug!(filter = %filter.id, "filter can never match, skipping storage");
            return Ok(Vec::new());
        }
        storage.fetch(&filter.entity_type, &predicate)
    }

    /// Conditions of `filter` that can no longer be evaluated, by position
    pub fn condition_errors(
        &self,
        filter: &EntityFilter,
        ctx: &EvaluationContext,
    ) -> Vec<(usize, FilterError)> {
        let scope = self.scope(filter, ctx, 0);
        filter
            .conditions()
            .iter()
            .enumerate()
            .filter_map(|(index, condition)| {
                self.condition_predicate(&scope, condition)
                    .err()
                    .map(|e| (index, e))
            })
            .collect()
    }

    pub(crate) fn compile(
        &self,
        filter: &EntityFilter,
        ctx: &EvaluationContext,
        depth: usize,
    ) -> Result<Predicate> {
        if depth > self.max_depth {
            return Err(FilterError::invalid_elements(
                format!("sub-filters nested deeper than {} levels", self.max_depth),
                [filter.id.to_string()],
            ));
        }
        if let Some(predicate) = ctx.memoized(&filter.id) {
            return Ok(predicate);
        }

        let scope = self.scope(filter, ctx, depth);
        let mut parts = Vec::with_capacity(filter.conditions().len());
        for condition in filter.conditions() {
            match self.condition_predicate(&scope, condition) {
                Ok(predicate) => parts.push(predicate),
                Err(e) if e.is_config() => {
                    warn!(
                        filter = %filter.id,
                        kind = %condition.kind(),
                        reference = condition.reference(),
                        "skipping broken condition: {}",
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let predicate = if parts.is_empty() {
            Predicate::Always
        } else if filter.use_or {
            Predicate::or(parts)
        } else {
            Predicate::and(parts)
        };
        ctx.memoize(&filter.id, &predicate);
        Ok(predicate)
    }

    fn scope<'s>(
        &'s self,
        filter: &'s EntityFilter,
        ctx: &'s EvaluationContext,
        depth: usize,
    ) -> PredicateScope<'s> {
        PredicateScope {
            context: ctx,
            catalogs: self.catalogs,
            schema: self.schema,
            filters: self.filters,
            entity_type: &filter.entity_type,
            registry: self.catalogs.registries.get(&filter.filter_type).ok(),
            evaluator: self,
            depth,
        }
    }

    fn condition_predicate(
        &self,
        scope: &PredicateScope<'_>,
        condition: &Condition,
    ) -> Result<Predicate> {
        let spec = self
            .catalogs
            .handlers
            .get(condition.kind())
            .ok_or_else(|| {
                FilterError::config(
                    condition.reference(),
                    format!("no handler registered for {} conditions", condition.kind()),
                )
            })?;
        (spec.predicate)(scope, condition)
    }
}
