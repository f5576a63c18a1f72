//! FilterEngine - the filter lifecycle facade
//!
//! Every mutation follows the same path: build and validate the conditions,
//! check the sub-filter graph for cycles, check the ownership rules, then
//! persist the whole filter in one write. Mutations are serialized by the
//! engine and validated against a copy, so a rejected request never leaves
//! a trace in the repository.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::request::{FilterRequest, FilterUpdate};
use efilter_core::{
    Access, ActingUser, Condition, ConditionDescriptor, EntityFilter, ExternalReferences,
    FilterError, FilterId, FilterSource, FilterType, IdentityProvider, Ownership, Predicate,
    SchemaProvider,
};
use efilter_repository::{FilterRepository, RepositoryError};
use efilter_runtime::{
    Catalogs, ConditionBuilder, CycleDetector, EntityId, EvaluationContext, FilterEvaluator,
    OwnershipAuthorizer, StorageBackend,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Entity filter engine
pub struct FilterEngine {
    pub(crate) config: EngineConfig,
    pub(crate) catalogs: Catalogs,
    pub(crate) detector: CycleDetector,
    pub(crate) schema: Arc<dyn SchemaProvider>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) storage: Arc<dyn StorageBackend>,
    pub(crate) repository: Arc<dyn FilterRepository>,
    pub(crate) external: Option<Arc<dyn ExternalReferences>>,
    pub(crate) write_lock: Mutex<()>,
}

impl FilterEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn filter(&self, id: &FilterId) -> Option<EntityFilter> {
        self.repository.filter(id)
    }

    /// Validate one condition without touching any filter
    pub fn build_condition(
        &self,
        filter_type: &FilterType,
        entity_type: &str,
        descriptor: &ConditionDescriptor,
    ) -> Result<Condition> {
        Ok(self.builder().build(filter_type, entity_type, descriptor)?)
    }

    // ========== Mutations ==========

    /// Create a filter
    pub fn create(&self, user: &ActingUser, request: FilterRequest) -> Result<EntityFilter> {
        let _guard = self.lock();
        let id = match &request.id {
            Some(id) => id.clone(),
            None => self
                .repository
                .next_id(&self.config.filter_id_prefix, &request.entity_type),
        };
        if self.repository.contains(&id) {
            return Err(RepositoryError::DuplicateId { id: id.to_string() }.into());
        }

        let candidate = rejected("create", &id, self.prepare_create(user, &id, request))?;
        self.repository.insert(candidate.clone())?;
        info!(filter = %candidate.id, owner = %candidate.ownership, "filter created");
        Ok(candidate)
    }

    /// Apply a partial update
    pub fn update(
        &self,
        user: &ActingUser,
        id: &FilterId,
        update: FilterUpdate,
    ) -> Result<EntityFilter> {
        let _guard = self.lock();
        let previous = self.require(id)?;
        if update.is_empty() {
            return Ok(previous);
        }

        let candidate = rejected("update", id, self.prepare_update(user, &previous, update))?;
        self.repository.save(candidate.clone())?;
        info!(filter = %id, "filter updated");
        Ok(candidate)
    }

    /// Replace the whole condition list
    pub fn set_conditions(
        &self,
        user: &ActingUser,
        id: &FilterId,
        conditions: Vec<ConditionDescriptor>,
        use_or: bool,
    ) -> Result<EntityFilter> {
        self.update(user, id, FilterUpdate::new().with_conditions(conditions, use_or))
    }

    pub fn change_ownership(
        &self,
        user: &ActingUser,
        id: &FilterId,
        ownership: Ownership,
    ) -> Result<EntityFilter> {
        self.update(user, id, FilterUpdate::new().with_ownership(ownership))
    }

    pub fn rename(
        &self,
        user: &ActingUser,
        id: &FilterId,
        name: impl Into<String>,
    ) -> Result<EntityFilter> {
        self.update(user, id, FilterUpdate::new().rename(name))
    }

    /// Delete a filter nothing depends on anymore
    pub fn delete(&self, user: &ActingUser, id: &FilterId) -> Result<EntityFilter> {
        let _guard = self.lock();
        let filter = self.require(id)?;

        let check = ensure(filter.can_delete(user), id).and_then(|()| {
            let dependents = self.authorizer().dependents(id);
            if dependents.is_empty() {
                Ok(())
            } else {
                Err(FilterError::conflict(
                    format!("filter '{}' is still in use", id),
                    dependents,
                ))
            }
        });
        rejected("delete", id, check)?;

        let removed = self.repository.remove(id)?;
        info!(filter = %id, "filter deleted");
        Ok(removed)
    }

    // ========== Permissions ==========

    pub fn can_view(&self, user: &ActingUser, id: &FilterId) -> Result<Access> {
        Ok(self.authorizer().can_view(user, &self.require(id)?))
    }

    pub fn can_edit(&self, user: &ActingUser, id: &FilterId) -> Result<Access> {
        Ok(self.authorizer().can_edit(user, &self.require(id)?))
    }

    pub fn can_rename(&self, user: &ActingUser, id: &FilterId) -> Result<Access> {
        Ok(self.authorizer().can_rename(user, &self.require(id)?))
    }

    /// Includes the dependents check
    pub fn can_delete(&self, user: &ActingUser, id: &FilterId) -> Result<Access> {
        Ok(self.authorizer().can_delete(user, &self.require(id)?))
    }

    /// Parent filters, then external records, using `id`
    pub fn dependents(&self, id: &FilterId) -> Vec<String> {
        self.authorizer().dependents(id)
    }

    /// Filters `user` may see, optionally for one entity type, ordered by id
    pub fn visible_filters(&self, user: &ActingUser, entity_type: Option<&str>) -> Vec<EntityFilter> {
        let mut filters: Vec<EntityFilter> = self
            .repository
            .filters()
            .into_iter()
            .filter(|f| entity_type.map_or(true, |t| f.entity_type == t))
            .filter(|f| f.can_view(user).0)
            .collect();
        filters.sort_by(|a, b| a.id.cmp(&b.id));
        filters
    }

    // ========== Evaluation ==========

    /// Run a filter for `user` with a fresh evaluation context
    pub fn apply(&self, user: &ActingUser, id: &FilterId) -> Result<Vec<EntityId>> {
        let ctx = EvaluationContext::new(Some(user.clone()));
        self.apply_in(&ctx, id)
    }

    /// Run a filter inside an existing context
    pub fn apply_in(&self, ctx: &EvaluationContext, id: &FilterId) -> Result<Vec<EntityId>> {
        let filter = self.visible(ctx, id)?;
        Ok(self.evaluator().apply(&filter, ctx, &*self.storage)?)
    }

    pub fn predicate(&self, ctx: &EvaluationContext, id: &FilterId) -> Result<Predicate> {
        let filter = self.visible(ctx, id)?;
        Ok(self.evaluator().predicate(&filter, ctx)?)
    }

    /// Conditions of a filter that can no longer be evaluated, by position
    pub fn condition_errors(&self, id: &FilterId) -> Result<Vec<(usize, FilterError)>> {
        let filter = self.require(id)?;
        let ctx = EvaluationContext::new(None);
        Ok(self.evaluator().condition_errors(&filter, &ctx))
    }

    // ========== Internals ==========

    fn prepare_create(
        &self,
        user: &ActingUser,
        id: &FilterId,
        request: FilterRequest,
    ) -> efilter_core::Result<EntityFilter> {
        let conditions = self.builder().build_all(
            &request.filter_type,
            &request.entity_type,
            &request.conditions,
        )?;
        let candidate = EntityFilter::new(id.as_str(), request.name, request.entity_type, conditions)?
            .with_use_or(request.use_or)
            .with_ownership(request.ownership)
            .with_filter_type(request.filter_type);
        self.check_graph(user, &candidate, None)?;
        Ok(candidate)
    }

    fn prepare_update(
        &self,
        user: &ActingUser,
        previous: &EntityFilter,
        update: FilterUpdate,
    ) -> efilter_core::Result<EntityFilter> {
        ensure(previous.can_edit(user), &previous.id)?;
        let mut candidate = previous.clone();

        if let Some(name) = update.name {
            if name != previous.name {
                ensure(previous.can_rename(user), &previous.id)?;
                candidate.name = name;
            }
        }
        if let Some(ownership) = update.ownership {
            candidate.ownership = ownership;
        }
        if let Some((descriptors, use_or)) = update.conditions {
            let conditions = self.builder().build_all(
                &previous.filter_type,
                &previous.entity_type,
                &descriptors,
            )?;
            candidate.set_conditions(conditions, use_or)?;
        }

        self.check_graph(user, &candidate, Some(previous))?;
        Ok(candidate)
    }

    fn check_graph(
        &self,
        user: &ActingUser,
        candidate: &EntityFilter,
        previous: Option<&EntityFilter>,
    ) -> efilter_core::Result<()> {
        self.detector.check(candidate, self.repository.as_source())?;
        self.authorizer().validate(user, candidate, previous)
    }

    fn visible(&self, ctx: &EvaluationContext, id: &FilterId) -> Result<EntityFilter> {
        let filter = self.require(id)?;
        if let Some(user) = ctx.user() {
            ensure(filter.can_view(user), id)?;
        }
        Ok(filter)
    }

    fn require(&self, id: &FilterId) -> Result<EntityFilter> {
        self.repository
            .filter(id)
            .ok_or_else(|| RepositoryError::NotFound { id: id.to_string() }.into())
    }

    fn builder(&self) -> ConditionBuilder<'_> {
        ConditionBuilder::new(&self.catalogs, &*self.schema, self.repository.as_source())
    }

    fn evaluator(&self) -> FilterEvaluator<'_> {
        FilterEvaluator::new(&self.catalogs, &*self.schema, self.repository.as_source())
            .with_max_depth(self.config.max_depth)
    }

    fn authorizer(&self) -> OwnershipAuthorizer<'_> {
        let authorizer = OwnershipAuthorizer::new(&*self.identity, self.repository.as_source())
            .with_detector(self.detector);
        match &self.external {
            Some(external) => authorizer.with_external(&**external),
            None => authorizer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure(access: Access, id: &FilterId) -> efilter_core::Result<()> {
    match access {
        (true, _) => Ok(()),
        (false, reason) => Err(FilterError::invalid_elements(
            reason.unwrap_or_else(|| "permission denied".to_string()),
            [id.to_string()],
        )),
    }
}

fn rejected<T>(operation: &str, id: &FilterId, result: efilter_core::Result<T>) -> Result<T> {
    result.map_err(|e| {
        info!(filter = %id, operation, "request rejected: {}", e);
        e.into()
    })
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("config", &self.config)
            .field("filters", &self.repository.len())
            .finish()
    }
}

