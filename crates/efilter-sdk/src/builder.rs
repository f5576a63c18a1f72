//! Builder pattern for FilterEngine

use crate::config::EngineConfig;
use crate::engine::FilterEngine;
use crate::error::{Result, SdkError};
use efilter_core::{
    Condition, EntityFilter, ExternalReferences, FilterError, FilterSource, IdentityProvider,
    Operand, SchemaProvider,
};
use efilter_repository::{FilterRepository, MemoryFilterRepository, SystemFilterLoader};
use efilter_runtime::{
    Catalogs, ConditionBuilder, CycleDetector, EvaluationContext, FilterEvaluator,
    FilterTypeRegistry, HandlerSpec, StorageBackend,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Builder for FilterEngine
///
/// The schema, identity and storage collaborators are required; the
/// repository defaults to an in-memory one.
///
/// # Example
///
/// ```rust,ignore
/// use efilter_sdk::FilterEngineBuilder;
///
/// let engine = FilterEngineBuilder::new()
///     .with_schema(schema)
///     .with_identity(directory)
///     .with_storage(storage)
///     .add_system_filter_file("filters/contacts.yaml")
///     .build()?;
/// ```
pub struct FilterEngineBuilder {
    config: EngineConfig,
    schema: Option<Arc<dyn SchemaProvider>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    storage: Option<Arc<dyn StorageBackend>>,
    repository: Option<Arc<dyn FilterRepository>>,
    external: Option<Arc<dyn ExternalReferences>>,
    system_filters: Vec<EntityFilter>,
    handlers: Vec<HandlerSpec>,
    operands: Vec<Operand>,
    filter_types: Vec<FilterTypeRegistry>,
}

impl FilterEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: EngineConfig::new(),
            schema: None,
            identity: None,
            storage: None,
            repository: None,
            external: None,
            system_filters: Vec::new(),
            handlers: Vec::new(),
            operands: Vec::new(),
            filter_types: Vec::new(),
        }
    }

    // ========== Collaborators ==========

    pub fn with_schema(mut self, schema: Arc<dyn SchemaProvider>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn FilterRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Records outside the filter set that may depend on filters
    pub fn with_external_references(mut self, external: Arc<dyn ExternalReferences>) -> Self {
        self.external = Some(external);
        self
    }

    // ========== Configuration ==========

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn with_filter_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.filter_id_prefix = prefix.into();
        self
    }

    /// Add a YAML/JSON file of installed filters
    pub fn add_system_filter_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.system_filter_files.push(path.into());
        self
    }

    /// Add an installed filter directly (alternative to a file)
    pub fn add_system_filter(mut self, filter: EntityFilter) -> Self {
        self.system_filters.push(filter.system());
        self
    }

    // ========== Extensions ==========

    /// Register a handler for a new condition kind
    pub fn register_handler(mut self, spec: HandlerSpec) -> Self {
        self.handlers.push(spec);
        self
    }

    pub fn register_operand(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn register_filter_type(mut self, registry: FilterTypeRegistry) -> Self {
        self.filter_types.push(registry);
        self
    }

    /// Build the filter engine
    ///
    /// Registries are assembled once here and stay read-only afterwards.
    /// System filters already present in the repository are left as they
    /// are; new ones are validated together before any is installed.
    pub fn build(self) -> Result<FilterEngine> {
        if self.config.max_depth == 0 {
            return Err(SdkError::ConfigError(
                "max_depth must be at least 1".to_string(),
            ));
        }
        let schema = self.schema.ok_or(SdkError::NotInitialized("schema provider"))?;
        let identity = self
            .identity
            .ok_or(SdkError::NotInitialized("identity provider"))?;
        let storage = self
            .storage
            .ok_or(SdkError::NotInitialized("storage backend"))?;
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(MemoryFilterRepository::new()));

        let mut catalogs = Catalogs::standard();
        for operand in self.operands {
            catalogs.operands = catalogs.operands.with_operand(operand);
        }
        for spec in self.handlers {
            catalogs.handlers = catalogs.handlers.register(spec);
        }
        for declared in &self.config.filter_types {
            let registry = declared.to_registry(&catalogs.operands)?;
            catalogs.registries = catalogs.registries.register(registry);
        }
        for registry in self.filter_types {
            catalogs.registries = catalogs.registries.register(registry);
        }

        let detector = CycleDetector::new(self.config.max_depth);
        let mut system_filters = self.system_filters;
        for path in &self.config.system_filter_files {
            system_filters.extend(SystemFilterLoader::load_file(path)?);
        }
        install_system_filters(
            repository.as_ref(),
            system_filters,
            &catalogs,
            schema.as_ref(),
            detector,
        )?;

        info!(
            max_depth = self.config.max_depth,
            filters = repository.len(),
            "filter engine ready"
        );
        Ok(FilterEngine {
            config: self.config,
            catalogs,
            detector,
            schema,
            identity,
            storage,
            repository,
            external: self.external,
            write_lock: Mutex::new(()),
        })
    }
}

impl Default for FilterEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn install_system_filters(
    repository: &dyn FilterRepository,
    filters: Vec<EntityFilter>,
    catalogs: &Catalogs,
    schema: &dyn SchemaProvider,
    detector: CycleDetector,
) -> Result<()> {
    let fresh: Vec<EntityFilter> = filters
        .into_iter()
        .filter(|filter| {
            let installed = repository.contains(&filter.id);
            if installed {
                debug!(filter = %filter.id, "system filter already installed");
            }
            !installed
        })
        .collect();
    if fresh.is_empty() {
        return Ok(());
    }

    let staging = MemoryFilterRepository::with_filters(
        repository.filters().into_iter().chain(fresh.iter().cloned()),
    )?;
    let builder = ConditionBuilder::new(catalogs, schema, &staging);
    let evaluator = FilterEvaluator::new(catalogs, schema, &staging)
        .with_max_depth(detector.max_depth());
    let ctx = EvaluationContext::new(None);
    for filter in &fresh {
        detector.check(filter, &staging)?;
        for (index, condition) in filter.conditions().iter().enumerate() {
            revalidate(&builder, catalogs, filter, condition)
                .map_err(|e| invalid_system_filter(filter, index, e))?;
        }
        if let Some((index, error)) = evaluator.condition_errors(filter, &ctx).into_iter().next() {
            return Err(invalid_system_filter(filter, index, error));
        }
    }

    let count = fresh.len();
    for filter in fresh {
        repository.insert(filter)?;
    }
    info!("installed {} system filter(s)", count);
    Ok(())
}

/// Run a stored condition back through its handler's validation
fn revalidate(
    builder: &ConditionBuilder<'_>,
    catalogs: &Catalogs,
    filter: &EntityFilter,
    condition: &Condition,
) -> efilter_core::Result<()> {
    match condition.descriptor() {
        Some(descriptor) => builder
            .build(&filter.filter_type, &filter.entity_type, &descriptor)
            .map(|_| ()),
        None => {
            let registry = catalogs.registries.get(&filter.filter_type)?;
            if registry.allows(condition.kind()) {
                Ok(())
            } else {
                Err(FilterError::config(
                    condition.reference(),
                    format!(
                        "{} conditions are not allowed in {} filters",
                        condition.kind(),
                        filter.filter_type
                    ),
                ))
            }
        }
    }
}

fn invalid_system_filter(filter: &EntityFilter, index: usize, error: FilterError) -> SdkError {
    SdkError::ConfigError(format!(
        "system filter '{}', condition {}: {}",
        filter.id, index, error
    ))
}
