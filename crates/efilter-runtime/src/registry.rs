//! Filter type registries
//!
//! Each filter type declares which condition kinds and which operands its
//! filters may use. Registries are assembled once at startup and injected,
//! read-only, into every component that validates or evaluates filters.

use crate::handler::HandlerRegistry;
use efilter_core::{FilterError, FilterType, HandlerKind, OperandCatalog, OperatorCatalog, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Legal condition kinds and operands for one filter type
#[derive(Debug, Clone)]
pub struct FilterTypeRegistry {
    filter_type: FilterType,
    handlers: BTreeSet<HandlerKind>,
    operands: OperandCatalog,
}

impl FilterTypeRegistry {
    /// Empty registry: no condition kind is allowed yet
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            filter_type,
            handlers: BTreeSet::new(),
            operands: OperandCatalog::default(),
        }
    }

    /// Registry for user-facing filters: every built-in kind, current user operand
    pub fn regular() -> Self {
        Self::new(FilterType::Regular)
            .with_handlers(HandlerKind::BUILTIN)
            .with_operands(OperandCatalog::standard())
    }

    /// Registry for access-control filters: no sub-filters
    pub fn credentials() -> Self {
        Self::new(FilterType::Credentials)
            .with_handlers(
                HandlerKind::BUILTIN
                    .into_iter()
                    .filter(|kind| !kind.references_filter()),
            )
            .with_operands(OperandCatalog::standard())
    }

    pub fn with_handlers(mut self, kinds: impl IntoIterator<Item = HandlerKind>) -> Self {
        self.handlers.extend(kinds);
        self
    }

    pub fn with_operands(mut self, operands: OperandCatalog) -> Self {
        self.operands = operands;
        self
    }

    pub fn filter_type(&self) -> &FilterType {
        &self.filter_type
    }

    pub fn allows(&self, kind: HandlerKind) -> bool {
        self.handlers.contains(&kind)
    }

    pub fn handlers(&self) -> impl Iterator<Item = HandlerKind> + '_ {
        self.handlers.iter().copied()
    }

    /// Operands legal as values in filters of this type
    pub fn operands(&self) -> &OperandCatalog {
        &self.operands
    }
}

/// All filter type registries, keyed by filter type
#[derive(Debug, Clone, Default)]
pub struct FilterRegistries {
    registries: BTreeMap<FilterType, FilterTypeRegistry>,
}

impl FilterRegistries {
    /// Regular and credentials registries
    pub fn standard() -> Self {
        Self::default()
            .register(FilterTypeRegistry::regular())
            .register(FilterTypeRegistry::credentials())
    }

    /// Add or replace the registry of a filter type
    pub fn register(mut self, registry: FilterTypeRegistry) -> Self {
        self.registries
            .insert(registry.filter_type().clone(), registry);
        self
    }

    pub fn get(&self, filter_type: &FilterType) -> Result<&FilterTypeRegistry> {
        self.registries.get(filter_type).ok_or_else(|| {
            FilterError::config(filter_type.as_str(), "no registry for this filter type")
        })
    }

    pub fn filter_types(&self) -> impl Iterator<Item = &FilterType> {
        self.registries.keys()
    }
}

/// Immutable catalogs shared by builders and evaluators
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub operators: OperatorCatalog,
    /// Every known operand, used to resolve stored values
    pub operands: OperandCatalog,
    pub handlers: HandlerRegistry,
    pub registries: FilterRegistries,
}

impl Catalogs {
    pub fn standard() -> Self {
        Self {
            operators: OperatorCatalog::standard(),
            operands: OperandCatalog::standard(),
            handlers: HandlerRegistry::standard(),
            registries: FilterRegistries::standard(),
        }
    }
}

impl Default for Catalogs {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efilter_core::operand::CURRENT_USER;

    #[test]
    fn test_regular_registry_allows_everything() {
        let registry = FilterTypeRegistry::regular();
        for kind in HandlerKind::BUILTIN {
            assert!(registry.allows(kind), "{} should be allowed", kind);
        }
        assert!(registry.operands().contains(CURRENT_USER));
    }

    #[test]
    fn test_credentials_registry_has_no_sub_filters() {
        let registry = FilterTypeRegistry::credentials();
        assert!(!registry.allows(HandlerKind::SubFilter));
        assert!(!registry.allows(HandlerKind::RelationSubFilter));
        assert!(registry.allows(HandlerKind::RegularField));
        assert_eq!(registry.handlers().count(), 6);
    }

    #[test]
    fn test_unknown_filter_type() {
        let registries = FilterRegistries::standard();
        let err = registries
            .get(&FilterType::Custom("reports".to_string()))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_custom_registry_registration() {
        let registries = FilterRegistries::standard().register(
            FilterTypeRegistry::new(FilterType::Custom("reports".to_string()))
                .with_handlers([HandlerKind::RegularField]),
        );
        let registry = registries
            .get(&FilterType::Custom("reports".to_string()))
            .unwrap();
        assert!(registry.allows(HandlerKind::RegularField));
        assert!(!registry.operands().contains(CURRENT_USER));
        assert_eq!(registries.filter_types().count(), 3);
    }
}
