//! Condition handlers
//!
//! One handler per condition kind. A handler is a pair of plain functions:
//! `validate` turns a raw [`ConditionDescriptor`] into the typed payload of
//! the kind (checking references against the schema), and `predicate` turns a
//! stored condition into a [`Predicate`] for one evaluation context.
//!
//! Handlers are looked up by kind in a [`HandlerRegistry`], so extensions can
//! register new kinds without touching the built-in ones.

mod date;
mod field;
mod property;
mod relation;
mod sub_filter;

use crate::context::EvaluationContext;
use crate::evaluator::FilterEvaluator;
use crate::registry::{Catalogs, FilterTypeRegistry};
use efilter_core::{
    Condition, ConditionDescriptor, ConditionValue, EntityFilter, FilterError, FilterId,
    FilterSource, FilterType, HandlerKind, Operand, OperandCatalog, OperatorCatalog, Predicate,
    Result, SchemaProvider, Value,
};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Everything a handler may consult while validating a descriptor
pub struct BuildScope<'a> {
    /// Entity type of the filter being built
    pub entity_type: &'a str,
    /// Registry of the filter type being built
    pub registry: &'a FilterTypeRegistry,
    pub operators: &'a OperatorCatalog,
    /// Every known operand, legal or not for this filter type
    pub operands: &'a OperandCatalog,
    pub schema: &'a dyn SchemaProvider,
    pub filters: &'a dyn FilterSource,
}

impl BuildScope<'_> {
    pub fn filter_type(&self) -> &FilterType {
        self.registry.filter_type()
    }

    /// Operand named by `value`, if it is one this filter type may use
    ///
    /// A known operand the registry leaves out is rejected rather than
    /// stored as text.
    pub fn operand(&self, value: &Value, reference: &str) -> Result<Option<&Operand>> {
        let Some(type_id) = value.as_str() else {
            return Ok(None);
        };
        match self.registry.operands().get(type_id) {
            Some(operand) => Ok(Some(operand)),
            None if self.operands.contains(type_id) => Err(FilterError::invalid_elements(
                format!(
                    "operand '{}' is not allowed in {} filters",
                    type_id,
                    self.filter_type()
                ),
                [reference],
            )),
            None => Ok(None),
        }
    }
}

/// Everything a handler may consult while building a predicate
pub struct PredicateScope<'a> {
    pub context: &'a EvaluationContext,
    pub catalogs: &'a Catalogs,
    pub schema: &'a dyn SchemaProvider,
    pub filters: &'a dyn FilterSource,
    /// Entity type of the filter being evaluated
    pub entity_type: &'a str,
    /// Registry of the filter being evaluated, when its type is still registered
    pub registry: Option<&'a FilterTypeRegistry>,
    pub(crate) evaluator: &'a FilterEvaluator<'a>,
    pub(crate) depth: usize,
}

impl PredicateScope<'_> {
    /// Load a referenced filter; a missing one is a configuration error
    pub fn sub_filter(&self, id: &FilterId) -> Result<EntityFilter> {
        self.filters
            .filter(id)
            .ok_or_else(|| FilterError::config(id.as_str(), "the sub-filter does not exist"))
    }

    /// Whole predicate of a nested filter, one level deeper
    pub fn sub_predicate(&self, filter: &EntityFilter) -> Result<Predicate> {
        self.evaluator
            .compile(filter, self.context, self.depth + 1)
    }

    /// Replace operand type ids by their values for this context
    ///
    /// Only operands legal for the filter's type are resolved; anything else
    /// stays a literal.
    pub fn resolve_values(&self, values: &[Value]) -> Vec<Value> {
        let mut resolved = Vec::with_capacity(values.len());
        for value in values {
            match value
                .as_str()
                .zip(self.registry)
                .and_then(|(type_id, registry)| registry.operands().get(type_id))
            {
                Some(operand) => resolved.extend(self.context.resolve_operand(operand)),
                None => resolved.push(value.clone()),
            }
        }
        resolved
    }
}

pub type ValidateFn = fn(&BuildScope<'_>, &ConditionDescriptor) -> Result<ConditionValue>;
pub type PredicateFn = fn(&PredicateScope<'_>, &Condition) -> Result<Predicate>;

/// Validation and predicate functions of one condition kind
#[derive(Clone, Copy)]
pub struct HandlerSpec {
    pub kind: HandlerKind,
    pub validate: ValidateFn,
    pub predicate: PredicateFn,
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec").field("kind", &self.kind).finish()
    }
}

/// Handlers keyed by condition kind
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<HandlerKind, HandlerSpec>,
}

impl HandlerRegistry {
    /// Registry with the eight built-in handlers
    pub fn standard() -> Self {
        Self::default()
            .register(HandlerSpec {
                kind: HandlerKind::RegularField,
                validate: field::validate_regular,
                predicate: field::regular_predicate,
            })
            .register(HandlerSpec {
                kind: HandlerKind::DateRegularField,
                validate: date::validate_regular,
                predicate: date::regular_predicate,
            })
            .register(HandlerSpec {
                kind: HandlerKind::CustomField,
                validate: field::validate_custom,
                predicate: field::custom_predicate,
            })
            .register(HandlerSpec {
                kind: HandlerKind::DateCustomField,
                validate: date::validate_custom,
                predicate: date::custom_predicate,
            })
            .register(HandlerSpec {
                kind: HandlerKind::Relation,
                validate: relation::validate_relation,
                predicate: relation::relation_predicate,
            })
            .register(HandlerSpec {
                kind: HandlerKind::RelationSubFilter,
                validate: relation::validate_sub_filter,
                predicate: relation::sub_filter_predicate,
            })
            .register(HandlerSpec {
                kind: HandlerKind::Property,
                validate: property::validate,
                predicate: property::predicate,
            })
            .register(HandlerSpec {
                kind: HandlerKind::SubFilter,
                validate: sub_filter::validate,
                predicate: sub_filter::predicate,
            })
    }

    /// Add or replace the handler of a kind
    pub fn register(mut self, spec: HandlerSpec) -> Self {
        self.handlers.insert(spec.kind, spec);
        self
    }

    pub fn get(&self, kind: HandlerKind) -> Option<&HandlerSpec> {
        self.handlers.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = HandlerKind> + '_ {
        self.handlers.keys().copied()
    }
}

/// Turns raw descriptors into validated conditions
pub struct ConditionBuilder<'a> {
    catalogs: &'a Catalogs,
    schema: &'a dyn SchemaProvider,
    filters: &'a dyn FilterSource,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(
        catalogs: &'a Catalogs,
        schema: &'a dyn SchemaProvider,
        filters: &'a dyn FilterSource,
    ) -> Self {
        Self {
            catalogs,
            schema,
            filters,
        }
    }

    /// Validate one descriptor for a filter of `filter_type` on `entity_type`
    pub fn build(
        &self,
        filter_type: &FilterType,
        entity_type: &str,
        descriptor: &ConditionDescriptor,
    ) -> Result<Condition> {
        let registry = self.catalogs.registries.get(filter_type)?;
        if !self.schema.has_entity_type(entity_type) {
            return Err(FilterError::config(entity_type, "unknown entity type"));
        }
        if !registry.allows(descriptor.kind) {
            return Err(FilterError::config(
                descriptor.reference.as_str(),
                format!(
                    "{} conditions are not allowed in {} filters",
                    descriptor.kind, filter_type
                ),
            ));
        }
        let spec = self.catalogs.handlers.get(descriptor.kind).ok_or_else(|| {
            FilterError::config(
                descriptor.reference.as_str(),
                format!("no handler registered for {} conditions", descriptor.kind),
            )
        })?;

        let scope = BuildScope {
            entity_type,
            registry,
            operators: &self.catalogs.operators,
            operands: &self.catalogs.operands,
            schema: self.schema,
            filters: self.filters,
        };
        let value = (spec.validate)(&scope, descriptor).map_err(|e| {
            debug!(
                kind = %descriptor.kind,
                reference = %descriptor.reference,
                "condition rejected: {}",
                e
            );
            e
        })?;
        Condition::new(descriptor.kind, descriptor.reference.clone(), value)
    }

    /// Validate a whole condition list; the first failure rejects it all
    pub fn build_all(
        &self,
        filter_type: &FilterType,
        entity_type: &str,
        descriptors: &[ConditionDescriptor],
    ) -> Result<Vec<Condition>> {
        descriptors
            .iter()
            .map(|d| self.build(filter_type, entity_type, d))
            .collect()
    }
}

// ============================================================================
// Shared descriptor helpers
// ============================================================================

pub(crate) fn ensure_no_operator(descriptor: &ConditionDescriptor) -> Result<()> {
    match descriptor.operator {
        Some(op) => Err(FilterError::invalid_elements(
            format!("{} conditions take no operator (got {})", descriptor.kind, op),
            [descriptor.reference.clone()],
        )),
        None => Ok(()),
    }
}

/// Boolean "has" flag at `index`
pub(crate) fn has_flag(descriptor: &ConditionDescriptor, index: usize) -> Result<bool> {
    descriptor
        .values
        .get(index)
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            FilterError::invalid_elements(
                format!("{} conditions need a boolean 'has' value", descriptor.kind),
                [descriptor.reference.clone()],
            )
        })
}

pub(crate) fn ensure_value_count(descriptor: &ConditionDescriptor, max: usize) -> Result<()> {
    if descriptor.values.len() > max {
        return Err(FilterError::invalid_elements(
            format!(
                "{} conditions take at most {} value(s), got {}",
                descriptor.kind,
                max,
                descriptor.values.len()
            ),
            [descriptor.reference.clone()],
        ));
    }
    Ok(())
}

pub(crate) fn unexpected_value(condition: &Condition) -> FilterError {
    FilterError::config(
        condition.reference(),
        format!("stored value does not match a {} condition", condition.kind()),
    )
}
