//! Sub-filter conditions: the entity must match another filter

use super::{ensure_no_operator, ensure_value_count, unexpected_value, BuildScope, PredicateScope};
use efilter_core::{
    Condition, ConditionDescriptor, ConditionValue, FilterError, FilterId, Predicate, Result,
};
use tracing::warn;

pub(super) fn validate(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    ensure_no_operator(descriptor)?;
    ensure_value_count(descriptor, 0)?;

    let id = FilterId::new(descriptor.reference.clone());
    let sub = scope
        .filters
        .filter(&id)
        .ok_or_else(|| FilterError::config(id.as_str(), "the sub-filter does not exist"))?;
    if sub.entity_type != scope.entity_type {
        return Err(FilterError::config(
            id.as_str(),
            format!(
                "the sub-filter selects '{}' entities, expected '{}'",
                sub.entity_type, scope.entity_type
            ),
        ));
    }
    if &sub.filter_type != scope.filter_type() {
        return Err(FilterError::config(
            id.as_str(),
            format!(
                "the sub-filter is a {} filter, expected {}",
                sub.filter_type,
                scope.filter_type()
            ),
        ));
    }
    Ok(ConditionValue::SubFilter)
}

pub(super) fn predicate(scope: &PredicateScope<'_>, condition: &Condition) -> Result<Predicate> {
    if !matches!(condition.value(), ConditionValue::SubFilter) {
        return Err(unexpected_value(condition));
    }
    let sub = scope.sub_filter(&FilterId::new(condition.reference()))?;
    if sub.entity_type != scope.entity_type {
        warn!(
            sub_filter = %sub.id,
            "sub-filter selects '{}' entities inside a '{}' filter, matching nothing",
            sub.entity_type,
            scope.entity_type
        );
        return Ok(Predicate::Never);
    }
    scope.sub_predicate(&sub)
}
