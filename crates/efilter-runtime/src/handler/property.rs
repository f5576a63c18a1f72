//! Property conditions

use super::{
    ensure_no_operator, ensure_value_count, has_flag, unexpected_value, BuildScope,
    PredicateScope,
};
use efilter_core::{
    Condition, ConditionDescriptor, ConditionValue, FilterError, Predicate, Result,
    SchemaProvider,
};

pub(super) fn validate(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    check_property_type(scope.schema, scope.entity_type, &descriptor.reference)?;
    ensure_no_operator(descriptor)?;
    ensure_value_count(descriptor, 1)?;
    let has = has_flag(descriptor, 0)?;
    Ok(ConditionValue::Property { has })
}

pub(super) fn predicate(scope: &PredicateScope<'_>, condition: &Condition) -> Result<Predicate> {
    let ConditionValue::Property { has } = condition.value() else {
        return Err(unexpected_value(condition));
    };
    check_property_type(scope.schema, scope.entity_type, condition.reference())?;
    Ok(Predicate::HasProperty(condition.reference().to_string()).when(*has))
}

fn check_property_type(schema: &dyn SchemaProvider, entity_type: &str, id: &str) -> Result<()> {
    let property = schema
        .property_type(id)
        .ok_or_else(|| FilterError::config(id, "unknown property type"))?;
    if !property.accepts(entity_type) {
        return Err(FilterError::config(
            id,
            format!("'{}' entities cannot carry this property", entity_type),
        ));
    }
    Ok(())
}
