//! Regular and custom field comparisons

use super::{unexpected_value, BuildScope, PredicateScope};
use efilter_core::{
    Arity, Condition, ConditionDescriptor, ConditionValue, CustomField, CustomFieldKind,
    FieldInfo, FieldKind, FieldTarget, FilterError, Operator, OperatorId, Predicate, Result,
    SchemaProvider, Value,
};
use uuid::Uuid;

const NUMERIC_OPERATORS: &[OperatorId] = &[
    OperatorId::EQUALS,
    OperatorId::EQUALS_NOT,
    OperatorId::GT,
    OperatorId::GTE,
    OperatorId::LT,
    OperatorId::LTE,
    OperatorId::RANGE,
    OperatorId::ISEMPTY,
];

const CHOICE_OPERATORS: &[OperatorId] = &[
    OperatorId::EQUALS,
    OperatorId::EQUALS_NOT,
    OperatorId::ISEMPTY,
];

pub(super) fn validate_regular(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    let field = regular_field(scope.schema, scope.entity_type, &descriptor.reference)?;
    let operator = operator_for(scope, descriptor, field.kind)?;
    let values = check_values(scope, descriptor, operator, Some(&field), field.kind, &[])?;
    Ok(ConditionValue::Field {
        operator: operator.id,
        values,
    })
}

pub(super) fn validate_custom(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    let (_, field) = custom_field(scope.schema, scope.entity_type, &descriptor.reference)?;
    if field.deleted {
        return Err(FilterError::config(
            &descriptor.reference,
            "this custom field has been deleted",
        ));
    }
    if field.kind.is_date() {
        return Err(FilterError::config(
            &descriptor.reference,
            "date custom fields take a date range condition",
        ));
    }

    let kind = field.kind.field_kind();
    let operator = operator_for(scope, descriptor, kind)?;
    let allowed = match field.kind {
        CustomFieldKind::Integer | CustomFieldKind::Float => Some(NUMERIC_OPERATORS),
        CustomFieldKind::Bool | CustomFieldKind::Enum | CustomFieldKind::MultiEnum => {
            Some(CHOICE_OPERATORS)
        }
        _ => None,
    };
    if allowed.map_or(false, |ids| !ids.contains(&operator.id)) {
        return Err(FilterError::config(
            field.name.as_str(),
            format!(
                "operator '{}' cannot be used on {:?} custom fields",
                operator.name, field.kind
            ),
        ));
    }

    let values = check_values(scope, descriptor, operator, None, kind, &field.choices)?;
    Ok(ConditionValue::Field {
        operator: operator.id,
        values,
    })
}

pub(super) fn regular_predicate(scope: &PredicateScope<'_>, condition: &Condition) -> Result<Predicate> {
    let ConditionValue::Field { operator, values } = condition.value() else {
        return Err(unexpected_value(condition));
    };
    regular_field(scope.schema, scope.entity_type, condition.reference())?;
    let operator = stored_operator(scope, condition, *operator)?;
    Ok(operator.build(
        FieldTarget::Field(condition.reference().to_string()),
        scope.resolve_values(values),
    ))
}

pub(super) fn custom_predicate(scope: &PredicateScope<'_>, condition: &Condition) -> Result<Predicate> {
    let ConditionValue::Field { operator, values } = condition.value() else {
        return Err(unexpected_value(condition));
    };
    // Soft-deleted custom fields keep evaluating
    let (id, _) = custom_field(scope.schema, scope.entity_type, condition.reference())?;
    let operator = stored_operator(scope, condition, *operator)?;
    Ok(operator.build(FieldTarget::Custom(id), scope.resolve_values(values)))
}

/// Filterable regular field of `entity_type`
pub(super) fn regular_field(
    schema: &dyn SchemaProvider,
    entity_type: &str,
    name: &str,
) -> Result<FieldInfo> {
    let field = schema.field(entity_type, name).ok_or_else(|| {
        FilterError::config(name, format!("'{}' has no such field", entity_type))
    })?;
    if !field.is_filterable() {
        return Err(FilterError::config(name, "this field is not filterable"));
    }
    Ok(field)
}

/// Custom field of `entity_type` named by its uuid reference, deleted ones included
pub(super) fn custom_field(
    schema: &dyn SchemaProvider,
    entity_type: &str,
    reference: &str,
) -> Result<(Uuid, CustomField)> {
    let id = Uuid::parse_str(reference)
        .map_err(|_| FilterError::config(reference, "not a custom field identifier"))?;
    let field = schema
        .custom_field(&id)
        .ok_or_else(|| FilterError::config(reference, "unknown custom field"))?;
    if field.entity_type != entity_type {
        return Err(FilterError::config(
            field.name.as_str(),
            format!("custom field belongs to '{}', not '{}'", field.entity_type, entity_type),
        ));
    }
    Ok((id, field))
}

fn operator_for<'s>(
    scope: &'s BuildScope<'_>,
    descriptor: &ConditionDescriptor,
    kind: FieldKind,
) -> Result<&'s Operator> {
    let id = descriptor.operator.ok_or_else(|| {
        FilterError::invalid_elements(
            "field conditions need an operator",
            [descriptor.reference.clone()],
        )
    })?;
    let operator = scope.operators.get(id).ok_or_else(|| {
        FilterError::invalid_elements(
            format!("unknown operator {}", id),
            [descriptor.reference.clone()],
        )
    })?;
    if !operator.accepts(kind) {
        return Err(FilterError::config(
            &descriptor.reference,
            format!(
                "operator '{}' cannot be used on {} fields",
                operator.name,
                kind.name()
            ),
        ));
    }
    Ok(operator)
}

fn stored_operator<'s>(
    scope: &'s PredicateScope<'_>,
    condition: &Condition,
    id: OperatorId,
) -> Result<&'s Operator> {
    scope
        .catalogs
        .operators
        .get(id)
        .ok_or_else(|| FilterError::config(condition.reference(), format!("unknown operator {}", id)))
}

fn check_values(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
    operator: &Operator,
    field: Option<&FieldInfo>,
    kind: FieldKind,
    choices: &[String],
) -> Result<Vec<Value>> {
    let reference = descriptor.reference.as_str();
    let invalid = |message: String| FilterError::invalid_elements(message, [reference]);

    if !operator.arity.accepts(descriptor.values.len()) {
        return Err(invalid(format!(
            "operator '{}' expects {}, got {} value(s)",
            operator.name,
            describe_arity(operator.arity),
            descriptor.values.len()
        )));
    }
    if operator.arity == Arity::Flag {
        let flag = descriptor.values[0]
            .as_bool()
            .ok_or_else(|| invalid(format!("operator '{}' expects a boolean", operator.name)))?;
        return Ok(vec![Value::Bool(flag)]);
    }

    let mut values = Vec::with_capacity(descriptor.values.len());
    for value in &descriptor.values {
        if let Some(operand) = scope.operand(value, reference)? {
            let accepted = operator.arity == Arity::AtLeastOne
                && field.map_or(false, |field| operand.accepts(field));
            if !accepted {
                return Err(invalid(format!(
                    "operand '{}' cannot be used with operator '{}' here",
                    operand.name, operator.name
                )));
            }
            values.push(value.clone());
            continue;
        }
        let cast = cast_value(value, kind).ok_or_else(|| {
            invalid(format!(
                "{} value {:?} is not a valid {}",
                value.type_name(),
                value,
                kind.name()
            ))
        })?;
        if !choices.is_empty() {
            let known = cast
                .as_str()
                .map_or(false, |choice| choices.iter().any(|c| c == choice));
            if !known {
                return Err(invalid(format!("{:?} is not a known choice", cast)));
            }
        }
        values.push(cast);
    }

    if operator.id == OperatorId::RANGE && range_is_reversed(&values, kind) {
        return Err(invalid("range lower bound is above its upper bound".to_string()));
    }
    Ok(values)
}

fn cast_value(value: &Value, kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::String | FieldKind::Reference => value.to_text().map(Value::String),
        FieldKind::Number => value.as_f64().map(Value::Number),
        FieldKind::Boolean => value.as_bool().map(Value::Bool),
        FieldKind::Date => value
            .as_date()
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string())),
        FieldKind::File => None,
    }
}

fn range_is_reversed(values: &[Value], kind: FieldKind) -> bool {
    match (values, kind) {
        ([low, high], FieldKind::Number) => match (low.as_f64(), high.as_f64()) {
            (Some(low), Some(high)) => low > high,
            _ => false,
        },
        ([low, high], FieldKind::Date) => match (low.as_date(), high.as_date()) {
            (Some(low), Some(high)) => low > high,
            _ => false,
        },
        _ => false,
    }
}

fn describe_arity(arity: Arity) -> String {
    match arity {
        Arity::AtLeastOne => "at least one value".to_string(),
        Arity::Exactly(1) => "exactly one value".to_string(),
        Arity::Exactly(n) => format!("exactly {} values", n),
        Arity::Flag => "a boolean flag".to_string(),
    }
}
