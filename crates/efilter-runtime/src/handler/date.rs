//! Date range conditions on regular and custom date fields
//!
//! Named ranges are stored by name and only turned into bounds when a
//! predicate is built, using the day of the evaluation context.

use super::field::{custom_field, regular_field};
use super::{ensure_no_operator, unexpected_value, BuildScope, PredicateScope};
use chrono::NaiveDate;
use efilter_core::{
    Comparison, Condition, ConditionDescriptor, ConditionValue, DateRange, FieldKind,
    FieldTarget, FilterError, NamedRange, Predicate, ResolvedRange, Result, Value,
};

pub(super) fn validate_regular(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    let field = regular_field(scope.schema, scope.entity_type, &descriptor.reference)?;
    if field.kind != FieldKind::Date {
        return Err(FilterError::config(
            &descriptor.reference,
            format!("expected a date field, found a {} field", field.kind.name()),
        ));
    }
    ensure_no_operator(descriptor)?;
    parse_range(descriptor).map(ConditionValue::Date)
}

pub(super) fn validate_custom(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    let (_, field) = custom_field(scope.schema, scope.entity_type, &descriptor.reference)?;
    if field.deleted {
        return Err(FilterError::config(
            field.name.as_str(),
            "this custom field has been deleted",
        ));
    }
    if !field.kind.is_date() {
        return Err(FilterError::config(
            field.name.as_str(),
            format!("expected a date custom field, found {:?}", field.kind),
        ));
    }
    ensure_no_operator(descriptor)?;
    parse_range(descriptor).map(ConditionValue::Date)
}

pub(super) fn regular_predicate(scope: &PredicateScope<'_>, condition: &Condition) -> Result<Predicate> {
    let ConditionValue::Date(range) = condition.value() else {
        return Err(unexpected_value(condition));
    };
    regular_field(scope.schema, scope.entity_type, condition.reference())?;
    range_predicate(
        scope,
        condition,
        FieldTarget::Field(condition.reference().to_string()),
        range,
    )
}

pub(super) fn custom_predicate(scope: &PredicateScope<'_>, condition: &Condition) -> Result<Predicate> {
    let ConditionValue::Date(range) = condition.value() else {
        return Err(unexpected_value(condition));
    };
    let (id, _) = custom_field(scope.schema, scope.entity_type, condition.reference())?;
    range_predicate(scope, condition, FieldTarget::Custom(id), range)
}

fn range_predicate(
    scope: &PredicateScope<'_>,
    condition: &Condition,
    target: FieldTarget,
    range: &DateRange,
) -> Result<Predicate> {
    let resolved = range.resolve(scope.context.today()).ok_or_else(|| {
        FilterError::config(condition.reference(), "date range falls outside the calendar")
    })?;
    Ok(match resolved {
        ResolvedRange::Between(start, end) => Predicate::DateRange { target, start, end },
        ResolvedRange::Empty(empty) => {
            Predicate::compare(target, Comparison::IsEmpty, Vec::new()).when(empty)
        }
    })
}

/// `[named_range]` or `[start, end]` with `null`/`""` for an open bound
fn parse_range(descriptor: &ConditionDescriptor) -> Result<DateRange> {
    let invalid = |message: &str| {
        FilterError::invalid_elements(message, [descriptor.reference.clone()])
    };
    match descriptor.values.as_slice() {
        [name] => {
            let name = name.as_str().ok_or_else(|| invalid("named range must be a string"))?;
            NamedRange::from_name(name)
                .map(DateRange::Named)
                .ok_or_else(|| invalid(&format!("unknown date range '{}'", name)))
        }
        [start, end] => {
            let start = bound(start).ok_or_else(|| invalid("invalid start date"))?;
            let end = bound(end).ok_or_else(|| invalid("invalid end date"))?;
            match (start, end) {
                (None, None) => Err(invalid("a date range needs at least one bound")),
                (Some(start), Some(end)) if start > end => {
                    Err(invalid("start date is after end date"))
                }
                (start, end) => Ok(DateRange::between(start, end)),
            }
        }
        _ => Err(invalid("date conditions take a named range or two bounds")),
    }
}

/// `Some(None)` for an open bound, `None` for garbage
fn bound(value: &Value) -> Option<Option<NaiveDate>> {
    match value {
        Value::Null => Some(None),
        Value::String(s) if s.trim().is_empty() => Some(None),
        other => other.as_date().map(Some),
    }
}
