//! Relation conditions
//!
//! A relation condition tests whether the entity is the subject of a
//! relation of some type, optionally narrowed to one object, to objects of
//! one type, or to objects matching another filter.

use super::{
    ensure_no_operator, ensure_value_count, has_flag, unexpected_value, BuildScope,
    PredicateScope,
};
use efilter_core::{
    Condition, ConditionDescriptor, ConditionValue, FilterError, FilterId, Predicate,
    RelatedObject, RelationType, Result, SchemaProvider, Value,
};
use tracing::warn;

pub(super) fn validate_relation(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    relation_type(scope.schema, scope.entity_type, &descriptor.reference)?;
    ensure_no_operator(descriptor)?;
    ensure_value_count(descriptor, 2)?;
    let has = has_flag(descriptor, 0)?;

    let mut entity_id = None;
    let mut entity_type = None;
    match descriptor.values.get(1) {
        None | Some(Value::Null) => {}
        Some(Value::Object(object)) => {
            entity_id = object.get("entity_id").and_then(Value::to_text);
            entity_type = object.get("entity_type").and_then(Value::to_text);
            if entity_id.is_none() && entity_type.is_none() {
                return Err(FilterError::invalid_elements(
                    "relation object needs an 'entity_id' or an 'entity_type'",
                    [descriptor.reference.clone()],
                ));
            }
        }
        Some(other) => {
            return Err(FilterError::invalid_elements(
                format!("unexpected relation object {:?}", other),
                [descriptor.reference.clone()],
            ))
        }
    }
    if let Some(object_type) = &entity_type {
        if !object_compatible(scope.schema, &descriptor.reference, object_type) {
            return Err(FilterError::config(
                &descriptor.reference,
                format!("'{}' cannot be the object of this relation", object_type),
            ));
        }
    }

    Ok(ConditionValue::Relation {
        has,
        entity_id,
        entity_type,
    })
}

pub(super) fn validate_sub_filter(
    scope: &BuildScope<'_>,
    descriptor: &ConditionDescriptor,
) -> Result<ConditionValue> {
    relation_type(scope.schema, scope.entity_type, &descriptor.reference)?;
    ensure_no_operator(descriptor)?;
    let has = has_flag(descriptor, 0)?;
    let filter_id = match descriptor.values.as_slice() {
        [_, id] => id.to_text().map(FilterId::new),
        _ => None,
    }
    .ok_or_else(|| {
        FilterError::invalid_elements(
            "relation sub-filter conditions take [has, filter_id]",
            [descriptor.reference.clone()],
        )
    })?;

    let sub = scope.filters.filter(&filter_id).ok_or_else(|| {
        FilterError::config(filter_id.as_str(), "the sub-filter does not exist")
    })?;
    if !object_compatible(scope.schema, &descriptor.reference, &sub.entity_type) {
        return Err(FilterError::config(
            filter_id.as_str(),
            format!(
                "filters on '{}' cannot be the object of relation '{}'",
                sub.entity_type, descriptor.reference
            ),
        ));
    }
    if &sub.filter_type != scope.filter_type() {
        return Err(FilterError::config(
            filter_id.as_str(),
            format!(
                "the sub-filter is a {} filter, expected {}",
                sub.filter_type,
                scope.filter_type()
            ),
        ));
    }

    Ok(ConditionValue::RelationSubFilter { has, filter_id })
}

pub(super) fn relation_predicate(scope: &PredicateScope<'_>, condition: &Condition) -> Result<Predicate> {
    let ConditionValue::Relation {
        has,
        entity_id,
        entity_type,
    } = condition.value()
    else {
        return Err(unexpected_value(condition));
    };
    relation_type(scope.schema, scope.entity_type, condition.reference())?;
    let object = match (entity_id, entity_type) {
        (Some(id), _) => RelatedObject::Entity(id.clone()),
        (None, Some(object_type)) => RelatedObject::OfType(object_type.clone()),
        (None, None) => RelatedObject::Any,
    };
    Ok(Predicate::Related {
        relation_type: condition.reference().to_string(),
        object,
    }
    .when(*has))
}

pub(super) fn sub_filter_predicate(
    scope: &PredicateScope<'_>,
    condition: &Condition,
) -> Result<Predicate> {
    let ConditionValue::RelationSubFilter { has, filter_id } = condition.value() else {
        return Err(unexpected_value(condition));
    };
    relation_type(scope.schema, scope.entity_type, condition.reference())?;
    let sub = scope.sub_filter(filter_id)?;
    if !object_compatible(scope.schema, condition.reference(), &sub.entity_type) {
        warn!(
            relation_type = condition.reference(),
            sub_filter = %filter_id,
            "sub-filter entity type '{}' is not a valid relation object, matching nothing",
            sub.entity_type
        );
        return Ok(Predicate::Never);
    }

    let related = match scope.sub_predicate(&sub)? {
        Predicate::Never => Predicate::Never,
        Predicate::Always => Predicate::Related {
            relation_type: condition.reference().to_string(),
            object: RelatedObject::OfType(sub.entity_type.clone()),
        },
        nested => Predicate::Related {
            relation_type: condition.reference().to_string(),
            object: RelatedObject::Matching {
                entity_type: sub.entity_type.clone(),
                predicate: Box::new(nested),
            },
        },
    };
    Ok(related.when(*has))
}

/// Relation type usable with `entity_type` as its subject
fn relation_type(
    schema: &dyn SchemaProvider,
    entity_type: &str,
    id: &str,
) -> Result<RelationType> {
    let relation = schema
        .relation_type(id)
        .ok_or_else(|| FilterError::config(id, "unknown relation type"))?;
    if !relation.accepts_subject(entity_type) {
        return Err(FilterError::config(
            id,
            format!("'{}' cannot be the subject of this relation", entity_type),
        ));
    }
    Ok(relation)
}

fn object_compatible(schema: &dyn SchemaProvider, relation_type: &str, entity_type: &str) -> bool {
    schema
        .compatible_types(relation_type)
        .iter()
        .any(|t| t == entity_type)
}
