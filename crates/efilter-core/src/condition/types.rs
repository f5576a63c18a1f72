//! Condition types

use super::date_range::DateRange;
use crate::filter::FilterId;
use crate::operator::OperatorId;
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Discriminant selecting how a condition is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum HandlerKind {
    SubFilter,
    RegularField,
    DateRegularField,
    Relation,
    RelationSubFilter,
    Property,
    CustomField,
    DateCustomField,
    /// Kind registered by an extension
    Other(u16),
}

impl HandlerKind {
    /// All built-in kinds
    pub const BUILTIN: [HandlerKind; 8] = [
        HandlerKind::SubFilter,
        HandlerKind::RegularField,
        HandlerKind::DateRegularField,
        HandlerKind::Relation,
        HandlerKind::RelationSubFilter,
        HandlerKind::Property,
        HandlerKind::CustomField,
        HandlerKind::DateCustomField,
    ];

    pub fn id(&self) -> u16 {
        match self {
            HandlerKind::SubFilter => 1,
            HandlerKind::RegularField => 5,
            HandlerKind::DateRegularField => 6,
            HandlerKind::Relation => 10,
            HandlerKind::RelationSubFilter => 11,
            HandlerKind::Property => 15,
            HandlerKind::CustomField => 20,
            HandlerKind::DateCustomField => 21,
            HandlerKind::Other(id) => *id,
        }
    }

    /// True for kinds whose conditions point at another filter
    pub fn references_filter(&self) -> bool {
        matches!(self, HandlerKind::SubFilter | HandlerKind::RelationSubFilter)
    }
}

impl From<u16> for HandlerKind {
    fn from(id: u16) -> Self {
        match id {
            1 => HandlerKind::SubFilter,
            5 => HandlerKind::RegularField,
            6 => HandlerKind::DateRegularField,
            10 => HandlerKind::Relation,
            11 => HandlerKind::RelationSubFilter,
            15 => HandlerKind::Property,
            20 => HandlerKind::CustomField,
            21 => HandlerKind::DateCustomField,
            other => HandlerKind::Other(other),
        }
    }
}

impl From<HandlerKind> for u16 {
    fn from(kind: HandlerKind) -> Self {
        kind.id()
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::SubFilter => f.write_str("sub_filter"),
            HandlerKind::RegularField => f.write_str("regular_field"),
            HandlerKind::DateRegularField => f.write_str("date_regular_field"),
            HandlerKind::Relation => f.write_str("relation"),
            HandlerKind::RelationSubFilter => f.write_str("relation_sub_filter"),
            HandlerKind::Property => f.write_str("property"),
            HandlerKind::CustomField => f.write_str("custom_field"),
            HandlerKind::DateCustomField => f.write_str("date_custom_field"),
            HandlerKind::Other(id) => write!(f, "kind_{}", id),
        }
    }
}

/// Structured value of a condition; its shape is dictated by the kind
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// Regular or custom field comparison; values may hold operand type ids
    Field {
        operator: OperatorId,
        values: Vec<Value>,
    },
    /// Regular or custom date field range
    Date(DateRange),
    Relation {
        has: bool,
        entity_id: Option<String>,
        entity_type: Option<String>,
    },
    RelationSubFilter {
        has: bool,
        filter_id: FilterId,
    },
    Property {
        has: bool,
    },
    /// The referenced filter is the condition reference
    SubFilter,
    /// Payload of an extension kind
    Raw(serde_json::Value),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldPayload {
    operator: OperatorId,
    values: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationPayload {
    has: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entity_type: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationSubFilterPayload {
    has: bool,
    filter_id: FilterId,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyPayload {
    has: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyPayload {}

impl ConditionValue {
    /// Returns true if this payload is the one `kind` requires
    pub fn matches_kind(&self, kind: HandlerKind) -> bool {
        matches!(
            (kind, self),
            (HandlerKind::RegularField | HandlerKind::CustomField, ConditionValue::Field { .. })
                | (
                    HandlerKind::DateRegularField | HandlerKind::DateCustomField,
                    ConditionValue::Date(_)
                )
                | (HandlerKind::Relation, ConditionValue::Relation { .. })
                | (HandlerKind::RelationSubFilter, ConditionValue::RelationSubFilter { .. })
                | (HandlerKind::Property, ConditionValue::Property { .. })
                | (HandlerKind::SubFilter, ConditionValue::SubFilter)
                | (HandlerKind::Other(_), ConditionValue::Raw(_))
        )
    }

    /// Decode the persisted payload of a `kind` condition
    pub fn decode(kind: HandlerKind, raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let value = match kind {
            HandlerKind::RegularField | HandlerKind::CustomField => {
                let p: FieldPayload = serde_json::from_value(raw)?;
                ConditionValue::Field {
                    operator: p.operator,
                    values: p.values,
                }
            }
            HandlerKind::DateRegularField | HandlerKind::DateCustomField => {
                ConditionValue::Date(serde_json::from_value(raw)?)
            }
            HandlerKind::Relation => {
                let p: RelationPayload = serde_json::from_value(raw)?;
                ConditionValue::Relation {
                    has: p.has,
                    entity_id: p.entity_id,
                    entity_type: p.entity_type,
                }
            }
            HandlerKind::RelationSubFilter => {
                let p: RelationSubFilterPayload = serde_json::from_value(raw)?;
                ConditionValue::RelationSubFilter {
                    has: p.has,
                    filter_id: p.filter_id,
                }
            }
            HandlerKind::Property => {
                let p: PropertyPayload = serde_json::from_value(raw)?;
                ConditionValue::Property { has: p.has }
            }
            HandlerKind::SubFilter => {
                let _: EmptyPayload = serde_json::from_value(raw)?;
                ConditionValue::SubFilter
            }
            HandlerKind::Other(_) => ConditionValue::Raw(raw),
        };
        Ok(value)
    }

    /// Persisted form of the payload
    pub fn encode(&self) -> serde_json::Value {
        let encoded = match self {
            ConditionValue::Field { operator, values } => serde_json::to_value(FieldPayload {
                operator: *operator,
                values: values.clone(),
            }),
            ConditionValue::Date(range) => serde_json::to_value(range),
            ConditionValue::Relation {
                has,
                entity_id,
                entity_type,
            } => serde_json::to_value(RelationPayload {
                has: *has,
                entity_id: entity_id.clone(),
                entity_type: entity_type.clone(),
            }),
            ConditionValue::RelationSubFilter { has, filter_id } => {
                serde_json::to_value(RelationSubFilterPayload {
                    has: *has,
                    filter_id: filter_id.clone(),
                })
            }
            ConditionValue::Property { has } => serde_json::to_value(PropertyPayload { has: *has }),
            ConditionValue::SubFilter => serde_json::to_value(EmptyPayload {}),
            ConditionValue::Raw(raw) => Ok(raw.clone()),
        };
        // plain data structs; serialization cannot fail
        encoded.unwrap_or(serde_json::Value::Null)
    }
}

/// One atomic test of an entity filter
///
/// The payload always matches the handler kind; conditions are only created
/// through [`Condition::new`] or by decoding a stored condition, which both
/// enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredCondition", into = "StoredCondition")]
pub struct Condition {
    kind: HandlerKind,
    reference: String,
    value: ConditionValue,
}

impl Condition {
    pub fn new(
        kind: HandlerKind,
        reference: impl Into<String>,
        value: ConditionValue,
    ) -> crate::Result<Self> {
        let reference = reference.into();
        if !value.matches_kind(kind) {
            return Err(crate::FilterError::invalid_elements(
                format!("value shape does not match condition kind {}", kind),
                [reference],
            ));
        }
        Ok(Self {
            kind,
            reference,
            value,
        })
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Field name, custom field uuid, relation/property type id or sub-filter id
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn value(&self) -> &ConditionValue {
        &self.value
    }

    /// Filter referenced by a sub-filter or relation sub-filter condition
    pub fn sub_filter_id(&self) -> Option<FilterId> {
        match (&self.kind, &self.value) {
            (HandlerKind::SubFilter, _) => Some(FilterId::new(self.reference.clone())),
            (_, ConditionValue::RelationSubFilter { filter_id, .. }) => Some(filter_id.clone()),
            _ => None,
        }
    }

    /// Custom field identity for custom field conditions
    pub fn custom_field_id(&self) -> Option<Uuid> {
        match self.kind {
            HandlerKind::CustomField | HandlerKind::DateCustomField => {
                Uuid::parse_str(&self.reference).ok()
            }
            _ => None,
        }
    }

    /// Descriptor that rebuilds this condition; `None` for extension payloads
    pub fn descriptor(&self) -> Option<ConditionDescriptor> {
        let (operator, values) = match &self.value {
            ConditionValue::Field { operator, values } => (Some(*operator), values.clone()),
            ConditionValue::Date(range) => (None, range_values(range)),
            ConditionValue::Relation {
                has,
                entity_id,
                entity_type,
            } => {
                let mut target = HashMap::new();
                if let Some(id) = entity_id {
                    target.insert("entity_id".to_string(), Value::String(id.clone()));
                }
                if let Some(entity_type) = entity_type {
                    target.insert("entity_type".to_string(), Value::String(entity_type.clone()));
                }
                let mut values = vec![Value::Bool(*has)];
                if !target.is_empty() {
                    values.push(Value::Object(target));
                }
                (None, values)
            }
            ConditionValue::RelationSubFilter { has, filter_id } => (
                None,
                vec![Value::Bool(*has), Value::String(filter_id.to_string())],
            ),
            ConditionValue::Property { has } => (None, vec![Value::Bool(*has)]),
            ConditionValue::SubFilter => (None, Vec::new()),
            ConditionValue::Raw(_) => return None,
        };
        Some(ConditionDescriptor::new(
            self.kind,
            self.reference.clone(),
            operator,
            values,
        ))
    }
}

/// Persisted shape: `{kind, ref, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCondition {
    pub kind: u16,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl TryFrom<StoredCondition> for Condition {
    type Error = String;

    fn try_from(stored: StoredCondition) -> Result<Self, Self::Error> {
        let kind = HandlerKind::from(stored.kind);
        // `{}` and missing values both mean "no payload" for sub-filters
        let raw = match (kind, stored.value) {
            (HandlerKind::SubFilter, serde_json::Value::Null) => serde_json::json!({}),
            (_, raw) => raw,
        };
        let value = ConditionValue::decode(kind, raw)
            .map_err(|e| format!("invalid value for {} condition '{}': {}", kind, stored.reference, e))?;
        Ok(Condition {
            kind,
            reference: stored.reference,
            value,
        })
    }
}

impl From<Condition> for StoredCondition {
    fn from(condition: Condition) -> Self {
        StoredCondition {
            kind: condition.kind.id(),
            value: condition.value.encode(),
            reference: condition.reference,
        }
    }
}

/// Raw build request for one condition
///
/// Value grammar per kind:
/// - `RegularField` / `CustomField`: operator required, one or more values
/// - `DateRegularField` / `DateCustomField`: `[named_range]` or `[start, end]`
///   (`null` or `""` for an open bound)
/// - `Relation`: `[has]` or `[has, {"entity_id": ..}]` / `[has, {"entity_type": ..}]`
/// - `RelationSubFilter`: `[has, filter_id]`
/// - `Property`: `[has]`
/// - `SubFilter`: no values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDescriptor {
    pub kind: HandlerKind,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<OperatorId>,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl ConditionDescriptor {
    pub fn new(
        kind: HandlerKind,
        reference: impl Into<String>,
        operator: Option<OperatorId>,
        values: Vec<Value>,
    ) -> Self {
        Self {
            kind,
            reference: reference.into(),
            operator,
            values,
        }
    }

    pub fn regular_field<I, V>(field: impl Into<String>, operator: OperatorId, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            HandlerKind::RegularField,
            field,
            Some(operator),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn date_field(field: impl Into<String>, range: &DateRange) -> Self {
        Self::new(HandlerKind::DateRegularField, field, None, range_values(range))
    }

    pub fn custom_field<I, V>(custom_field: Uuid, operator: OperatorId, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            HandlerKind::CustomField,
            custom_field.to_string(),
            Some(operator),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn date_custom_field(custom_field: Uuid, range: &DateRange) -> Self {
        Self::new(
            HandlerKind::DateCustomField,
            custom_field.to_string(),
            None,
            range_values(range),
        )
    }

    pub fn relation(relation_type: impl Into<String>, has: bool) -> Self {
        Self::new(HandlerKind::Relation, relation_type, None, vec![Value::Bool(has)])
    }

    pub fn relation_to_entity(
        relation_type: impl Into<String>,
        has: bool,
        entity_id: impl Into<String>,
    ) -> Self {
        let target = HashMap::from([("entity_id".to_string(), Value::String(entity_id.into()))]);
        Self::new(
            HandlerKind::Relation,
            relation_type,
            None,
            vec![Value::Bool(has), Value::Object(target)],
        )
    }

    pub fn relation_to_type(
        relation_type: impl Into<String>,
        has: bool,
        entity_type: impl Into<String>,
    ) -> Self {
        let target =
            HashMap::from([("entity_type".to_string(), Value::String(entity_type.into()))]);
        Self::new(
            HandlerKind::Relation,
            relation_type,
            None,
            vec![Value::Bool(has), Value::Object(target)],
        )
    }

    pub fn relation_sub_filter(
        relation_type: impl Into<String>,
        has: bool,
        filter_id: impl Into<String>,
    ) -> Self {
        Self::new(
            HandlerKind::RelationSubFilter,
            relation_type,
            None,
            vec![Value::Bool(has), Value::String(filter_id.into())],
        )
    }

    pub fn property(property_type: impl Into<String>, has: bool) -> Self {
        Self::new(HandlerKind::Property, property_type, None, vec![Value::Bool(has)])
    }

    pub fn sub_filter(filter_id: impl Into<String>) -> Self {
        Self::new(HandlerKind::SubFilter, filter_id, None, Vec::new())
    }
}

fn range_values(range: &DateRange) -> Vec<Value> {
    let day = |d: &Option<chrono::NaiveDate>| match d {
        Some(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        None => Value::Null,
    };
    match range {
        DateRange::Named(named) => vec![Value::String(named.name().to_string())],
        DateRange::Custom { start, end } => vec![day(start), day(end)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::NamedRange;

    #[test]
    fn test_handler_kind_ids() {
        for kind in HandlerKind::BUILTIN {
            assert_eq!(HandlerKind::from(kind.id()), kind);
        }
        assert_eq!(HandlerKind::from(99), HandlerKind::Other(99));
    }

    #[test]
    fn test_property_value_never_carries_operator() {
        let stored = StoredCondition {
            kind: HandlerKind::Property.id(),
            reference: "is_vip".to_string(),
            value: serde_json::json!({"has": true, "operator": 1}),
        };
        assert!(Condition::try_from(stored).is_err());
    }

    #[test]
    fn test_descriptor_rebuilds_stored_values() {
        let relation = Condition::new(
            HandlerKind::RelationSubFilter,
            "works_for",
            ConditionValue::RelationSubFilter {
                has: false,
                filter_id: FilterId::new("orgs"),
            },
        )
        .unwrap();
        assert_eq!(
            relation.descriptor(),
            Some(ConditionDescriptor::relation_sub_filter("works_for", false, "orgs"))
        );

        let range = DateRange::named(NamedRange::CurrentYear);
        let date = Condition::new(
            HandlerKind::DateRegularField,
            "birthday",
            ConditionValue::Date(range.clone()),
        )
        .unwrap();
        assert_eq!(date.descriptor(), Some(ConditionDescriptor::date_field("birthday", &range)));

        let raw = Condition::new(
            HandlerKind::Other(99),
            "score",
            ConditionValue::Raw(serde_json::json!({"min": 1})),
        )
        .unwrap();
        assert_eq!(raw.descriptor(), None);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let result = Condition::new(
            HandlerKind::Property,
            "is_vip",
            ConditionValue::Field {
                operator: OperatorId::EQUALS,
                values: vec![],
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_condition_persisted_shape() {
        let condition = Condition::new(
            HandlerKind::RegularField,
            "last_name",
            ConditionValue::Field {
                operator: OperatorId::CONTAINS,
                values: vec![Value::from("Ikari")],
            },
        )
        .unwrap();

        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": 5, "ref": "last_name", "value": {"operator": 5, "values": ["Ikari"]}})
        );

        let back: Condition = serde_json::from_value(json).unwrap();
        assert_eq!(back, condition);
    }

    #[test]
    fn test_sub_filter_references() {
        let sub: Condition =
            serde_json::from_value(serde_json::json!({"kind": 1, "ref": "f1"})).unwrap();
        assert_eq!(sub.sub_filter_id(), Some(FilterId::new("f1")));

        let rel: Condition = serde_json::from_value(serde_json::json!({
            "kind": 11, "ref": "employed_by", "value": {"has": true, "filter_id": "orgs"}
        }))
        .unwrap();
        assert_eq!(rel.sub_filter_id(), Some(FilterId::new("orgs")));
    }

    #[test]
    fn test_descriptor_date_values() {
        let d = ConditionDescriptor::date_field("birthday", &DateRange::named(NamedRange::Today));
        assert_eq!(d.values, vec![Value::from("today")]);

        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1);
        let d = ConditionDescriptor::date_field("birthday", &DateRange::between(start, None));
        assert_eq!(d.values, vec![Value::from("2024-01-01"), Value::Null]);
    }
}
