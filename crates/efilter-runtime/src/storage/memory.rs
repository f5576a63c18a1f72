//! In-memory storage backend
//!
//! Evaluates predicates by scanning records held in memory. Suitable for
//! tests and small embedded data sets.

use super::{EntityId, StorageBackend};
use efilter_core::{Comparison, FieldTarget, FilterError, Predicate, RelatedObject, Result, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use uuid::Uuid;

/// One stored entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub entity_type: String,
    pub fields: HashMap<String, Value>,
    pub custom_fields: HashMap<Uuid, Value>,
    /// `(relation type, object id)` pairs where this entity is the subject
    pub relations: Vec<(String, EntityId)>,
    pub properties: BTreeSet<String>,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            fields: HashMap::new(),
            custom_fields: HashMap::new(),
            relations: Vec::new(),
            properties: BTreeSet::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_custom_field(mut self, id: Uuid, value: impl Into<Value>) -> Self {
        self.custom_fields.insert(id, value.into());
        self
    }

    pub fn with_relation(mut self, relation_type: impl Into<String>, object: impl Into<String>) -> Self {
        self.relations.push((relation_type.into(), object.into()));
        self
    }

    pub fn with_property(mut self, property_type: impl Into<String>) -> Self {
        self.properties.insert(property_type.into());
        self
    }

    fn value(&self, target: &FieldTarget) -> &Value {
        let value = match target {
            FieldTarget::Field(name) => self.fields.get(name),
            FieldTarget::Custom(id) => self.custom_fields.get(id),
        };
        value.unwrap_or(&Value::Null)
    }
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<EntityId, EntityRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record
    pub fn insert(&self, record: EntityRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| FilterError::Storage("record lock poisoned".to_string()))?;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn with_record(self, record: EntityRecord) -> Result<Self> {
        self.insert(record)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn fetch(&self, entity_type: &str, predicate: &Predicate) -> Result<Vec<EntityId>> {
        let records = self
            .records
            .read()
            .map_err(|_| FilterError::Storage("record lock poisoned".to_string()))?;
        Ok(records
            .values()
            .filter(|record| record.entity_type == entity_type)
            .filter(|record| matches(record, predicate, &records))
            .map(|record| record.id.clone())
            .collect())
    }
}

fn matches(
    record: &EntityRecord,
    predicate: &Predicate,
    records: &BTreeMap<EntityId, EntityRecord>,
) -> bool {
    match predicate {
        Predicate::Always => true,
        Predicate::Never => false,
        Predicate::Compare {
            target,
            comparison,
            values,
        } => compare(record.value(target), *comparison, values),
        Predicate::DateRange { target, start, end } => match record.value(target).as_date() {
            Some(date) => {
                start.map_or(true, |start| date >= start) && end.map_or(true, |end| date <= end)
            }
            None => false,
        },
        Predicate::Related {
            relation_type,
            object,
        } => record
            .relations
            .iter()
            .filter(|(kind, _)| kind == relation_type)
            .any(|(_, object_id)| related_matches(object_id, object, records)),
        Predicate::HasProperty(property_type) => record.properties.contains(property_type),
        Predicate::And(items) => items.iter().all(|p| matches(record, p, records)),
        Predicate::Or(items) => items.iter().any(|p| matches(record, p, records)),
        Predicate::Not(inner) => !matches(record, inner, records),
    }
}

fn related_matches(
    object_id: &str,
    object: &RelatedObject,
    records: &BTreeMap<EntityId, EntityRecord>,
) -> bool {
    match object {
        RelatedObject::Any => true,
        RelatedObject::Entity(id) => id == object_id,
        RelatedObject::OfType(entity_type) => records
            .get(object_id)
            .map_or(false, |r| &r.entity_type == entity_type),
        RelatedObject::Matching {
            entity_type,
            predicate,
        } => records.get(object_id).map_or(false, |r| {
            &r.entity_type == entity_type && matches(r, predicate, records)
        }),
    }
}

fn compare(field: &Value, comparison: Comparison, values: &[Value]) -> bool {
    if comparison == Comparison::IsEmpty {
        return field.is_empty_value();
    }
    // Multi-valued fields match when any element does
    if let Value::Array(items) = field {
        return items.iter().any(|item| compare(item, comparison, values));
    }
    if field.is_empty_value() {
        return false;
    }
    match comparison {
        Comparison::Range => match values {
            [low, high] => {
                order(field, low).map_or(false, |o| o != Ordering::Less)
                    && order(field, high).map_or(false, |o| o != Ordering::Greater)
            }
            _ => false,
        },
        _ => values.iter().any(|value| compare_one(field, comparison, value)),
    }
}

fn compare_one(field: &Value, comparison: Comparison, value: &Value) -> bool {
    let text = |v: &Value, fold: bool| {
        v.to_text()
            .map(|t| if fold { t.to_lowercase() } else { t })
    };
    let texts = |fold: bool| match (text(field, fold), text(value, fold)) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    };
    match comparison {
        Comparison::Equals => match (field.as_f64(), value.as_f64()) {
            (Some(a), Some(b)) if matches!(field, Value::Number(_)) => a == b,
            _ => texts(false).map_or(false, |(a, b)| a == b),
        },
        Comparison::IEquals => texts(true).map_or(false, |(a, b)| a == b),
        Comparison::Contains => texts(false).map_or(false, |(a, b)| a.contains(&b)),
        Comparison::IContains => texts(true).map_or(false, |(a, b)| a.contains(&b)),
        Comparison::StartsWith => texts(false).map_or(false, |(a, b)| a.starts_with(&b)),
        Comparison::IStartsWith => texts(true).map_or(false, |(a, b)| a.starts_with(&b)),
        Comparison::EndsWith => texts(false).map_or(false, |(a, b)| a.ends_with(&b)),
        Comparison::IEndsWith => texts(true).map_or(false, |(a, b)| a.ends_with(&b)),
        Comparison::Gt => order(field, value) == Some(Ordering::Greater),
        Comparison::Gte => matches!(order(field, value), Some(Ordering::Greater | Ordering::Equal)),
        Comparison::Lt => order(field, value) == Some(Ordering::Less),
        Comparison::Lte => matches!(order(field, value), Some(Ordering::Less | Ordering::Equal)),
        Comparison::IsEmpty | Comparison::Range => false,
    }
}

/// Numeric order first, then calendar order
fn order(field: &Value, value: &Value) -> Option<Ordering> {
    if let (Value::Number(a), Some(b)) = (field, value.as_f64()) {
        return a.partial_cmp(&b);
    }
    match (field.as_date(), value.as_date()) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => match (field.as_f64(), value.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        for record in [
            EntityRecord::new("c1", "Contact")
                .with_field("last_name", "Ikari")
                .with_field("age", 14.0)
                .with_relation("works_for", "o1"),
            EntityRecord::new("c2", "Contact")
                .with_field("last_name", "Soryu")
                .with_field("age", 28.0)
                .with_property("vip"),
            EntityRecord::new("c3", "Contact").with_field("age", 30.0),
            EntityRecord::new("o1", "Organisation").with_field("name", "Nerv"),
        ] {
            storage.insert(record).unwrap();
        }
        storage
    }

    fn last_name(comparison: Comparison, value: &str) -> Predicate {
        Predicate::compare(
            FieldTarget::Field("last_name".to_string()),
            comparison,
            vec![Value::from(value)],
        )
    }

    #[test]
    fn test_fetch_filters_entity_type() {
        let ids = storage().fetch("Contact", &Predicate::Always).unwrap();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_text_comparisons() {
        let storage = storage();
        assert_eq!(
            storage
                .fetch("Contact", &last_name(Comparison::Contains, "kar"))
                .unwrap(),
            vec!["c1"]
        );
        assert_eq!(
            storage
                .fetch("Contact", &last_name(Comparison::IStartsWith, "sor"))
                .unwrap(),
            vec!["c2"]
        );
        assert!(storage
            .fetch("Contact", &last_name(Comparison::StartsWith, "sor"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_field_only_matches_is_empty() {
        let storage = storage();
        let negated = last_name(Comparison::Equals, "Ikari").negate();
        assert_eq!(storage.fetch("Contact", &negated).unwrap(), vec!["c2", "c3"]);

        let empty = Predicate::compare(
            FieldTarget::Field("last_name".to_string()),
            Comparison::IsEmpty,
            Vec::new(),
        );
        assert_eq!(storage.fetch("Contact", &empty).unwrap(), vec!["c3"]);
    }

    #[test]
    fn test_numeric_range() {
        let range = Predicate::compare(
            FieldTarget::Field("age".to_string()),
            Comparison::Range,
            vec![Value::from(20.0), Value::from(30.0)],
        );
        assert_eq!(storage().fetch("Contact", &range).unwrap(), vec!["c2", "c3"]);
    }

    #[test]
    fn test_related_matching() {
        let storage = storage();
        let nerv = Predicate::compare(
            FieldTarget::Field("name".to_string()),
            Comparison::Equals,
            vec![Value::from("Nerv")],
        );
        let related = Predicate::Related {
            relation_type: "works_for".to_string(),
            object: RelatedObject::Matching {
                entity_type: "Organisation".to_string(),
                predicate: Box::new(nerv),
            },
        };
        assert_eq!(storage.fetch("Contact", &related).unwrap(), vec!["c1"]);
        assert_eq!(
            storage
                .fetch("Contact", &Predicate::HasProperty("vip".to_string()))
                .unwrap(),
            vec!["c2"]
        );
    }
}
