//! In-memory schema provider
//!
//! Holds entity types, custom fields, relation types and property types in
//! memory. The storage layer normally provides this view; the in-memory
//! version backs tests and embedded setups, and can be altered at runtime to
//! mimic schema migrations.

use efilter_core::{CustomField, FieldInfo, PropertyType, RelationType, SchemaProvider};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct SchemaState {
    entity_types: BTreeMap<String, BTreeMap<String, FieldInfo>>,
    custom_fields: HashMap<Uuid, CustomField>,
    relation_types: BTreeMap<String, RelationType>,
    property_types: BTreeMap<String, PropertyType>,
}

/// Mutable in-memory [`SchemaProvider`]
#[derive(Debug, Default)]
pub struct MemorySchema {
    state: RwLock<SchemaState>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity type with its regular fields
    pub fn with_entity_type(
        self,
        entity_type: impl Into<String>,
        fields: impl IntoIterator<Item = FieldInfo>,
    ) -> Self {
        self.write()
            .entity_types
            .entry(entity_type.into())
            .or_default()
            .extend(fields.into_iter().map(|f| (f.name.clone(), f)));
        self
    }

    pub fn with_custom_field(self, field: CustomField) -> Self {
        self.add_custom_field(field);
        self
    }

    pub fn with_relation_type(self, relation: RelationType) -> Self {
        self.write()
            .relation_types
            .insert(relation.id.clone(), relation);
        self
    }

    pub fn with_property_type(self, property: PropertyType) -> Self {
        self.write()
            .property_types
            .insert(property.id.clone(), property);
        self
    }

    pub fn add_custom_field(&self, field: CustomField) {
        self.write().custom_fields.insert(field.id, field);
    }

    /// Drop a regular field; returns false if it did not exist
    pub fn remove_field(&self, entity_type: &str, name: &str) -> bool {
        self.write()
            .entity_types
            .get_mut(entity_type)
            .map_or(false, |fields| fields.remove(name).is_some())
    }

    /// Soft-delete a custom field; it keeps its identity
    pub fn soft_delete_custom_field(&self, id: &Uuid) -> bool {
        match self.write().custom_fields.get_mut(id) {
            Some(field) => {
                field.deleted = true;
                true
            }
            None => false,
        }
    }

    /// Hard-delete a custom field
    pub fn remove_custom_field(&self, id: &Uuid) -> bool {
        self.write().custom_fields.remove(id).is_some()
    }

    pub fn remove_relation_type(&self, id: &str) -> bool {
        self.write().relation_types.remove(id).is_some()
    }

    pub fn remove_property_type(&self, id: &str) -> bool {
        self.write().property_types.remove(id).is_some()
    }

    pub fn entity_types(&self) -> Vec<String> {
        self.read().entity_types.keys().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, SchemaState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SchemaState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SchemaProvider for MemorySchema {
    fn has_entity_type(&self, entity_type: &str) -> bool {
        self.read().entity_types.contains_key(entity_type)
    }

    fn field(&self, entity_type: &str, name: &str) -> Option<FieldInfo> {
        self.read()
            .entity_types
            .get(entity_type)
            .and_then(|fields| fields.get(name))
            .cloned()
    }

    fn custom_field(&self, id: &Uuid) -> Option<CustomField> {
        self.read().custom_fields.get(id).cloned()
    }

    fn relation_type(&self, id: &str) -> Option<RelationType> {
        self.read().relation_types.get(id).cloned()
    }

    fn property_type(&self, id: &str) -> Option<PropertyType> {
        self.read().property_types.get(id).cloned()
    }

    fn compatible_types(&self, relation_type: &str) -> Vec<String> {
        let state = self.read();
        match state.relation_types.get(relation_type) {
            Some(relation) => state
                .entity_types
                .keys()
                .filter(|entity_type| relation.accepts_object(entity_type))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efilter_core::FieldKind;

    fn schema() -> MemorySchema {
        MemorySchema::new()
            .with_entity_type(
                "Contact",
                [
                    FieldInfo::new("last_name", FieldKind::String),
                    FieldInfo::new("image", FieldKind::File),
                ],
            )
            .with_entity_type("Organisation", [FieldInfo::new("name", FieldKind::String)])
            .with_entity_type("Invoice", [])
            .with_relation_type(
                RelationType::new("works_for")
                    .with_subjects(["Contact"])
                    .with_objects(["Organisation"]),
            )
            .with_relation_type(RelationType::new("linked"))
    }

    #[test]
    fn test_field_lookup() {
        let schema = schema();
        assert!(schema.has_entity_type("Contact"));
        assert!(!schema.has_entity_type("Ship"));
        assert_eq!(
            schema.field("Contact", "last_name").map(|f| f.kind),
            Some(FieldKind::String)
        );
        assert!(schema.field("Organisation", "last_name").is_none());
    }

    #[test]
    fn test_compatible_types() {
        let schema = schema();
        assert_eq!(schema.compatible_types("works_for"), vec!["Organisation"]);
        assert_eq!(
            schema.compatible_types("linked"),
            vec!["Contact", "Invoice", "Organisation"]
        );
        assert!(schema.compatible_types("unknown").is_empty());
    }

    #[test]
    fn test_remove_field() {
        let schema = schema();
        assert!(schema.remove_field("Contact", "last_name"));
        assert!(!schema.remove_field("Contact", "last_name"));
        assert!(schema.field("Contact", "last_name").is_none());
    }
}
