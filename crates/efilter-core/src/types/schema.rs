//! Schema descriptions consumed from the storage layer
//!
//! The storage layer owns the entity models. The filter engine only needs to
//! know which fields exist, their kind, whether they are filterable, and which
//! custom fields, relation types and property types are available.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity type of user records; reference fields pointing at it accept the
/// current-user operand.
pub const USER_ENTITY_TYPE: &str = "User";

/// Kind of a regular entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Date,
    Reference,
    Boolean,
    File,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Reference => "reference",
            FieldKind::Boolean => "boolean",
            FieldKind::File => "file",
        }
    }
}

/// Description of a regular field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name
    pub name: String,

    /// Field kind
    pub kind: FieldKind,

    /// Whether conditions may be built on this field
    #[serde(default = "default_filterable")]
    pub filterable: bool,

    /// Target entity type for reference fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
}

fn default_filterable() -> bool {
    true
}

impl FieldInfo {
    /// Create a new filterable field
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            // binary payloads are never filterable
            filterable: kind != FieldKind::File,
            related_type: None,
        }
    }

    /// Create a reference field pointing at `related_type`
    pub fn reference(name: impl Into<String>, related_type: impl Into<String>) -> Self {
        Self {
            related_type: Some(related_type.into()),
            ..Self::new(name, FieldKind::Reference)
        }
    }

    /// Mark the field as not filterable
    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    /// True if the field is usable in a condition
    pub fn is_filterable(&self) -> bool {
        self.filterable && self.kind != FieldKind::File
    }
}

/// Underlying type of a custom field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldKind {
    Integer,
    Float,
    Bool,
    String,
    Date,
    DateTime,
    Enum,
    MultiEnum,
}

impl CustomFieldKind {
    pub fn is_date(&self) -> bool {
        matches!(self, CustomFieldKind::Date | CustomFieldKind::DateTime)
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, CustomFieldKind::Enum | CustomFieldKind::MultiEnum)
    }

    /// Field kind used to check value shapes
    pub fn field_kind(&self) -> FieldKind {
        match self {
            CustomFieldKind::Integer | CustomFieldKind::Float => FieldKind::Number,
            CustomFieldKind::Bool => FieldKind::Boolean,
            CustomFieldKind::String => FieldKind::String,
            CustomFieldKind::Date | CustomFieldKind::DateTime => FieldKind::Date,
            CustomFieldKind::Enum | CustomFieldKind::MultiEnum => FieldKind::Reference,
        }
    }
}

/// A user-defined field attached to an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    /// Stable identity, survives soft deletion
    pub id: Uuid,

    pub entity_type: String,

    pub name: String,

    pub kind: CustomFieldKind,

    /// Soft-deletion flag
    #[serde(default)]
    pub deleted: bool,

    /// Choice identifiers for enum kinds
    #[serde(default)]
    pub choices: Vec<String>,
}

impl CustomField {
    pub fn new(
        id: Uuid,
        entity_type: impl Into<String>,
        name: impl Into<String>,
        kind: CustomFieldKind,
    ) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            name: name.into(),
            kind,
            deleted: false,
            choices: Vec::new(),
        }
    }

    /// Set the choices of an enum field
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Mark as soft-deleted
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Type of relation between two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationType {
    pub id: String,

    /// Entity types allowed as subject (empty means any)
    #[serde(default)]
    pub subject_types: Vec<String>,

    /// Entity types allowed as object (empty means any)
    #[serde(default)]
    pub object_types: Vec<String>,
}

impl RelationType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject_types: Vec::new(),
            object_types: Vec::new(),
        }
    }

    pub fn with_subjects<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_objects<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.object_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn accepts_subject(&self, entity_type: &str) -> bool {
        self.subject_types.is_empty() || self.subject_types.iter().any(|t| t == entity_type)
    }

    pub fn accepts_object(&self, entity_type: &str) -> bool {
        self.object_types.is_empty() || self.object_types.iter().any(|t| t == entity_type)
    }
}

/// Type of a property (tag) that can be set on entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub id: String,

    /// Entity types the property applies to (empty means any)
    #[serde(default)]
    pub subject_types: Vec<String>,
}

impl PropertyType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject_types: Vec::new(),
        }
    }

    pub fn with_subjects<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn accepts(&self, entity_type: &str) -> bool {
        self.subject_types.is_empty() || self.subject_types.iter().any(|t| t == entity_type)
    }
}

/// Read-only view of the entity models owned by the storage layer
pub trait SchemaProvider: Send + Sync {
    /// Whether the entity type is known
    fn has_entity_type(&self, entity_type: &str) -> bool;

    /// Look up a regular field of an entity type
    fn field(&self, entity_type: &str, name: &str) -> Option<FieldInfo>;

    /// Look up a custom field by its stable identity (deleted ones included)
    fn custom_field(&self, id: &Uuid) -> Option<CustomField>;

    fn relation_type(&self, id: &str) -> Option<RelationType>;

    fn property_type(&self, id: &str) -> Option<PropertyType>;

    /// Entity types that may be the object of a relation type
    fn compatible_types(&self, relation_type: &str) -> Vec<String>;
}
