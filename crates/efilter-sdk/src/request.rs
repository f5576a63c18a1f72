//! Request types for filter mutations

use efilter_core::{ConditionDescriptor, FilterId, FilterType, Ownership};
use serde::{Deserialize, Serialize};

/// Request to create a filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    /// Generated as `<prefix>_<entity_type>-<n>` when absent
    #[serde(default)]
    pub id: Option<FilterId>,
    pub name: String,
    pub entity_type: String,
    #[serde(default = "default_filter_type")]
    pub filter_type: FilterType,
    #[serde(default)]
    pub use_or: bool,
    #[serde(skip)]
    pub ownership: Ownership,
    pub conditions: Vec<ConditionDescriptor>,
}

fn default_filter_type() -> FilterType {
    FilterType::Regular
}

impl FilterRequest {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            entity_type: entity_type.into(),
            filter_type: FilterType::Regular,
            use_or: false,
            ownership: Ownership::Public,
            conditions: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(FilterId::new(id));
        self
    }

    pub fn with_filter_type(mut self, filter_type: FilterType) -> Self {
        self.filter_type = filter_type;
        self
    }

    pub fn with_use_or(mut self, use_or: bool) -> Self {
        self.use_or = use_or;
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_condition(mut self, condition: ConditionDescriptor) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Partial update of an existing filter; absent parts are kept
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterUpdate {
    pub name: Option<String>,
    pub ownership: Option<Ownership>,
    /// New condition list and combinator, replacing the old ones as a whole
    pub conditions: Option<(Vec<ConditionDescriptor>, bool)>,
}

impl FilterUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = Some(ownership);
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<ConditionDescriptor>, use_or: bool) -> Self {
        self.conditions = Some((conditions, use_or));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.ownership.is_none() && self.conditions.is_none()
    }
}
