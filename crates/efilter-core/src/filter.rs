//! The `EntityFilter` aggregate
//!
//! A filter owns an ordered, never empty list of conditions combined with AND
//! (or OR when `use_or` is set) and an ownership tag deciding who may view,
//! edit, delete or reference it.

use crate::condition::{Condition, StoredCondition};
use crate::error::{FilterError, Result};
use crate::identity::{ActingUser, TeamId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `(allowed, reason when denied)`
pub type Access = (bool, Option<String>);

fn granted() -> Access {
    (true, None)
}

fn denied(reason: impl Into<String>) -> Access {
    (false, Some(reason.into()))
}

/// Filter identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(pub String);

impl FilterId {
    pub fn new(id: impl Into<String>) -> Self {
        FilterId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilterId {
    fn from(id: &str) -> Self {
        FilterId::new(id)
    }
}

/// Registry discriminant of a filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterType {
    /// User-facing search filters
    Regular,
    /// Filters used by access-control rules
    Credentials,
    /// Filter type declared by an extension
    Custom(String),
}

impl FilterType {
    pub fn as_str(&self) -> &str {
        match self {
            FilterType::Regular => "regular",
            FilterType::Credentials => "credentials",
            FilterType::Custom(id) => id,
        }
    }
}

impl From<String> for FilterType {
    fn from(id: String) -> Self {
        match id.as_str() {
            "regular" => FilterType::Regular,
            "credentials" => FilterType::Credentials,
            _ => FilterType::Custom(id),
        }
    }
}

impl From<FilterType> for String {
    fn from(filter_type: FilterType) -> Self {
        filter_type.as_str().to_string()
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility class of a filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Ownership {
    #[default]
    Public,
    PrivateToUser(UserId),
    PrivateToTeam(TeamId),
}

impl Ownership {
    pub fn is_private(&self) -> bool {
        !matches!(self, Ownership::Public)
    }

    /// Whether `user` is the owner, or a member of the owning team
    pub fn is_owned_by(&self, user: &ActingUser) -> bool {
        match self {
            Ownership::Public => false,
            Ownership::PrivateToUser(owner) => *owner == user.id,
            Ownership::PrivateToTeam(team) => user.is_member_of(team),
        }
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Public => f.write_str("public"),
            Ownership::PrivateToUser(user) => write!(f, "private to user '{}'", user),
            Ownership::PrivateToTeam(team) => write!(f, "private to team '{}'", team),
        }
    }
}

/// Composable predicate over the entities of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredFilter", into = "StoredFilter")]
pub struct EntityFilter {
    pub id: FilterId,
    pub name: String,
    pub entity_type: String,
    pub filter_type: FilterType,
    /// User-editable (false for system-installed filters)
    pub is_custom: bool,
    pub use_or: bool,
    pub ownership: Ownership,
    conditions: Vec<Condition>,
}

impl EntityFilter {
    /// Create a public, custom, regular filter
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
        conditions: Vec<Condition>,
    ) -> Result<Self> {
        ensure_not_empty(&conditions)?;
        Ok(Self {
            id: FilterId::new(id),
            name: name.into(),
            entity_type: entity_type.into(),
            filter_type: FilterType::Regular,
            is_custom: true,
            use_or: false,
            ownership: Ownership::Public,
            conditions,
        })
    }

    pub fn with_use_or(mut self, use_or: bool) -> Self {
        self.use_or = use_or;
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_filter_type(mut self, filter_type: FilterType) -> Self {
        self.filter_type = filter_type;
        self
    }

    /// Mark as system-installed
    pub fn system(mut self) -> Self {
        self.is_custom = false;
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Replace the whole condition list; the previous list stays untouched
    /// on error.
    pub fn set_conditions(&mut self, conditions: Vec<Condition>, use_or: bool) -> Result<()> {
        ensure_not_empty(&conditions)?;
        log::debug!(
            "filter '{}': replacing {} condition(s) with {}",
            self.id,
            self.conditions.len(),
            conditions.len()
        );
        self.conditions = conditions;
        self.use_or = use_or;
        Ok(())
    }

    pub fn is_private(&self) -> bool {
        self.ownership.is_private()
    }

    /// Sub-filters referenced by this filter, in condition order, without duplicates
    pub fn sub_filter_ids(&self) -> Vec<FilterId> {
        let mut ids: Vec<FilterId> = Vec::new();
        for id in self.conditions.iter().filter_map(Condition::sub_filter_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Ownership part of the view permission
    pub fn can_view(&self, user: &ActingUser) -> Access {
        match &self.ownership {
            Ownership::Public => granted(),
            _ if user.elevated => granted(),
            ownership if ownership.is_owned_by(user) => granted(),
            _ => denied("You are not allowed to view this private filter"),
        }
    }

    /// Ownership part of the edit permission
    pub fn can_edit(&self, user: &ActingUser) -> Access {
        match self.can_view(user) {
            (true, _) => granted(),
            (false, _) => denied("You are not allowed to edit this private filter"),
        }
    }

    /// Static part of the delete permission (dependents are checked by the
    /// authorizer)
    pub fn can_delete(&self, user: &ActingUser) -> Access {
        if !self.is_custom {
            return denied("This filter is a system filter and cannot be deleted");
        }
        match self.can_view(user) {
            (true, _) => granted(),
            (false, _) => denied("You are not allowed to delete this private filter"),
        }
    }

    /// System filters keep their name
    pub fn can_rename(&self, user: &ActingUser) -> Access {
        if !self.is_custom {
            return denied("The name of a system filter cannot be changed");
        }
        self.can_edit(user)
    }
}

fn ensure_not_empty(conditions: &[Condition]) -> Result<()> {
    if conditions.is_empty() {
        return Err(FilterError::validation("no conditions"));
    }
    Ok(())
}

/// Read access to the set of persisted filters
pub trait FilterSource: Send + Sync {
    fn filter(&self, id: &FilterId) -> Option<EntityFilter>;

    fn filters(&self) -> Vec<EntityFilter>;

    /// Filters holding a condition that references `id`
    fn parents_of(&self, id: &FilterId) -> Vec<FilterId> {
        let mut parents: Vec<FilterId> = self
            .filters()
            .into_iter()
            .filter(|f| f.sub_filter_ids().contains(id))
            .map(|f| f.id)
            .collect();
        parents.sort();
        parents
    }
}

/// Records outside the filter set (reports, saved searches...) that use a filter
pub trait ExternalReferences: Send + Sync {
    /// Display labels of the external records referencing `id`
    fn references_to(&self, id: &FilterId) -> Vec<String>;
}

/// Persisted owner: `{user_id}` or `{team_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredOwner {
    User { user_id: UserId },
    Team { team_id: TeamId },
}

/// Persisted shape of a filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFilter {
    pub id: FilterId,
    pub name: String,
    pub entity_type: String,
    #[serde(default = "default_filter_type")]
    pub filter_type: FilterType,
    #[serde(default = "default_is_custom")]
    pub is_custom: bool,
    #[serde(default)]
    pub use_or: bool,
    #[serde(default)]
    pub owner: Option<StoredOwner>,
    pub conditions: Vec<StoredCondition>,
}

fn default_filter_type() -> FilterType {
    FilterType::Regular
}

fn default_is_custom() -> bool {
    true
}

impl TryFrom<StoredFilter> for EntityFilter {
    type Error = String;

    fn try_from(stored: StoredFilter) -> std::result::Result<Self, Self::Error> {
        let conditions = stored
            .conditions
            .into_iter()
            .map(Condition::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if conditions.is_empty() {
            return Err(format!("filter '{}' has no conditions", stored.id));
        }
        let ownership = match stored.owner {
            None => Ownership::Public,
            Some(StoredOwner::User { user_id }) => Ownership::PrivateToUser(user_id),
            Some(StoredOwner::Team { team_id }) => Ownership::PrivateToTeam(team_id),
        };
        Ok(EntityFilter {
            id: stored.id,
            name: stored.name,
            entity_type: stored.entity_type,
            filter_type: stored.filter_type,
            is_custom: stored.is_custom,
            use_or: stored.use_or,
            ownership,
            conditions,
        })
    }
}

impl From<EntityFilter> for StoredFilter {
    fn from(filter: EntityFilter) -> Self {
        let owner = match filter.ownership {
            Ownership::Public => None,
            Ownership::PrivateToUser(user_id) => Some(StoredOwner::User { user_id }),
            Ownership::PrivateToTeam(team_id) => Some(StoredOwner::Team { team_id }),
        };
        StoredFilter {
            id: filter.id,
            name: filter.name,
            entity_type: filter.entity_type,
            filter_type: filter.filter_type,
            is_custom: filter.is_custom,
            use_or: filter.use_or,
            owner,
            conditions: filter.conditions.into_iter().map(Into::into).collect(),
        }
    }
}
