//! Operand catalog
//!
//! Operands are placeholders stored by type id inside condition values and
//! resolved against the per-request context at evaluation time. A resolved
//! value is never persisted.

use crate::identity::ActingUser;
use crate::types::schema::USER_ENTITY_TYPE;
use crate::types::{FieldInfo, FieldKind, Value};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Type id of the current-user operand
pub const CURRENT_USER: &str = "__currentuser__";

/// Context visible to operand resolution
#[derive(Debug, Clone, Copy)]
pub struct OperandScope<'a> {
    pub user: Option<&'a ActingUser>,
    pub now: DateTime<Utc>,
}

/// Resolve an operand into concrete values
pub type ResolveFn = fn(&OperandScope<'_>) -> Vec<Value>;

/// Decide whether an operand may stand in for a value of a field
pub type AcceptsFn = fn(&FieldInfo) -> bool;

/// Late-bound placeholder value
#[derive(Clone)]
pub struct Operand {
    pub type_id: &'static str,
    pub name: &'static str,
    accepts: AcceptsFn,
    resolve: ResolveFn,
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operand")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .finish()
    }
}

impl Operand {
    pub const fn new(
        type_id: &'static str,
        name: &'static str,
        accepts: AcceptsFn,
        resolve: ResolveFn,
    ) -> Self {
        Self {
            type_id,
            name,
            accepts,
            resolve,
        }
    }

    pub fn accepts(&self, field: &FieldInfo) -> bool {
        (self.accepts)(field)
    }

    pub fn resolve(&self, scope: &OperandScope<'_>) -> Vec<Value> {
        (self.resolve)(scope)
    }
}

fn accepts_user_reference(field: &FieldInfo) -> bool {
    field.kind == FieldKind::Reference && field.related_type.as_deref() == Some(USER_ENTITY_TYPE)
}

// The acting user plus the teams they belong to; nothing without a user.
fn resolve_current_user(scope: &OperandScope<'_>) -> Vec<Value> {
    match scope.user {
        Some(user) => std::iter::once(Value::String(user.id.0.clone()))
            .chain(user.teams.iter().map(|team| Value::String(team.0.clone())))
            .collect(),
        None => Vec::new(),
    }
}

/// The "current acting user" operand
pub const CURRENT_USER_OPERAND: Operand = Operand::new(
    CURRENT_USER,
    "Current user",
    accepts_user_reference,
    resolve_current_user,
);

/// Immutable set of operands
#[derive(Debug, Clone, Default)]
pub struct OperandCatalog {
    operands: BTreeMap<&'static str, Operand>,
}

impl OperandCatalog {
    /// Catalog with the standard operands
    pub fn standard() -> Self {
        Self::default().with_operand(CURRENT_USER_OPERAND)
    }

    pub fn with_operand(mut self, operand: Operand) -> Self {
        self.operands.insert(operand.type_id, operand);
        self
    }

    pub fn get(&self, type_id: &str) -> Option<&Operand> {
        self.operands.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.operands.contains_key(type_id)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operands.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_user_resolution() {
        let user = ActingUser::new("misato").with_team("nerv");
        let scope = OperandScope {
            user: Some(&user),
            now: Utc::now(),
        };
        let values = CURRENT_USER_OPERAND.resolve(&scope);
        assert_eq!(values, vec![Value::from("misato"), Value::from("nerv")]);
    }

    #[test]
    fn test_current_user_without_user() {
        let scope = OperandScope {
            user: None,
            now: Utc::now(),
        };
        assert!(CURRENT_USER_OPERAND.resolve(&scope).is_empty());
    }

    #[test]
    fn test_current_user_accepts_user_references_only() {
        assert!(CURRENT_USER_OPERAND.accepts(&FieldInfo::reference("owner", "User")));
        assert!(!CURRENT_USER_OPERAND.accepts(&FieldInfo::reference("sector", "Sector")));
        assert!(!CURRENT_USER_OPERAND.accepts(&FieldInfo::new("name", FieldKind::String)));
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = OperandCatalog::standard();
        assert!(catalog.contains(CURRENT_USER));
        assert!(catalog.get("__unknown__").is_none());
        assert_eq!(catalog.type_ids().collect::<Vec<_>>(), vec![CURRENT_USER]);
    }
}
