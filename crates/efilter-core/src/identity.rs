//! Identity types consumed from the user/team directory

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// User identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Team identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        TeamId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user on whose behalf a request runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: UserId,

    /// Teams the user belongs to
    #[serde(default)]
    pub teams: BTreeSet<TeamId>,

    /// Elevated rights (administrator)
    #[serde(default)]
    pub elevated: bool,
}

impl ActingUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            teams: BTreeSet::new(),
            elevated: false,
        }
    }

    /// Add a team membership
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.teams.insert(TeamId::new(team));
        self
    }

    /// Grant elevated rights
    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn is_member_of(&self, team: &TeamId) -> bool {
        self.teams.contains(team)
    }
}

/// A named group of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,

    pub name: String,

    #[serde(default)]
    pub members: BTreeSet<UserId>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TeamId::new(id),
            name: name.into(),
            members: BTreeSet::new(),
        }
    }

    pub fn with_member(mut self, user: impl Into<String>) -> Self {
        self.members.insert(UserId::new(user));
        self
    }

    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }
}

/// Read-only view of the user/team directory
pub trait IdentityProvider: Send + Sync {
    fn user_exists(&self, user: &UserId) -> bool;

    fn team(&self, team: &TeamId) -> Option<Team>;

    /// Teams the user is currently a member of
    fn teams_of(&self, user: &UserId) -> BTreeSet<TeamId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acting_user_builder() {
        let user = ActingUser::new("shinji").with_team("nerv").elevated();
        assert!(user.elevated);
        assert!(user.is_member_of(&TeamId::new("nerv")));
        assert!(!user.is_member_of(&TeamId::new("seele")));
    }

    #[test]
    fn test_team_membership() {
        let team = Team::new("nerv", "NERV").with_member("misato");
        assert!(team.has_member(&UserId::new("misato")));
        assert!(!team.has_member(&UserId::new("gendo")));
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId::new("u1")).unwrap();
        assert_eq!(json, r#""u1""#);
    }
}
