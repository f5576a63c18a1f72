//! In-memory identity directory

use efilter_core::{ActingUser, IdentityProvider, Team, TeamId, UserId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeSet<UserId>,
    teams: BTreeMap<TeamId, Team>,
}

/// Users and teams held in memory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: impl Into<String>) -> Self {
        self.add_user(user);
        self
    }

    /// Register a team; its members become known users
    pub fn with_team(self, team: Team) -> Self {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.users.extend(team.members.iter().cloned());
            state.teams.insert(team.id.clone(), team);
        }
        self
    }

    pub fn add_user(&self, user: impl Into<String>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .users
            .insert(UserId::new(user));
    }

    pub fn add_member(&self, team: &TeamId, user: &UserId) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.users.insert(user.clone());
        match state.teams.get_mut(team) {
            Some(team) => team.members.insert(user.clone()),
            None => false,
        }
    }

    pub fn remove_member(&self, team: &TeamId, user: &UserId) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.teams.get_mut(team) {
            Some(team) => team.members.remove(user),
            None => false,
        }
    }

    /// Acting user value with the current team memberships
    pub fn acting_user(&self, user: &UserId) -> Option<ActingUser> {
        if !self.user_exists(user) {
            return None;
        }
        let mut acting = ActingUser::new(user.as_str());
        acting.teams = self.teams_of(user);
        Some(acting)
    }
}

impl IdentityProvider for MemoryDirectory {
    fn user_exists(&self, user: &UserId) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .users
            .contains(user)
    }

    fn team(&self, team: &TeamId) -> Option<Team> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .teams
            .get(team)
            .cloned()
    }

    fn teams_of(&self, user: &UserId) -> BTreeSet<TeamId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .teams
            .values()
            .filter(|team| team.has_member(user))
            .map(|team| team.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acting_user_carries_teams() {
        let directory = MemoryDirectory::new()
            .with_user("gendo")
            .with_team(Team::new("nerv", "NERV").with_member("misato"));

        let misato = directory.acting_user(&UserId::new("misato")).unwrap();
        assert!(misato.is_member_of(&TeamId::new("nerv")));
        assert!(directory
            .acting_user(&UserId::new("gendo"))
            .unwrap()
            .teams
            .is_empty());
        assert!(directory.acting_user(&UserId::new("kaji")).is_none());
    }

    #[test]
    fn test_membership_changes() {
        let directory = MemoryDirectory::new().with_team(Team::new("nerv", "NERV"));
        let team = TeamId::new("nerv");
        let user = UserId::new("ritsuko");
        assert!(directory.add_member(&team, &user));
        assert_eq!(directory.teams_of(&user).len(), 1);
        assert!(directory.remove_member(&team, &user));
        assert!(directory.teams_of(&user).is_empty());
        assert!(directory.user_exists(&user));
    }
}
