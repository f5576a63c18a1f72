//! Ownership and visibility rules
//!
//! Checked on every create and update, before anything is persisted:
//!
//! 1. A private filter is owned by the acting user or one of their teams;
//!    elevated users may pick any existing user or team.
//! 2. A filter may only reference sub-filters (directly or transitively)
//!    that its owner could see: anything public, plus for a user owner
//!    their own filters and their teams' filters, and for a team owner that
//!    same team's filters.
//! 3. When ownership changes, every filter that reaches the edited one must
//!    still satisfy rule 2, otherwise the change is a conflict.
//!
//! Team membership is read when a rule is checked. Filters validated while
//! a user belonged to a team are not revisited when the membership ends.

use crate::cycle::CycleDetector;
use efilter_core::{
    Access, ActingUser, EntityFilter, ExternalReferences, FilterError, FilterId, FilterSource,
    IdentityProvider, Ownership, Result,
};
use tracing::info;

/// Enforces the ownership rules over the sub-filter graph
pub struct OwnershipAuthorizer<'a> {
    identity: &'a dyn IdentityProvider,
    filters: &'a dyn FilterSource,
    external: Option<&'a dyn ExternalReferences>,
    detector: CycleDetector,
}

impl<'a> OwnershipAuthorizer<'a> {
    pub fn new(identity: &'a dyn IdentityProvider, filters: &'a dyn FilterSource) -> Self {
        Self {
            identity,
            filters,
            external: None,
            detector: CycleDetector::default(),
        }
    }

    /// Also count external records as dependents
    pub fn with_external(mut self, external: &'a dyn ExternalReferences) -> Self {
        self.external = Some(external);
        self
    }

    pub fn with_detector(mut self, detector: CycleDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Validate a candidate filter; `previous` is the persisted version on update
    pub fn validate(
        &self,
        user: &ActingUser,
        candidate: &EntityFilter,
        previous: Option<&EntityFilter>,
    ) -> Result<()> {
        if candidate.is_private() && !candidate.is_custom {
            return Err(FilterError::invalid_elements(
                "system filters cannot be private",
                [candidate.id.to_string()],
            ));
        }
        let ownership_changed = previous.map_or(true, |p| p.ownership != candidate.ownership);
        if ownership_changed {
            self.check_owner(user, &candidate.ownership)?;
        }
        self.check_sub_filters(candidate)?;
        if previous.is_some() && ownership_changed {
            self.check_dependents(candidate)?;
        }
        Ok(())
    }

    /// Rule 1: who may own a private filter
    pub fn check_owner(&self, user: &ActingUser, ownership: &Ownership) -> Result<()> {
        match ownership {
            Ownership::Public => Ok(()),
            Ownership::PrivateToUser(owner) => {
                if !self.identity.user_exists(owner) {
                    return Err(FilterError::invalid_elements(
                        "the owner does not exist",
                        [owner.to_string()],
                    ));
                }
                if !user.elevated && owner != &user.id {
                    return Err(FilterError::invalid_elements(
                        "a private filter can only be assigned to yourself",
                        [owner.to_string()],
                    ));
                }
                Ok(())
            }
            Ownership::PrivateToTeam(team_id) => {
                let team = self.identity.team(team_id).ok_or_else(|| {
                    FilterError::invalid_elements("the team does not exist", [team_id.to_string()])
                })?;
                let member = user.is_member_of(team_id) || team.has_member(&user.id);
                if !user.elevated && !member {
                    return Err(FilterError::invalid_elements(
                        "a private filter can only be assigned to one of your teams",
                        [team_id.to_string()],
                    ));
                }
                Ok(())
            }
        }
    }

    /// Rule 2 for one edge: may a filter owned by `owner` use a sub-filter owned by `sub`
    pub fn may_reference(&self, owner: &Ownership, sub: &Ownership) -> bool {
        match (owner, sub) {
            (_, Ownership::Public) => true,
            (Ownership::Public, _) => false,
            (Ownership::PrivateToUser(user), Ownership::PrivateToUser(other)) => user == other,
            (Ownership::PrivateToUser(user), Ownership::PrivateToTeam(team)) => {
                self.identity.teams_of(user).contains(team)
            }
            (Ownership::PrivateToTeam(team), Ownership::PrivateToTeam(other)) => team == other,
            (Ownership::PrivateToTeam(_), Ownership::PrivateToUser(_)) => false,
        }
    }

    /// Rule 2 over everything the candidate reaches
    pub fn check_sub_filters(&self, candidate: &EntityFilter) -> Result<()> {
        for sub in self.detector.descendants(candidate, self.filters)? {
            if !self.may_reference(&candidate.ownership, &sub.ownership) {
                return Err(FilterError::invalid_elements(
                    format!(
                        "a {} filter cannot use the sub-filter '{}' ({})",
                        candidate.ownership, sub.id, sub.ownership
                    ),
                    [sub.id.to_string()],
                ));
            }
        }
        Ok(())
    }

    /// Rule 3: filters reaching the candidate must still be allowed to use it
    pub fn check_dependents(&self, candidate: &EntityFilter) -> Result<()> {
        let blocked: Vec<String> = self
            .detector
            .ancestors(&candidate.id, self.filters)?
            .into_iter()
            .filter_map(|id| self.filters.filter(&id))
            .filter(|ancestor| !self.may_reference(&ancestor.ownership, &candidate.ownership))
            .map(|ancestor| ancestor.id.to_string())
            .collect();
        if !blocked.is_empty() {
            info!(
                filter = %candidate.id,
                "ownership change rejected, {} dependent filter(s) would break",
                blocked.len()
            );
            return Err(FilterError::conflict(
                format!(
                    "filters using '{}' could no longer reference it once {}",
                    candidate.id, candidate.ownership
                ),
                blocked,
            ));
        }
        Ok(())
    }

    /// Parent filters, then external records, that use `id`
    pub fn dependents(&self, id: &FilterId) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .filters
            .parents_of(id)
            .into_iter()
            .map(|parent| parent.to_string())
            .collect();
        if let Some(external) = self.external {
            dependents.extend(external.references_to(id));
        }
        dependents
    }

    pub fn can_view(&self, user: &ActingUser, filter: &EntityFilter) -> Access {
        filter.can_view(user)
    }

    pub fn can_edit(&self, user: &ActingUser, filter: &EntityFilter) -> Access {
        filter.can_edit(user)
    }

    pub fn can_rename(&self, user: &ActingUser, filter: &EntityFilter) -> Access {
        filter.can_rename(user)
    }

    /// Static rules plus: nothing may still depend on the filter
    pub fn can_delete(&self, user: &ActingUser, filter: &EntityFilter) -> Access {
        let access = filter.can_delete(user);
        if !access.0 {
            return access;
        }
        let dependents = self.dependents(&filter.id);
        if dependents.is_empty() {
            access
        } else {
            (
                false,
                Some(format!("This filter is used by: {}", dependents.join(", "))),
            )
        }
    }
}
