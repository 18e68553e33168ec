// src/membership.rs

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult, MembershipError};
use crate::models::{ApprovalRequest, CreateGroupRequest, Group, Id, InviteLink, Membership, Role};
use crate::validation;

/// Where a user stands with respect to one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    NotMember,
    Pending,
    Member,
    Admin,
}

impl From<Role> for MembershipState {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => MembershipState::Admin,
            Role::Member => MembershipState::Member,
            Role::Pending => MembershipState::Pending,
        }
    }
}

// ─── ROSTER ──────────────────────────────────────────────────────────────────

/// Members of a group split into pending requests and active members.
/// A user appears in at most one of the two lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupRoster {
    pending: Vec<Membership>,
    active: Vec<Membership>,
}

impl GroupRoster {
    pub fn from_members(members: Vec<Membership>) -> Self {
        let mut seen = HashSet::new();
        let mut roster = GroupRoster::default();

        for member in members {
            if !seen.insert(member.user_id.clone()) {
                warn!("Duplicate member entry for user {}; keeping the first", member.user_id);
                continue;
            }
            if member.role == Role::Pending {
                roster.pending.push(member);
            } else {
                roster.active.push(member);
            }
        }
        roster.sort_active();

        let admins = roster.active.iter().filter(|m| m.role == Role::Admin).count();
        if !roster.active.is_empty() && admins != 1 {
            warn!("Group has {} admins, expected exactly one", admins);
        }
        roster
    }

    pub fn pending(&self) -> &[Membership] {
        &self.pending
    }

    /// Active members, admin first.
    pub fn active(&self) -> &[Membership] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Members a group task may be assigned to.
    pub fn assignable(&self) -> &[Membership] {
        &self.active
    }

    pub fn state_of(&self, user_id: &Id) -> MembershipState {
        self.pending
            .iter()
            .chain(self.active.iter())
            .find(|m| &m.user_id == user_id)
            .map(|m| MembershipState::from(m.role))
            .unwrap_or(MembershipState::NotMember)
    }

    /// Render order: pending requests first, then active members.
    pub fn ordered(&self) -> impl Iterator<Item = &Membership> {
        self.pending.iter().chain(self.active.iter())
    }

    fn find_pending(&self, user_id: &Id) -> Result<&Membership, MembershipError> {
        self.pending
            .iter()
            .find(|m| &m.user_id == user_id)
            .ok_or_else(|| MembershipError::NotPending(user_id.clone()))
    }

    fn take_pending(&mut self, user_id: &Id) -> Result<Membership, MembershipError> {
        let idx = self
            .pending
            .iter()
            .position(|m| &m.user_id == user_id)
            .ok_or_else(|| MembershipError::NotPending(user_id.clone()))?;
        Ok(self.pending.remove(idx))
    }

    fn promote(&mut self, user_id: &Id) -> Result<(), MembershipError> {
        let mut member = self.take_pending(user_id)?;
        member.role = Role::Member;
        self.active.push(member);
        self.sort_active();
        Ok(())
    }

    fn sort_active(&mut self) {
        // Stable, so members keep server order behind the admin.
        self.active.sort_by_key(|m| m.role != Role::Admin);
    }
}

// ─── GROUP ───────────────────────────────────────────────────────────────────

/// A loaded group seen from the signed-in user's side.
pub struct GroupMembership {
    api: ApiClient,
    id: Id,
    name: String,
    description: Option<String>,
    roster: GroupRoster,
    viewer: Option<Id>,
}

impl GroupMembership {
    // GET /user/groups/{id}
    pub async fn load(api: ApiClient, group_id: &Id) -> ClientResult<Self> {
        let group = api.group(group_id).await?;
        Ok(Self::from_group(api, group))
    }

    pub fn from_group(api: ApiClient, group: Group) -> Self {
        let viewer = api.session().current_user().map(|u| u.id);
        Self {
            api,
            id: group.id,
            name: group.name,
            description: group.description,
            roster: GroupRoster::from_members(group.members),
            viewer,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn roster(&self) -> &GroupRoster {
        &self.roster
    }

    pub fn viewer_state(&self) -> MembershipState {
        match &self.viewer {
            Some(id) => self.roster.state_of(id),
            None => MembershipState::NotMember,
        }
    }

    /// Whether approve/reject and invite links are offered to the viewer.
    pub fn can_moderate(&self) -> bool {
        self.viewer_state() == MembershipState::Admin
    }

    pub async fn refresh(&mut self) -> ClientResult<()> {
        let group = self.api.group(&self.id).await?;
        self.name = group.name;
        self.description = group.description;
        self.roster = GroupRoster::from_members(group.members);
        self.viewer = self.api.session().current_user().map(|u| u.id);
        Ok(())
    }

    // POST /user/groups/{id}/approve {approve: true}
    pub async fn approve(&mut self, user_id: &Id) -> ClientResult<()> {
        self.review(user_id, true).await?;
        self.roster.promote(user_id)?;
        info!("Approved user {} in group {}", user_id, self.id);
        Ok(())
    }

    // POST /user/groups/{id}/approve {approve: false}
    pub async fn reject(&mut self, user_id: &Id) -> ClientResult<()> {
        self.review(user_id, false).await?;
        self.roster.take_pending(user_id)?;
        info!("Rejected user {} in group {}", user_id, self.id);
        Ok(())
    }

    // GET /user/groups/{id}/invite
    pub async fn invite_link(&self) -> ClientResult<InviteLink> {
        self.ensure_admin("create invite links")?;
        self.api.invite_link(&self.id).await
    }

    /// Always `Unsupported`: the backend has no `DELETE /user/groups/{id}/members/me`
    /// (or any other leave route), so nothing is sent.
    pub fn leave(&mut self) -> ClientResult<()> {
        Err(ClientError::Unsupported("leaving a group"))
    }

    async fn review(&self, user_id: &Id, approve: bool) -> ClientResult<()> {
        self.ensure_admin("review join requests")?;
        let member = self.roster.find_pending(user_id)?;

        debug!(
            "Reviewing {} in group {} (approve: {})",
            member.display_name(),
            self.id,
            approve
        );
        let request = ApprovalRequest {
            user_id: member.user_id.clone(),
            approve,
        };
        self.api.review_member(&self.id, &request).await
    }

    fn ensure_admin(&self, action: &str) -> ClientResult<()> {
        if self.can_moderate() {
            return Ok(());
        }
        Err(ClientError::Permission(format!(
            "Only the group admin can {action}"
        )))
    }
}

// POST /user/groups
pub async fn create_group(
    api: &ApiClient,
    name: &str,
    description: Option<&str>,
) -> ClientResult<Group> {
    validation::group_name(name)?;
    let request = CreateGroupRequest {
        name: name.trim().to_string(),
        description: description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    };
    let group = api.create_group(&request).await?;
    info!("Created group {} ({})", group.name, group.id);
    Ok(group)
}
