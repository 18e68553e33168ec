use serde::{Deserialize, Serialize};

use super::Id;

/// A user's role inside a group. `Pending` marks a join request that is
/// waiting for an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
    Pending,
}

impl Role {
    pub fn is_active(self) -> bool {
        !matches!(self, Role::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Pending => "pending",
        }
    }
}

/// One member record of a group, active or pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MembershipRecord")]
pub struct Membership {
    pub user_id: Id,
    pub role: Role,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl Membership {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or_else(|| self.user_id.as_str())
    }
}

// Member entries carry the user id as `user_id` or, on the detail endpoint, `id`.
#[derive(Deserialize)]
struct MembershipRecord {
    #[serde(default)]
    user_id: Option<Id>,
    #[serde(default)]
    id: Option<Id>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TryFrom<MembershipRecord> for Membership {
    type Error = String;

    fn try_from(record: MembershipRecord) -> Result<Self, Self::Error> {
        let user_id = record
            .user_id
            .or(record.id)
            .ok_or_else(|| "member entry without user id".to_string())?;
        let role = match (record.role, record.status.as_deref()) {
            (Some(role), _) => role,
            (None, Some(status)) if status.eq_ignore_ascii_case("pending") => Role::Pending,
            (None, _) => Role::Member,
        };
        Ok(Self {
            user_id,
            role,
            full_name: record.full_name,
            username: record.username,
            email: record.email,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<Membership>,
}

impl Group {
    /// Members that count toward the group size; pending requests do not.
    pub fn active_member_count(&self) -> usize {
        self.members.iter().filter(|m| m.role.is_active()).count()
    }
}

// GET /user/groups/preview/{token}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPreview {
    pub name: String,
    #[serde(alias = "members_count", alias = "total_members", default)]
    pub member_count: u32,
}

// GET /user/groups/{id}/invite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteLink {
    pub link: String,
    #[serde(default)]
    pub expires_days: u32,
}

// POST /user/groups
#[derive(Debug, Clone, Serialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// POST /user/groups/{id}/approve
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub user_id: Id,
    pub approve: bool,
}

// POST /user/groups/join
#[derive(Debug, Clone, Serialize)]
pub struct JoinRequest {
    pub token: String,
}
