use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Reference to a user embedded in another record (e.g. a task assignee).
///
/// The group task listing may send only `{initials, color}`, so the id is
/// optional here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
}

impl UserRef {
    /// Reference by id only, as typed on the command line.
    pub fn with_id(id: Id) -> Self {
        Self {
            id: Some(id),
            full_name: String::new(),
            username: String::new(),
            initials: None,
        }
    }

    pub fn is_identified(&self) -> bool {
        self.id.is_some()
    }

    /// Short label for listings: username, then full name, then initials.
    pub fn handle(&self) -> &str {
        [self.username.as_str(), self.full_name.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
            .or(self.initials.as_deref())
            .unwrap_or("")
    }
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id.clone()),
            full_name: user.full_name.clone(),
            username: user.username.clone(),
            initials: None,
        }
    }
}

// POST /auth/register
#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

// PUT /user/profile
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// PUT /user/profile/password
#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    #[serde(rename = "password")]
    pub new_password: String,
}
