pub mod group;
pub mod task;
pub mod user;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use group::{
    ApprovalRequest, CreateGroupRequest, Group, GroupPreview, InviteLink, JoinRequest, Membership,
    Role,
};
pub use task::{GroupTaskRecord, Task, TaskDraft, TaskPayload, TaskStatus, UserTaskRecord};
pub use user::{PasswordChange, ProfileUpdate, SignUpRequest, User, UserRef};

/// Opaque backend identifier.
///
/// The backend sends ids either as JSON strings or as numbers. Equality and
/// hashing go by the textual value, so `42` and `"42"` name the same record,
/// but the original JSON form is kept when the id is sent back in a body.
#[derive(Clone, Eq)]
pub struct Id {
    raw: String,
    numeric: bool,
}

impl Id {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.raw)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self {
            raw: value.to_string(),
            numeric: false,
        }
    }
}

impl From<String> for Id {
    fn from(raw: String) -> Self {
        Self {
            raw,
            numeric: false,
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self {
            raw: value.to_string(),
            numeric: true,
        }
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.raw.parse::<i64>() {
            Ok(n) if self.numeric => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.raw),
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Num(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Num(n) => Id::from(n),
            RawId::Text(s) => Id::from(s),
        })
    }
}
