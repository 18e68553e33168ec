//! Client for the Taskline collaborative task backend.
//!
//! A [`SessionContext`] holds the signed-in user and is shared by every
//! component. The API client signs the whole session out on any 401, and
//! subscribers to [`SessionContext::subscribe`] see that happen.
//!
//! - [`SessionManager`]: sign in, sign up, restore, profile
//! - [`InviteResolver`]: preview and join a group through an invite token
//! - [`GroupMembership`]: roster, approvals, invite links
//! - [`TaskSync`]: task views kept consistent after mutations
//! - [`Dashboard`]: task list, stats and group labels

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod datetime;
pub mod error;
pub mod invite;
pub mod membership;
pub mod models;
pub mod session;
pub mod task_sync;
pub mod validation;

pub use api::ApiClient;
pub use app_state::AppState;
pub use auth::{SessionManager, SignUpInfo};
pub use config::Config;
pub use dashboard::{Dashboard, StatusFilter, TaskStats};
pub use error::{
    ApiFailure, AuthError, ClientError, ClientResult, InviteError, MembershipError,
    ValidationError,
};
pub use invite::{InviteResolver, InviteState, InviteToken, JoinOutcome};
pub use membership::{create_group, GroupMembership, GroupRoster, MembershipState};
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionContext, SessionState, SessionStore,
    SignOutReason,
};
pub use task_sync::{TaskSync, TaskView};
