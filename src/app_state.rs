// src/app_state.rs

use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::SessionManager;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::{ClientResult, ValidationError};
use crate::invite::InviteResolver;
use crate::membership::GroupMembership;
use crate::models::Id;
use crate::session::{FileSessionStore, SessionContext, SessionStore};
use crate::task_sync::TaskSync;

/// Everything a front end needs, wired to one shared session.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: SessionContext,
    pub api: ApiClient,
    pub tasks: Arc<TaskSync>,
}

impl AppState {
    pub fn new(config: Config, store: impl SessionStore + 'static) -> ClientResult<Self> {
        let session = SessionContext::new(store);
        let api = ApiClient::new(&config, session.clone())?;
        let tasks = Arc::new(TaskSync::new(api.clone()));
        Ok(Self {
            config,
            session,
            api,
            tasks,
        })
    }

    /// Uses the session file named by the configuration.
    pub fn from_config(config: Config) -> ClientResult<Self> {
        let store = FileSessionStore::new(config.session_file.clone());
        Self::new(config, store)
    }

    pub fn auth(&self) -> SessionManager {
        SessionManager::new(self.api.clone())
    }

    pub async fn dashboard(&self) -> ClientResult<Dashboard> {
        Dashboard::load(&self.api, self.tasks.clone()).await
    }

    pub async fn group(&self, group_id: &Id) -> ClientResult<GroupMembership> {
        GroupMembership::load(self.api.clone(), group_id).await
    }

    pub fn invite(&self, code_or_link: &str) -> Result<InviteResolver, ValidationError> {
        InviteResolver::from_input(self.api.clone(), code_or_link)
    }
}
