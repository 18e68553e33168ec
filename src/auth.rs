// src/auth.rs

use log::{error, info, warn};
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::error::{AuthError, ClientResult};
use crate::models::{PasswordChange, ProfileUpdate, SignUpRequest, User};
use crate::session::{Session, SessionState, SignOutReason};
use crate::validation;

#[derive(Debug, Clone)]
pub struct SignUpInfo {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Sign-in, sign-up, sign-out and profile operations on top of the shared session.
#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
}

impl SessionManager {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    // POST /auth/login
    pub async fn sign_in(&self, identity: &str, password: &str) -> ClientResult<User> {
        let payload = self.api.login(identity.trim(), password).await?;
        let (token, user) = payload.into_parts()?;
        if token.is_empty() {
            return Err(AuthError::InvalidCredentials("No token in login response".into()).into());
        }

        self.api.session().establish(Session {
            token,
            user: user.clone(),
        })?;
        Ok(user)
    }

    /// Registers a new account. The user still has to sign in afterwards.
    pub async fn sign_up(&self, info: SignUpInfo) -> ClientResult<User> {
        validation::sign_up(&info.password, &info.password_confirm)?;

        let request = SignUpRequest {
            full_name: info.full_name.trim().to_string(),
            username: info.username.trim().to_string(),
            email: info.email.trim().to_string(),
            password: info.password,
            password_confirm: info.password_confirm,
        };
        let user = self.api.register(&request).await?;
        info!("Registered user {}", user.username);
        Ok(user)
    }

    pub fn sign_out(&self) -> ClientResult<()> {
        info!("Signing out");
        self.api.session().clear(SignOutReason::Requested)
    }

    /// Re-validates a persisted session against the backend and refreshes the
    /// cached user. A session that fails validation is discarded.
    pub async fn restore_session(&self) -> ClientResult<Option<User>> {
        let session = self.api.session();
        let stored = match session.load_persisted() {
            Ok(Some(stored)) => stored,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Discarding unreadable stored session: {}", e);
                self.discard();
                return Ok(None);
            }
        };

        let token = stored.token.clone();
        session.stage(stored);
        let user = match self.api.profile().await {
            Ok(user) => user,
            Err(e) => {
                warn!("Stored session could not be restored: {}", e);
                self.discard();
                return Ok(None);
            }
        };
        if let Err(e) = session.establish(Session {
            token,
            user: user.clone(),
        }) {
            error!("Failed to persist restored session: {}", e);
            self.discard();
            return Ok(None);
        }
        Ok(Some(user))
    }

    // Drops the in-memory session even when the store refuses to forget it.
    fn discard(&self) {
        if let Err(e) = self.api.session().clear(SignOutReason::Expired) {
            error!("Failed to clear stored session: {}", e);
        }
    }

    // PUT /user/profile
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ClientResult<User> {
        let user = self.api.update_profile(update).await?;
        self.api.session().update_user(user.clone())?;
        Ok(user)
    }

    // PUT /user/profile/password
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> ClientResult<()> {
        validation::password_change(new_password, confirmation)?;
        self.api
            .change_password(&PasswordChange {
                current_password: current_password.to_string(),
                new_password: new_password.to_string(),
            })
            .await?;
        info!("Password changed");
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        self.api.session().current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.api.session().subscribe()
    }
}
