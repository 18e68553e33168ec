// src/api.rs

use log::{debug, warn};
use reqwest::{Method, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{ApiFailure, AuthError, ClientError, ClientResult};
use crate::models::{
    ApprovalRequest, CreateGroupRequest, Group, GroupPreview, GroupTaskRecord, Id, InviteLink,
    JoinRequest, PasswordChange, ProfileUpdate, SignUpRequest, TaskPayload, TaskStatus, User,
    UserTaskRecord,
};
use crate::session::SessionContext;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Authenticated,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identity: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: TaskStatus,
}

/// Login answer: the token next to the user fields, or the user nested under `user`.
#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub token: String,
    #[serde(default)]
    user: Option<User>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl LoginPayload {
    pub fn into_parts(self) -> ClientResult<(String, User)> {
        let user = match self.user {
            Some(user) => user,
            None => serde_json::from_value(Value::Object(self.rest))?,
        };
        Ok((self.token, user))
    }
}

/// HTTP client for the Taskline REST backend.
///
/// Authenticated calls carry the current session token. A 401 on any of them
/// signs the whole session out.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionContext) -> ClientResult<Self> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ClientError::Config(format!("Invalid API URL {}: {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "API URL cannot be used as a base: {}",
                config.api_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    // ─── AUTH ────────────────────────────────────────────────────────────────

    // POST /auth/register
    pub async fn register(&self, request: &SignUpRequest) -> ClientResult<User> {
        self.send(Method::POST, &["auth", "register"], Some(request), Access::Public)
            .await
    }

    // POST /auth/login
    pub async fn login(&self, identity: &str, password: &str) -> ClientResult<LoginPayload> {
        let body = LoginRequest { identity, password };
        match self
            .send(Method::POST, &["auth", "login"], Some(&body), Access::Public)
            .await
        {
            Err(ClientError::Api(f)) | Err(ClientError::NotFound(f)) if f.status < 500 => {
                Err(AuthError::InvalidCredentials(f.message).into())
            }
            Err(ClientError::Permission(message)) => {
                Err(AuthError::InvalidCredentials(message).into())
            }
            other => other,
        }
    }

    // ─── PROFILE ─────────────────────────────────────────────────────────────

    // GET /user/profile
    pub async fn profile(&self) -> ClientResult<User> {
        self.get(&["user", "profile"]).await
    }

    // PUT /user/profile
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ClientResult<User> {
        self.authed(Method::PUT, &["user", "profile"], Some(update)).await
    }

    // PUT /user/profile/password
    pub async fn change_password(&self, change: &PasswordChange) -> ClientResult<()> {
        let _: IgnoredAny = self
            .authed(Method::PUT, &["user", "profile", "password"], Some(change))
            .await?;
        Ok(())
    }

    // ─── TASKS ───────────────────────────────────────────────────────────────

    // GET /user/tasks
    pub async fn list_tasks(&self) -> ClientResult<Vec<UserTaskRecord>> {
        let tasks: Option<Vec<UserTaskRecord>> = self.get(&["user", "tasks"]).await?;
        Ok(tasks.unwrap_or_default())
    }

    // POST /user/tasks
    pub async fn create_task(&self, payload: &TaskPayload) -> ClientResult<UserTaskRecord> {
        self.authed(Method::POST, &["user", "tasks"], Some(payload)).await
    }

    /// PUT /user/tasks/{id}. Some backend versions answer with a bare
    /// confirmation instead of the record, hence the `Option`.
    pub async fn update_task(
        &self,
        task_id: &Id,
        payload: &TaskPayload,
    ) -> ClientResult<Option<UserTaskRecord>> {
        let value: Value = self
            .authed(Method::PUT, &["user", "tasks", task_id.as_str()], Some(payload))
            .await?;
        Ok(updated_record(task_id, value))
    }

    // PATCH /user/tasks/{id}
    pub async fn update_task_status(&self, task_id: &Id, status: TaskStatus) -> ClientResult<()> {
        let body = StatusUpdate { status };
        let _: IgnoredAny = self
            .authed(Method::PATCH, &["user", "tasks", task_id.as_str()], Some(&body))
            .await?;
        Ok(())
    }

    // DELETE /user/tasks/{id}
    pub async fn delete_task(&self, task_id: &Id) -> ClientResult<()> {
        let _: IgnoredAny = self
            .authed(Method::DELETE, &["user", "tasks", task_id.as_str()], None::<&()>)
            .await?;
        Ok(())
    }

    // ─── GROUPS ──────────────────────────────────────────────────────────────

    // GET /user/groups/me
    pub async fn my_groups(&self) -> ClientResult<Vec<Group>> {
        let groups: Option<Vec<Group>> = self.get(&["user", "groups", "me"]).await?;
        Ok(groups.unwrap_or_default())
    }

    // POST /user/groups
    pub async fn create_group(&self, request: &CreateGroupRequest) -> ClientResult<Group> {
        self.authed(Method::POST, &["user", "groups"], Some(request)).await
    }

    // GET /user/groups/{id}
    pub async fn group(&self, group_id: &Id) -> ClientResult<Group> {
        self.get(&["user", "groups", group_id.as_str()]).await
    }

    // GET /user/groups/{id}/tasks
    pub async fn group_tasks(&self, group_id: &Id) -> ClientResult<Vec<GroupTaskRecord>> {
        let tasks: Option<Vec<GroupTaskRecord>> =
            self.get(&["user", "groups", group_id.as_str(), "tasks"]).await?;
        Ok(tasks.unwrap_or_default())
    }

    // GET /user/groups/{id}/invite
    pub async fn invite_link(&self, group_id: &Id) -> ClientResult<InviteLink> {
        self.get(&["user", "groups", group_id.as_str(), "invite"]).await
    }

    // POST /user/groups/{id}/approve
    pub async fn review_member(&self, group_id: &Id, request: &ApprovalRequest) -> ClientResult<()> {
        let _: IgnoredAny = self
            .authed(
                Method::POST,
                &["user", "groups", group_id.as_str(), "approve"],
                Some(request),
            )
            .await?;
        Ok(())
    }

    // POST /user/groups/join
    pub async fn join_group(&self, token: &str) -> ClientResult<Value> {
        let body = JoinRequest {
            token: token.to_string(),
        };
        self.authed(Method::POST, &["user", "groups", "join"], Some(&body))
            .await
    }

    // GET /user/groups/preview/{token}
    pub async fn preview_group(&self, token: &str) -> ClientResult<GroupPreview> {
        self.get(&["user", "groups", "preview", token]).await
    }

    // ─── TRANSPORT ───────────────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ClientResult<T> {
        self.authed(Method::GET, segments, None::<&()>).await
    }

    async fn authed<T, B>(&self, method: Method, segments: &[&str], body: Option<&B>) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(method, segments, body, Access::Authenticated).await
    }

    async fn send<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        access: Access,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let mut request = self.http.request(method.clone(), url);

        let token = match access {
            Access::Public => None,
            Access::Authenticated => {
                let token = self.session.token().ok_or(AuthError::NotSignedIn)?;
                request = request.bearer_auth(&token);
                Some(token)
            }
        };
        if let Some(b) = body {
            request = request.json(b);
        }

        debug!("{} /{}", method, segments.join("/"));
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            return Ok(serde_json::from_value(unwrap_envelope(&text))?);
        }

        let failure = read_failure(status, response).await;
        if status == StatusCode::UNAUTHORIZED {
            if let Some(token) = token {
                warn!("{} /{} rejected: {}", method, segments.join("/"), failure.message);
                self.session.expire(&token);
                return Err(AuthError::SessionExpired.into());
            }
            return Err(AuthError::InvalidCredentials(failure.message).into());
        }

        debug!("{} /{} failed: {}", method, segments.join("/"), failure);
        Err(ClientError::from_failure(failure))
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("API URL cannot be used as a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Successful bodies may wrap the payload under `data`. Empty bodies become
/// `null` and non-JSON bodies become a JSON string.
fn unwrap_envelope(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut map)) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        Ok(value) => value,
        Err(_) => Value::String(text.to_string()),
    }
}

async fn read_failure(status: StatusCode, response: reqwest::Response) -> ApiFailure {
    let text = response.text().await.unwrap_or_default();
    parse_failure(status, &text)
}

fn parse_failure(status: StatusCode, text: &str) -> ApiFailure {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    };

    let (message, code) = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => {
            let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
            let message = field("message")
                .or_else(|| field("error"))
                .or_else(|| {
                    map.get("data")
                        .and_then(|d| d.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(fallback);
            (message, field("code").or_else(|| field("error_code")))
        }
        Ok(Value::String(s)) if !s.trim().is_empty() => (s, None),
        _ if !text.trim().is_empty() => (text.trim().to_string(), None),
        _ => (fallback(), None),
    };

    ApiFailure {
        status: status.as_u16(),
        message,
        code,
    }
}

/// The update endpoint answers either with the stored record or with a bare
/// acknowledgement. A record that no longer decodes is logged, not fatal.
fn updated_record(task_id: &Id, value: Value) -> Option<UserTaskRecord> {
    let looks_like_task = value.get("id").is_some();
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) if looks_like_task => {
            warn!("Task {} update returned an unreadable record: {}", task_id, e);
            None
        }
        Err(e) => {
            debug!("Task {} update acknowledged without a record: {}", task_id, e);
            None
        }
    }
}
