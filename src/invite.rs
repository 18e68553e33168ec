// src/invite.rs

use std::fmt;

use log::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult, InviteError, ValidationError};
use crate::models::GroupPreview;
use crate::validation;

const FALLBACK_MESSAGE: &str = "Invalid code or link. Please try again.";

/// Invite token taken from a bare code or a pasted invite link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InviteToken(String);

impl InviteToken {
    /// Accepts `ABC123` as well as `https://host/groups/join/ABC123?ref=x`.
    pub fn parse(code_or_link: &str) -> Result<Self, ValidationError> {
        validation::invite_code(code_or_link)?;

        let trimmed = code_or_link.trim();
        let without_query = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let token = without_query
            .split('/')
            .filter(|part| !part.trim().is_empty())
            .last()
            .map(str::trim)
            .unwrap_or_default();

        if token.is_empty() {
            return Err(ValidationError::new("code", "Please enter a group code or link"));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteState {
    Idle,
    LoadingPreview,
    PreviewReady(GroupPreview),
    PreviewError(InviteError),
    Joining(GroupPreview),
    Requested(GroupPreview),
    AlreadyRequested(GroupPreview),
    JoinError(InviteError),
}

impl InviteState {
    pub fn headline(&self) -> &'static str {
        match self {
            InviteState::Idle | InviteState::LoadingPreview => "Join a Group",
            InviteState::PreviewReady(_) => "You're Invited",
            InviteState::PreviewError(InviteError::Expired(_)) => "Invite Expired",
            InviteState::PreviewError(InviteError::Invalid(_)) => "Invalid Invite",
            InviteState::PreviewError(_) => "Could Not Load Invite",
            InviteState::Joining(_) => "Joining...",
            InviteState::Requested(_) => "Request Sent",
            InviteState::AlreadyRequested(_) => "Already Requested",
            InviteState::JoinError(_) => "Failed to Join",
        }
    }

    /// No further action is possible in this flow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InviteState::Requested(_) | InviteState::AlreadyRequested(_) | InviteState::JoinError(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A pending membership was created and now waits for an admin.
    Requested { group: GroupPreview },
    /// The user is already a member or already has a pending request.
    AlreadyRequested { group: GroupPreview },
}

impl JoinOutcome {
    pub fn group(&self) -> &GroupPreview {
        match self {
            JoinOutcome::Requested { group } | JoinOutcome::AlreadyRequested { group } => group,
        }
    }

    pub fn message(&self) -> String {
        match self {
            JoinOutcome::Requested { group } => format!(
                "Request to join {} sent. An admin needs to approve it.",
                group.name
            ),
            JoinOutcome::AlreadyRequested { group } => format!(
                "You have already joined or requested to join {}.",
                group.name
            ),
        }
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Preview,
    Join,
}

enum Classified {
    Failed(InviteError),
    AlreadyRequested,
}

/// Drives one preview-then-join flow for a single invite token.
pub struct InviteResolver {
    api: ApiClient,
    token: InviteToken,
    state: InviteState,
}

impl InviteResolver {
    pub fn new(api: ApiClient, token: InviteToken) -> Self {
        Self {
            api,
            token,
            state: InviteState::Idle,
        }
    }

    pub fn from_input(api: ApiClient, code_or_link: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(api, InviteToken::parse(code_or_link)?))
    }

    pub fn token(&self) -> &InviteToken {
        &self.token
    }

    pub fn state(&self) -> &InviteState {
        &self.state
    }

    // GET /user/groups/preview/{token}
    pub async fn load_preview(&mut self) -> ClientResult<GroupPreview> {
        self.state = InviteState::LoadingPreview;
        debug!("Loading preview for invite {}", self.token);

        match self.api.preview_group(self.token.as_str()).await {
            Ok(preview) => {
                self.state = InviteState::PreviewReady(preview.clone());
                Ok(preview)
            }
            Err(err) => {
                let invite_err = match classify(err, Stage::Preview) {
                    Ok(Classified::Failed(invite_err)) => invite_err,
                    Ok(Classified::AlreadyRequested) => {
                        InviteError::Preview(FALLBACK_MESSAGE.to_string())
                    }
                    Err(other) => {
                        self.state = InviteState::PreviewError(InviteError::Preview(
                            other.user_message(),
                        ));
                        return Err(other);
                    }
                };
                warn!("Invite {} preview failed: {}", self.token, invite_err);
                self.state = InviteState::PreviewError(invite_err.clone());
                Err(invite_err.into())
            }
        }
    }

    /// POST /user/groups/join. Needs a loaded preview in this flow.
    pub async fn join(&mut self) -> ClientResult<JoinOutcome> {
        let group = match &self.state {
            InviteState::PreviewReady(group) => group.clone(),
            _ => return Err(InviteError::PreviewRequired.into()),
        };
        self.state = InviteState::Joining(group.clone());

        match self.api.join_group(self.token.as_str()).await {
            Ok(_) => {
                info!("Requested to join {}", group.name);
                self.state = InviteState::Requested(group.clone());
                Ok(JoinOutcome::Requested { group })
            }
            Err(err) => match classify(err, Stage::Join) {
                Ok(Classified::AlreadyRequested) => {
                    info!("Already a member of or pending in {}", group.name);
                    self.state = InviteState::AlreadyRequested(group.clone());
                    Ok(JoinOutcome::AlreadyRequested { group })
                }
                Ok(Classified::Failed(invite_err)) => {
                    warn!("Joining via invite {} failed: {}", self.token, invite_err);
                    self.state = InviteState::JoinError(invite_err.clone());
                    Err(invite_err.into())
                }
                Err(other) => {
                    // Transport and session failures leave the preview usable.
                    self.state = InviteState::PreviewReady(group);
                    Err(other)
                }
            },
        }
    }
}

/// Maps a failed invite call onto the invite taxonomy. A structured error
/// code wins over the message text. Errors that did not come from the
/// backend's answer (session, transport) are handed back untouched.
fn classify(err: ClientError, stage: Stage) -> Result<Classified, ClientError> {
    let (status, message, code) = match &err {
        ClientError::Api(f) | ClientError::NotFound(f) => {
            (f.status, f.message.clone(), f.code.clone())
        }
        ClientError::Permission(message) => (403, message.clone(), None),
        _ => return Err(err),
    };

    if let Some(code) = code.as_deref() {
        match code.to_ascii_uppercase().as_str() {
            "INVITE_EXPIRED" => return Ok(Classified::Failed(InviteError::Expired(message))),
            "INVITE_INVALID" => return Ok(Classified::Failed(InviteError::Invalid(message))),
            "ALREADY_MEMBER" | "ALREADY_REQUESTED" => return Ok(Classified::AlreadyRequested),
            _ => {}
        }
    }

    let lowered = message.to_lowercase();
    if lowered.contains("expired") {
        return Ok(Classified::Failed(InviteError::Expired(message)));
    }
    if lowered.contains("invalid") {
        return Ok(Classified::Failed(InviteError::Invalid(message)));
    }

    Ok(match stage {
        Stage::Preview if status == 404 => Classified::Failed(InviteError::Invalid(message)),
        Stage::Preview => Classified::Failed(InviteError::Preview(message)),
        Stage::Join if lowered.contains("already") || status == 409 => {
            Classified::AlreadyRequested
        }
        Stage::Join => Classified::Failed(InviteError::Join(message)),
    })
}
