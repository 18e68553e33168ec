// tests/support/mod.rs
//
// In-process fake of the Taskline REST backend. State lives in memory; tokens
// are real JWTs so expiry behaves like the real server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use actix_web::dev::{Service, ServerHandle};
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use chrono::{Local, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use taskline_client::datetime::{format_display_datetime, parse_instant};
use taskline_client::models::{Id, User};
use taskline_client::{AppState, Config, MemorySessionStore, Session};

const JWT_SECRET: &str = "test-secret";

// ─── DATA ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
struct UserRow {
    id: i64,
    full_name: String,
    username: String,
    email: String,
    password: String,
}

#[derive(Clone)]
struct MemberRow {
    user_id: i64,
    role: String,
}

#[derive(Clone)]
struct GroupRow {
    id: i64,
    name: String,
    description: Option<String>,
    members: Vec<MemberRow>,
}

#[derive(Clone)]
struct InviteRow {
    group_id: i64,
    expired: bool,
}

#[derive(Clone)]
struct TaskRow {
    id: i64,
    owner: i64,
    title: String,
    description: Option<String>,
    status: String,
    due_date: Option<String>,
    assigned_to: Option<i64>,
    group_id: Option<i64>,
}

#[derive(Default)]
struct Db {
    next_id: i64,
    users: Vec<UserRow>,
    groups: Vec<GroupRow>,
    invites: HashMap<String, InviteRow>,
    tasks: Vec<TaskRow>,
}

impl Db {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: i64) -> Option<&UserRow> {
        self.users.iter().find(|u| u.id == id)
    }

    fn group(&self, id: i64) -> Option<&GroupRow> {
        self.groups.iter().find(|g| g.id == id)
    }

    fn role_in(&self, group_id: i64, user_id: i64) -> Option<String> {
        self.group(group_id)?
            .members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.role.clone())
    }

    fn is_active_member(&self, group_id: i64, user_id: i64) -> bool {
        matches!(self.role_in(group_id, user_id).as_deref(), Some("admin" | "member"))
    }

    fn user_json(&self, id: i64) -> Value {
        match self.user(id) {
            Some(u) => json!({
                "id": u.id,
                "full_name": u.full_name,
                "username": u.username,
                "email": u.email,
                "created_at": "2026-01-10T08:00:00Z",
            }),
            None => Value::Null,
        }
    }

    fn assignee_json(&self, id: Option<i64>) -> Value {
        match id.and_then(|id| self.user(id)) {
            Some(u) => json!({"id": u.id, "full_name": u.full_name, "username": u.username}),
            None => Value::Null,
        }
    }

    fn group_json(&self, group: &GroupRow) -> Value {
        let members: Vec<Value> = group
            .members
            .iter()
            .map(|m| {
                let user = self.user(m.user_id);
                json!({
                    "user_id": m.user_id,
                    "role": m.role,
                    "full_name": user.map(|u| u.full_name.clone()),
                    "username": user.map(|u| u.username.clone()),
                    "email": user.map(|u| u.email.clone()),
                })
            })
            .collect();
        json!({
            "id": group.id,
            "name": group.name,
            "description": group.description,
            "members": members,
        })
    }

    // Shape of GET /user/tasks and the task write endpoints.
    fn task_json(&self, task: &TaskRow) -> Value {
        json!({
            "id": task.id,
            "title": task.title,
            "description": task.description,
            "status": task.status,
            "due_date": task.due_date,
            "assigned_to": self.assignee_json(task.assigned_to),
            "group_id": task.group_id,
        })
    }

    // Shape of GET /user/groups/{id}/tasks: labels for status, the due date
    // preformatted in local time, the assignee as an avatar without an id.
    fn group_task_json(&self, task: &TaskRow) -> Value {
        let label = match task.status.as_str() {
            "todo" => "To Do",
            "in progress" => "In Progress",
            _ => "Done",
        };
        let due = task
            .due_date
            .as_deref()
            .and_then(parse_instant)
            .map(|d| format_display_datetime(&d, &Local));
        let assignee = match task.assigned_to.and_then(|id| self.user(id)) {
            Some(u) => json!({"initials": initials(&u.full_name), "color": "green"}),
            None => Value::Null,
        };
        json!({
            "id": task.id.to_string(),
            "name": task.title,
            "desc": task.description,
            "status": label,
            "due": due,
            "assignee": assignee,
        })
    }
}

fn initials(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .take(2)
        .collect::<String>()
        .to_uppercase()
}

pub struct BackendState {
    db: Mutex<Db>,
    requests: AtomicUsize,
    fail_task_writes: AtomicBool,
    bare_update_ack: AtomicBool,
    sparse_update_reply: AtomicBool,
    status_delay_ms: AtomicU64,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            db: Mutex::new(Db::default()),
            requests: AtomicUsize::new(0),
            fail_task_writes: AtomicBool::new(false),
            bare_update_ack: AtomicBool::new(false),
            sparse_update_reply: AtomicBool::new(false),
            status_delay_ms: AtomicU64::new(0),
        }
    }
}

// ─── HELPERS ─────────────────────────────────────────────────────────────────

fn create_jwt(user_id: i64, exp: chrono::DateTime<Utc>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_ref()),
    )
    .expect("jwt encoding")
}

fn verify_token(token: &str) -> Result<i64, String> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_ref()),
        &Validation::default(),
    ) {
        Ok(token_data) => token_data
            .claims
            .sub
            .parse()
            .map_err(|_| "bad subject".to_string()),
        Err(e) => Err(format!("Token decode error: {}", e)),
    }
}

// Extracts the caller from "Authorization: Bearer <token>".
fn current_user(req: &HttpRequest) -> Result<i64, HttpResponse> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(fail(StatusCode::UNAUTHORIZED, "Missing token", None));
    };
    verify_token(token.trim())
        .map_err(|e| fail(StatusCode::UNAUTHORIZED, &format!("Invalid token: {}", e), None))
}

fn fail(status: StatusCode, message: &str, code: Option<&str>) -> HttpResponse {
    let mut body = json!({ "message": message });
    if let Some(code) = code {
        body["code"] = json!(code);
    }
    HttpResponse::build(status).json(body)
}

fn parse_id(raw: &str) -> Result<i64, HttpResponse> {
    raw.parse()
        .map_err(|_| fail(StatusCode::NOT_FOUND, "Not found", None))
}

macro_rules! try_resp {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    };
}

// ─── AUTH ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegisterInfo {
    full_name: String,
    username: String,
    email: String,
    password: String,
    password_confirm: String,
}

// POST /auth/register
async fn register(data: web::Data<BackendState>, info: web::Json<RegisterInfo>) -> impl Responder {
    let mut db = data.db.lock().unwrap();
    if info.password != info.password_confirm {
        return fail(StatusCode::BAD_REQUEST, "Passwords do not match", None);
    }
    if db
        .users
        .iter()
        .any(|u| u.username == info.username || u.email == info.email)
    {
        return fail(StatusCode::CONFLICT, "Username or email already taken", None);
    }
    let id = db.next_id();
    db.users.push(UserRow {
        id,
        full_name: info.full_name.clone(),
        username: info.username.clone(),
        email: info.email.clone(),
        password: info.password.clone(),
    });
    HttpResponse::Created().json(json!({ "data": db.user_json(id) }))
}

#[derive(Deserialize)]
struct LoginInfo {
    identity: String,
    password: String,
}

// POST /auth/login
async fn login(data: web::Data<BackendState>, info: web::Json<LoginInfo>) -> impl Responder {
    let db = data.db.lock().unwrap();
    let user = db.users.iter().find(|u| {
        (u.username == info.identity || u.email == info.identity) && u.password == info.password
    });
    match user {
        Some(u) => {
            let token = create_jwt(u.id, Utc::now() + chrono::Duration::hours(24));
            HttpResponse::Ok().json(json!({ "data": { "token": token, "user": db.user_json(u.id) } }))
        }
        None => fail(StatusCode::UNAUTHORIZED, "Invalid credentials", None),
    }
}

// ─── PROFILE ─────────────────────────────────────────────────────────────────

// GET /user/profile
async fn get_profile(req: HttpRequest, data: web::Data<BackendState>) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let db = data.db.lock().unwrap();
    HttpResponse::Ok().json(json!({ "data": db.user_json(user_id) }))
}

#[derive(Deserialize)]
struct ProfileInfo {
    full_name: Option<String>,
    username: Option<String>,
    email: Option<String>,
}

// PUT /user/profile
async fn update_profile(
    req: HttpRequest,
    data: web::Data<BackendState>,
    info: web::Json<ProfileInfo>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let mut db = data.db.lock().unwrap();
    if let Some(user) = db.users.iter_mut().find(|u| u.id == user_id) {
        if let Some(v) = &info.full_name {
            user.full_name = v.clone();
        }
        if let Some(v) = &info.username {
            user.username = v.clone();
        }
        if let Some(v) = &info.email {
            user.email = v.clone();
        }
    }
    HttpResponse::Ok().json(json!({ "data": db.user_json(user_id) }))
}

#[derive(Deserialize)]
struct PasswordInfo {
    current_password: String,
    password: String,
}

// PUT /user/profile/password
async fn change_password(
    req: HttpRequest,
    data: web::Data<BackendState>,
    info: web::Json<PasswordInfo>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let mut db = data.db.lock().unwrap();
    let Some(user) = db.users.iter_mut().find(|u| u.id == user_id) else {
        return fail(StatusCode::NOT_FOUND, "User not found", None);
    };
    if user.password != info.current_password {
        return fail(StatusCode::BAD_REQUEST, "Current password is incorrect", None);
    }
    user.password = info.password.clone();
    HttpResponse::Ok().json(json!({ "message": "Password updated" }))
}

// ─── TASKS ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TaskInfo {
    title: String,
    description: Option<String>,
    status: String,
    due_date: Option<String>,
    assigned_to_id: Option<Value>,
    group_id: Option<Value>,
}

fn value_id(v: &Option<Value>) -> Option<i64> {
    match v {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn valid_status(status: &str) -> bool {
    matches!(status, "todo" | "in progress" | "done")
}

fn writes_failing(data: &BackendState) -> Option<HttpResponse> {
    data.fail_task_writes
        .load(Ordering::SeqCst)
        .then(|| fail(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable", None))
}

// GET /user/tasks
async fn list_tasks(req: HttpRequest, data: web::Data<BackendState>) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let db = data.db.lock().unwrap();
    let tasks: Vec<Value> = db
        .tasks
        .iter()
        .filter(|t| {
            t.owner == user_id
                || t.assigned_to == Some(user_id)
                || t.group_id.is_some_and(|g| db.is_active_member(g, user_id))
        })
        .map(|t| db.task_json(t))
        .collect();
    HttpResponse::Ok().json(json!({ "data": tasks }))
}

// POST /user/tasks
async fn create_task(
    req: HttpRequest,
    data: web::Data<BackendState>,
    info: web::Json<TaskInfo>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    if let Some(resp) = writes_failing(&data) {
        return resp;
    }
    if info.title.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Title is required", None);
    }
    if !valid_status(&info.status) {
        return fail(StatusCode::BAD_REQUEST, "Invalid status", None);
    }
    let mut db = data.db.lock().unwrap();
    let group_id = value_id(&info.group_id);
    if let Some(g) = group_id {
        if !db.is_active_member(g, user_id) {
            return fail(StatusCode::FORBIDDEN, "You are not a member of this group", None);
        }
    }
    let id = db.next_id();
    let task = TaskRow {
        id,
        owner: user_id,
        title: info.title.clone(),
        description: info.description.clone(),
        status: info.status.clone(),
        due_date: info.due_date.clone(),
        assigned_to: value_id(&info.assigned_to_id),
        group_id,
    };
    let body = db.task_json(&task);
    db.tasks.push(task);
    HttpResponse::Created().json(json!({ "data": body }))
}

// PUT /user/tasks/{id}
async fn update_task(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
    info: web::Json<TaskInfo>,
) -> impl Responder {
    try_resp!(current_user(&req));
    let task_id = try_resp!(parse_id(&path));
    if let Some(resp) = writes_failing(&data) {
        return resp;
    }
    let mut db = data.db.lock().unwrap();
    let Some(task) = db.tasks.iter_mut().find(|t| t.id == task_id) else {
        return fail(StatusCode::NOT_FOUND, "Task not found", None);
    };
    task.title = info.title.clone();
    task.description = info.description.clone();
    task.status = info.status.clone();
    task.due_date = info.due_date.clone();
    task.assigned_to = value_id(&info.assigned_to_id);
    task.group_id = value_id(&info.group_id);
    let task = task.clone();

    if data.bare_update_ack.load(Ordering::SeqCst) {
        return HttpResponse::Ok().json(json!({ "message": "Task updated" }));
    }
    if data.sparse_update_reply.load(Ordering::SeqCst) {
        return HttpResponse::Ok().json(json!({
            "data": { "id": task.id, "title": task.title, "status": task.status }
        }));
    }
    HttpResponse::Ok().json(json!({ "data": db.task_json(&task) }))
}

#[derive(Deserialize)]
struct StatusInfo {
    status: String,
}

// PATCH /user/tasks/{id}
async fn update_task_status(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
    info: web::Json<StatusInfo>,
) -> impl Responder {
    try_resp!(current_user(&req));
    let task_id = try_resp!(parse_id(&path));

    let delay = data.status_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        actix_web::rt::time::sleep(Duration::from_millis(delay)).await;
    }
    if let Some(resp) = writes_failing(&data) {
        return resp;
    }
    if !valid_status(&info.status) {
        return fail(StatusCode::BAD_REQUEST, "Invalid status", None);
    }
    let mut db = data.db.lock().unwrap();
    match db.tasks.iter_mut().find(|t| t.id == task_id) {
        Some(task) => {
            task.status = info.status.clone();
            HttpResponse::Ok().json(json!({ "message": "Status updated" }))
        }
        None => fail(StatusCode::NOT_FOUND, "Task not found", None),
    }
}

// DELETE /user/tasks/{id}
async fn delete_task(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
) -> impl Responder {
    try_resp!(current_user(&req));
    let task_id = try_resp!(parse_id(&path));
    if let Some(resp) = writes_failing(&data) {
        return resp;
    }
    let mut db = data.db.lock().unwrap();
    let before = db.tasks.len();
    db.tasks.retain(|t| t.id != task_id);
    if db.tasks.len() == before {
        return fail(StatusCode::NOT_FOUND, "Task not found", None);
    }
    HttpResponse::Ok().body("Task deleted")
}

// ─── GROUPS ──────────────────────────────────────────────────────────────────

// GET /user/groups/me
async fn my_groups(req: HttpRequest, data: web::Data<BackendState>) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let db = data.db.lock().unwrap();
    let groups: Vec<Value> = db
        .groups
        .iter()
        .filter(|g| db.is_active_member(g.id, user_id))
        .map(|g| db.group_json(g))
        .collect();
    HttpResponse::Ok().json(json!({ "data": groups }))
}

#[derive(Deserialize)]
struct GroupInfo {
    name: String,
    description: Option<String>,
}

// POST /user/groups
async fn create_group(
    req: HttpRequest,
    data: web::Data<BackendState>,
    info: web::Json<GroupInfo>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let mut db = data.db.lock().unwrap();
    let id = db.next_id();
    let group = GroupRow {
        id,
        name: info.name.clone(),
        description: info.description.clone(),
        members: vec![MemberRow {
            user_id,
            role: "admin".into(),
        }],
    };
    let body = db.group_json(&group);
    db.groups.push(group);
    HttpResponse::Created().json(json!({ "data": body }))
}

// GET /user/groups/{id}
async fn get_group(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let group_id = try_resp!(parse_id(&path));
    let db = data.db.lock().unwrap();
    let Some(group) = db.group(group_id) else {
        return fail(StatusCode::NOT_FOUND, "Group not found", None);
    };
    if !db.is_active_member(group_id, user_id) {
        return fail(StatusCode::FORBIDDEN, "You are not a member of this group", None);
    }
    HttpResponse::Ok().json(json!({ "data": db.group_json(group) }))
}

// GET /user/groups/{id}/tasks
async fn group_tasks(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let group_id = try_resp!(parse_id(&path));
    let db = data.db.lock().unwrap();
    if db.group(group_id).is_none() {
        return fail(StatusCode::NOT_FOUND, "Group not found", None);
    }
    if !db.is_active_member(group_id, user_id) {
        return fail(StatusCode::FORBIDDEN, "You are not a member of this group", None);
    }
    let tasks: Vec<Value> = db
        .tasks
        .iter()
        .filter(|t| t.group_id == Some(group_id))
        .map(|t| db.group_task_json(t))
        .collect();
    HttpResponse::Ok().json(tasks)
}

// GET /user/groups/{id}/invite
async fn invite_link(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let group_id = try_resp!(parse_id(&path));
    let mut db = data.db.lock().unwrap();
    if db.role_in(group_id, user_id).as_deref() != Some("admin") {
        return fail(StatusCode::FORBIDDEN, "Only the admin can invite", None);
    }
    let token = Uuid::new_v4().simple().to_string();
    db.invites.insert(
        token.clone(),
        InviteRow {
            group_id,
            expired: false,
        },
    );
    HttpResponse::Ok().json(json!({
        "data": {
            "link": format!("http://taskline.test/groups/join/{}", token),
            "expires_days": 7,
        }
    }))
}

#[derive(Deserialize)]
struct ApprovalInfo {
    user_id: Value,
    approve: bool,
}

// POST /user/groups/{id}/approve
async fn review_member(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
    info: web::Json<ApprovalInfo>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let group_id = try_resp!(parse_id(&path));
    let mut db = data.db.lock().unwrap();
    if db.role_in(group_id, user_id).as_deref() != Some("admin") {
        return fail(StatusCode::FORBIDDEN, "Only the admin can approve members", None);
    }
    let Some(target) = value_id(&Some(info.user_id.clone())) else {
        return fail(StatusCode::BAD_REQUEST, "Invalid user id", None);
    };
    let Some(group) = db.groups.iter_mut().find(|g| g.id == group_id) else {
        return fail(StatusCode::NOT_FOUND, "Group not found", None);
    };
    let Some(idx) = group
        .members
        .iter()
        .position(|m| m.user_id == target && m.role == "pending")
    else {
        return fail(StatusCode::BAD_REQUEST, "User has no pending request", None);
    };
    if info.approve {
        group.members[idx].role = "member".into();
        HttpResponse::Ok().json(json!({ "message": "Member approved" }))
    } else {
        group.members.remove(idx);
        HttpResponse::Ok().json(json!({ "message": "Request rejected" }))
    }
}

#[derive(Deserialize)]
struct JoinInfo {
    token: String,
}

// POST /user/groups/join
async fn join_group(
    req: HttpRequest,
    data: web::Data<BackendState>,
    info: web::Json<JoinInfo>,
) -> impl Responder {
    let user_id = try_resp!(current_user(&req));
    let mut db = data.db.lock().unwrap();
    let Some(invite) = db.invites.get(&info.token).cloned() else {
        return fail(StatusCode::NOT_FOUND, "Invite token not found", Some("INVITE_INVALID"));
    };
    if invite.expired {
        return fail(StatusCode::BAD_REQUEST, "Invite link has expired", Some("INVITE_EXPIRED"));
    }
    if db.role_in(invite.group_id, user_id).is_some() {
        return fail(
            StatusCode::CONFLICT,
            "You are already a member or have a pending request",
            None,
        );
    }
    let Some(group) = db.groups.iter_mut().find(|g| g.id == invite.group_id) else {
        return fail(StatusCode::NOT_FOUND, "Group not found", None);
    };
    group.members.push(MemberRow {
        user_id,
        role: "pending".into(),
    });
    HttpResponse::Ok().json(json!({ "data": { "group_id": invite.group_id, "status": "pending" } }))
}

// GET /user/groups/preview/{token}
async fn preview_group(
    req: HttpRequest,
    data: web::Data<BackendState>,
    path: web::Path<String>,
) -> impl Responder {
    try_resp!(current_user(&req));
    let db = data.db.lock().unwrap();
    let Some(invite) = db.invites.get(path.as_str()) else {
        return fail(StatusCode::NOT_FOUND, "Group not found", None);
    };
    if invite.expired {
        return fail(StatusCode::GONE, "This invite link has expired", None);
    }
    let Some(group) = db.group(invite.group_id) else {
        return fail(StatusCode::NOT_FOUND, "Group not found", None);
    };
    let active = group
        .members
        .iter()
        .filter(|m| m.role != "pending")
        .count();
    HttpResponse::Ok().json(json!({ "name": group.name, "members_count": active }))
}

// ─── SERVER ──────────────────────────────────────────────────────────────────

pub struct TestBackend {
    pub url: String,
    state: web::Data<BackendState>,
    handle: ServerHandle,
}

impl TestBackend {
    pub async fn start() -> Self {
        let state = web::Data::new(BackendState::default());
        let app_state = state.clone();

        let server = HttpServer::new(move || {
            let counter = app_state.clone();
            App::new()
                .app_data(app_state.clone())
                .wrap_fn(move |req, srv| {
                    counter.requests.fetch_add(1, Ordering::SeqCst);
                    srv.call(req)
                })
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(register))
                        .route("/login", web::post().to(login)),
                )
                .service(
                    web::scope("/user")
                        .route("/profile", web::get().to(get_profile))
                        .route("/profile", web::put().to(update_profile))
                        .route("/profile/password", web::put().to(change_password))
                        .route("/tasks", web::get().to(list_tasks))
                        .route("/tasks", web::post().to(create_task))
                        .route("/tasks/{id}", web::put().to(update_task))
                        .route("/tasks/{id}", web::patch().to(update_task_status))
                        .route("/tasks/{id}", web::delete().to(delete_task))
                        .route("/groups/me", web::get().to(my_groups))
                        .route("/groups/join", web::post().to(join_group))
                        .route("/groups/preview/{token}", web::get().to(preview_group))
                        .route("/groups", web::post().to(create_group))
                        .route("/groups/{id}", web::get().to(get_group))
                        .route("/groups/{id}/tasks", web::get().to(group_tasks))
                        .route("/groups/{id}/invite", web::get().to(invite_link))
                        .route("/groups/{id}/approve", web::post().to(review_member)),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind test backend");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    pub fn config(&self) -> Config {
        Config::new(self.url.clone())
    }

    /// Client state with an in-memory session store and nobody signed in.
    pub fn app(&self) -> AppState {
        AppState::new(self.config(), MemorySessionStore::default()).expect("app state")
    }

    /// Client state already signed in as `user_id`.
    pub fn signed_in(&self, user_id: i64) -> AppState {
        let app = self.app();
        app.session
            .establish(self.session_for(user_id))
            .expect("establish session");
        app
    }

    pub fn session_for(&self, user_id: i64) -> Session {
        Session {
            token: self.token_for(user_id),
            user: self.user_model(user_id),
        }
    }

    pub fn user_model(&self, user_id: i64) -> User {
        let db = self.state.db.lock().unwrap();
        serde_json::from_value(db.user_json(user_id)).expect("user json")
    }

    pub fn token_for(&self, user_id: i64) -> String {
        create_jwt(user_id, Utc::now() + chrono::Duration::hours(24))
    }

    pub fn expired_token_for(&self, user_id: i64) -> String {
        create_jwt(user_id, Utc::now() - chrono::Duration::hours(2))
    }

    pub fn seed_user(&self, username: &str, password: &str) -> i64 {
        let mut db = self.state.db.lock().unwrap();
        let id = db.next_id();
        let mut full_name = username.to_string();
        if let Some(first) = full_name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        db.users.push(UserRow {
            id,
            full_name,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: password.to_string(),
        });
        id
    }

    pub fn seed_group(&self, name: &str, admin: i64) -> i64 {
        let mut db = self.state.db.lock().unwrap();
        let id = db.next_id();
        db.groups.push(GroupRow {
            id,
            name: name.to_string(),
            description: None,
            members: vec![MemberRow {
                user_id: admin,
                role: "admin".into(),
            }],
        });
        id
    }

    pub fn add_member(&self, group_id: i64, user_id: i64, role: &str) {
        let mut db = self.state.db.lock().unwrap();
        if let Some(group) = db.groups.iter_mut().find(|g| g.id == group_id) {
            group.members.push(MemberRow {
                user_id,
                role: role.to_string(),
            });
        }
    }

    pub fn member_role(&self, group_id: i64, user_id: i64) -> Option<String> {
        self.state.db.lock().unwrap().role_in(group_id, user_id)
    }

    pub fn seed_invite(&self, group_id: i64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.state.db.lock().unwrap().invites.insert(
            token.clone(),
            InviteRow {
                group_id,
                expired: false,
            },
        );
        token
    }

    pub fn expire_invite(&self, token: &str) {
        if let Some(invite) = self.state.db.lock().unwrap().invites.get_mut(token) {
            invite.expired = true;
        }
    }

    pub fn seed_task(&self, owner: i64, title: &str, group_id: Option<i64>) -> i64 {
        let mut db = self.state.db.lock().unwrap();
        let id = db.next_id();
        db.tasks.push(TaskRow {
            id,
            owner,
            title: title.to_string(),
            description: Some(format!("{} details", title)),
            status: "todo".into(),
            due_date: Some("2026-03-05T03:00:00.000Z".into()),
            assigned_to: Some(owner),
            group_id,
        });
        id
    }

    pub fn task_status(&self, task_id: i64) -> Option<String> {
        let db = self.state.db.lock().unwrap();
        db.tasks.iter().find(|t| t.id == task_id).map(|t| t.status.clone())
    }

    pub fn task_due(&self, task_id: i64) -> Option<String> {
        let db = self.state.db.lock().unwrap();
        db.tasks
            .iter()
            .find(|t| t.id == task_id)
            .and_then(|t| t.due_date.clone())
    }

    pub fn task_count(&self) -> usize {
        self.state.db.lock().unwrap().tasks.len()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn fail_task_writes(&self, on: bool) {
        self.state.fail_task_writes.store(on, Ordering::SeqCst);
    }

    pub fn bare_update_ack(&self, on: bool) {
        self.state.bare_update_ack.store(on, Ordering::SeqCst);
    }

    /// PUT replies carry only id, title and status.
    pub fn sparse_update_reply(&self, on: bool) {
        self.state.sparse_update_reply.store(on, Ordering::SeqCst);
    }

    pub fn status_delay(&self, ms: u64) {
        self.state.status_delay_ms.store(ms, Ordering::SeqCst);
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        // Fire and forget; the runtime is shutting down with the test anyway.
        drop(self.handle.stop(false));
    }
}

pub fn id(raw: i64) -> Id {
    Id::from(raw)
}
