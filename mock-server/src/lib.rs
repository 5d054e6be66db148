//! In-memory stand-in for splunkd's REST surface.
//!
//! Serves `/services/auth/login`, `/services/server/info` and an echo
//! handler for every other `/services/...` and `/servicesNS/...` path. Every
//! route except login requires an `Authorization: Splunk <key>` header or a
//! `splunkd_8089` cookie carrying a live session key.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "splunkd_8089";
pub const SERVER_VERSION: &str = "9.1.2";

/// Accounts and live sessions.
#[derive(Clone, Default)]
pub struct MockState {
    users: Arc<HashMap<String, String>>,
    sessions: Arc<RwLock<HashSet<String>>>,
}

impl MockState {
    pub fn with_user(username: &str, password: &str) -> Self {
        let mut users = HashMap::new();
        users.insert(username.to_string(), password.to_string());
        Self {
            users: Arc::new(users),
            sessions: Arc::default(),
        }
    }

    /// Invalidate every session key handed out so far.
    pub async fn expire_sessions(&self) {
        self.sessions.write().await.clear();
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn is_live(&self, key: &str) -> bool {
        self.sessions.read().await.contains(key)
    }
}

/// What the echo handler saw, returned as JSON.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub cookie: Option<String>,
}

/// Router with the default `admin`/`changeme` account.
pub fn app() -> Router {
    app_with_state(MockState::with_user("admin", "changeme"))
}

pub fn app_with_state(state: MockState) -> Router {
    Router::new()
        .route("/services/auth/login", post(login))
        .route("/services/server/info", get(server_info))
        .route("/services/{*rest}", any(echo))
        .route("/servicesNS/{owner}/{app}/{*rest}", any(echo_namespaced))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, MockState::with_user("admin", "changeme")).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn messages(kind: &str, text: &str) -> Value {
    json!({ "messages": [{ "type": kind, "text": text }] })
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(messages("WARN", "call not properly authenticated")),
    )
        .into_response()
}

fn session_key_from(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    if let Some(key) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Splunk "))
    {
        return Some(key.to_string());
    }
    jar.get(SESSION_COOKIE)
        .map(|c| c.value_trimmed().to_string())
}

async fn authenticated(state: &MockState, headers: &HeaderMap, jar: &CookieJar) -> bool {
    match session_key_from(headers, jar) {
        Some(key) => state.is_live(&key).await,
        None => false,
    }
}

fn pairs(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

async fn login(
    State(state): State<MockState>,
    jar: CookieJar,
    Form(input): Form<LoginForm>,
) -> Response {
    if state.users.get(&input.username) != Some(&input.password) {
        debug!(username = %input.username, "rejected login");
        return (StatusCode::UNAUTHORIZED, Json(messages("WARN", "Login failed"))).into_response();
    }

    let key = Uuid::new_v4().simple().to_string();
    state.sessions.write().await.insert(key.clone());
    info!(username = %input.username, "session created");

    let body = Json(json!({ "sessionKey": key }));
    if input.cookie.as_deref() == Some("1") {
        let mut cookie = Cookie::new(SESSION_COOKIE, key);
        cookie.set_path("/");
        cookie.set_http_only(true);
        (jar.add(cookie), body).into_response()
    } else {
        body.into_response()
    }
}

async fn server_info(
    State(state): State<MockState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if !authenticated(&state, &headers, &jar).await {
        return unauthorized();
    }
    Json(json!({
        "entry": [{
            "name": "server-info",
            "content": { "version": SERVER_VERSION, "serverName": "mock-splunkd" }
        }]
    }))
    .into_response()
}

async fn echo(
    State(state): State<MockState>,
    method: Method,
    Path(rest): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    jar: CookieJar,
    body: String,
) -> Response {
    let path = format!("/services/{rest}");
    respond_echo(&state, method, path, query, &headers, &jar, &body).await
}

async fn echo_namespaced(
    State(state): State<MockState>,
    method: Method,
    Path((owner, app, rest)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    jar: CookieJar,
    body: String,
) -> Response {
    let path = format!("/servicesNS/{owner}/{app}/{rest}");
    respond_echo(&state, method, path, query, &headers, &jar, &body).await
}

async fn respond_echo(
    state: &MockState,
    method: Method,
    path: String,
    query: Option<String>,
    headers: &HeaderMap,
    jar: &CookieJar,
    body: &str,
) -> Response {
    if !authenticated(state, headers, jar).await {
        return unauthorized();
    }
    Json(Echo {
        method: method.to_string(),
        path,
        query: pairs(query.as_deref().unwrap_or_default()),
        form: pairs(body),
    })
    .into_response()
}
