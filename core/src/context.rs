//! Session-holding connection to a splunkd instance.
//!
//! # Design
//! `Context` owns the resolved connection settings, the session key and the
//! cookie jar, and borrows I/O from a shared [`Http`] transport. Requests
//! take `&mut self` because any of them may refresh the session (autologin)
//! or absorb `Set-Cookie` headers.
//!
//! Relative REST paths are qualified with the context's namespace by
//! [`Context::fullpath`]; absolute paths (leading `/`) pass through.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cookie::{Cookie, CookieJar};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::config::{
    Config, DEFAULT_AUTHORIZATION, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SCHEME, DEFAULT_VERSION,
};
use crate::error::{Result, SplunkError};
use crate::http::{CompleteResponse, Http, HttpMethod, HttpResponse, Params, RequestMessage};
use crate::namespace::{Namespace, Sharing};

pub const LOGIN_PATH: &str = "/services/auth/login";

/// Characters `encodeURIComponent` leaves alone: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A connection to splunkd: settings, session and transport.
#[derive(Clone)]
pub struct Context {
    http: Arc<dyn Http>,
    scheme: String,
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    owner: Option<String>,
    app: Option<String>,
    session_key: Option<String>,
    autologin: bool,
    version: String,
    authorization: String,
    timeout: Option<Duration>,
    cookies: CookieJar,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("prefix", &self.prefix())
            .field("username", &self.username)
            .field("owner", &self.owner)
            .field("app", &self.app)
            .field("authenticated", &self.is_authenticated())
            .field("autologin", &self.autologin)
            .field("version", &self.version)
            .finish()
    }
}

impl Context {
    pub fn new(http: Arc<dyn Http>, config: Config) -> Self {
        let version = match config.version {
            Some(v) if v != "default" => v,
            _ => DEFAULT_VERSION.to_string(),
        };
        Self {
            http,
            scheme: config.scheme.unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: config.port.unwrap_or(DEFAULT_PORT),
            username: config.username,
            password: config.password,
            owner: config.owner,
            app: config.app,
            session_key: config.session_key.filter(|k| !k.is_empty()),
            autologin: config.autologin.unwrap_or(true),
            version,
            authorization: config
                .authorization
                .unwrap_or_else(|| DEFAULT_AUTHORIZATION.to_string()),
            timeout: config.timeout,
            cookies: CookieJar::new(),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// True when a session key or a session cookie is held.
    pub fn is_authenticated(&self) -> bool {
        self.session_key.is_some() || self.cookies.iter().next().is_some()
    }

    /// The settings this context was built from, with the current session key.
    pub fn config(&self) -> Config {
        Config {
            scheme: Some(self.scheme.clone()),
            host: Some(self.host.clone()),
            port: Some(self.port),
            username: self.username.clone(),
            password: self.password.clone(),
            owner: self.owner.clone(),
            app: self.app.clone(),
            session_key: self.session_key.clone(),
            autologin: Some(self.autologin),
            version: Some(self.version.clone()),
            authorization: Some(self.authorization.clone()),
            timeout: self.timeout,
        }
    }

    /// A copy scoped to `owner`/`app`, sharing transport, session and cookies.
    pub(crate) fn rescoped(&self, owner: &str, app: &str) -> Self {
        let mut config = self.config();
        config.owner = Some(owner.to_string());
        config.app = Some(app.to_string());
        let mut context = Context::new(Arc::clone(&self.http), config);
        context.cookies = self.cookies.clone();
        context
    }

    fn prefix(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Qualify a partial path with the namespace owner and app.
    ///
    /// Unset namespace parts fall back to the context, then to the `-`
    /// wildcard. `app`/`global` sharing forces owner `nobody`; `system`
    /// sharing forces owner `nobody` and app `system`.
    pub fn fullpath(&self, path: &str, namespace: &Namespace) -> String {
        if path.starts_with('/') {
            return path.to_string();
        }

        let app = non_empty(&namespace.app).or(non_empty(&self.app));
        if app.is_none() && namespace.sharing != Some(Sharing::System) {
            return format!("/services/{path}");
        }

        let mut owner = non_empty(&namespace.owner)
            .or(non_empty(&self.owner))
            .unwrap_or("-");
        let mut app = app.unwrap_or("-");
        match namespace.sharing {
            Some(Sharing::App) | Some(Sharing::Global) => owner = "nobody",
            Some(Sharing::System) => {
                owner = "nobody";
                app = "system";
            }
            Some(Sharing::User) | None => {}
        }

        format!(
            "/servicesNS/{}/{}/{}",
            utf8_percent_encode(owner, URI_COMPONENT),
            utf8_percent_encode(app, URI_COMPONENT),
            path
        )
    }

    /// Fully-qualified URL for `path` in the context's own namespace.
    pub fn urlify(&self, path: &str) -> String {
        format!("{}{}", self.prefix(), self.fullpath(path, &Namespace::default()))
    }

    /// Log in with the configured credentials and keep the session key.
    #[instrument(skip(self))]
    pub fn login(&mut self) -> Result<bool> {
        let (Some(username), Some(password)) = (self.username.clone(), self.password.clone())
        else {
            return Err(SplunkError::InvalidRequest(
                "login requires a username and a password".to_string(),
            ));
        };

        let message = RequestMessage {
            query: Params::new().with("output_mode", "json"),
            post: Params::new()
                .with("username", username)
                .with("password", password)
                .with("cookie", 1),
            timeout: self.timeout,
            ..RequestMessage::new(HttpMethod::Post)
        };
        let response = self.http.request(&self.urlify(LOGIN_PATH), message)?;
        self.store_cookies(&response.response);
        let response = response.into_result()?;

        let session_key = response
            .data
            .as_ref()
            .and_then(|d| d.get("sessionKey"))
            .and_then(|k| k.as_str())
            .filter(|k| !k.is_empty())
            .ok_or(SplunkError::NoSessionKey)?;
        self.session_key = Some(session_key.to_string());
        info!("logged in");
        Ok(true)
    }

    /// Forget the session key and every cookie.
    pub fn logout(&mut self) {
        self.session_key = None;
        self.cookies = CookieJar::new();
        info!("logged out");
    }

    pub fn get(&mut self, path: &str, params: Params) -> Result<CompleteResponse> {
        self.request(path, HttpMethod::Get, params, Params::new(), None, Vec::new())
    }

    /// `params` are sent as a form-encoded body.
    pub fn post(&mut self, path: &str, params: Params) -> Result<CompleteResponse> {
        self.request(path, HttpMethod::Post, Params::new(), params, None, Vec::new())
    }

    pub fn del(&mut self, path: &str, params: Params) -> Result<CompleteResponse> {
        self.request(path, HttpMethod::Delete, params, Params::new(), None, Vec::new())
    }

    /// Issue an arbitrary request. `post` and `body` are mutually exclusive.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub fn request(
        &mut self,
        path: &str,
        method: HttpMethod,
        mut query: Params,
        post: Params,
        body: Option<String>,
        headers: Vec<(String, String)>,
    ) -> Result<CompleteResponse> {
        if body.is_some() && !post.is_empty() {
            return Err(SplunkError::InvalidRequest(
                "post parameters and a raw body are mutually exclusive".to_string(),
            ));
        }
        if query.get("output_mode").is_none() {
            query.push("output_mode", "json");
        }

        let message = RequestMessage {
            method,
            headers,
            query,
            post,
            body,
            timeout: self.timeout,
        };
        let url = self.urlify(path);

        if self.autologin && !self.is_authenticated() && self.has_credentials() {
            debug!("no session yet, logging in first");
            self.login()?;
        }

        let response = self.send(&url, message.clone())?;
        if response.status == 401 && self.autologin && self.has_credentials() {
            warn!("session rejected, logging in again");
            self.session_key = None;
            self.login()?;
            return self.send(&url, message)?.into_result();
        }
        response.into_result()
    }

    /// Compare the server version with `other`: `Less` when this version is
    /// older, `Greater` when newer. Missing components count as zero.
    pub fn version_compare(&self, other: &str) -> Ordering {
        let ours = version_components(&self.version);
        let theirs = version_components(other);
        let len = ours.len().max(theirs.len());
        (0..len)
            .map(|i| {
                let a = ours.get(i).copied().unwrap_or(0);
                let b = theirs.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    fn send(&mut self, url: &str, mut message: RequestMessage) -> Result<CompleteResponse> {
        message.headers = self.auth_headers(message.headers);
        let response = self.http.request(url, message)?;
        self.store_cookies(&response.response);
        Ok(response)
    }

    fn auth_headers(&self, extra: Vec<(String, String)>) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(extra.len() + 2);
        if let Some(key) = &self.session_key {
            headers.push((
                "Authorization".to_string(),
                format!("{} {}", self.authorization, key),
            ));
        }
        let cookie = self
            .cookies
            .iter()
            .map(|c| c.stripped().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        if !cookie.is_empty() {
            headers.push(("Cookie".to_string(), cookie));
        }
        headers.extend(extra);
        headers
    }

    /// Absorb `Set-Cookie` headers. Expired or emptied cookies are dropped.
    fn store_cookies(&mut self, response: &HttpResponse) {
        for raw in response.header_values("set-cookie") {
            let cookie = match Cookie::parse(raw.to_string()) {
                Ok(cookie) => cookie,
                Err(e) => {
                    debug!(error = %e, "ignoring malformed Set-Cookie");
                    continue;
                }
            };
            if is_expired(&cookie) {
                debug!(name = cookie.name(), "server removed cookie");
                self.cookies.remove(Cookie::new(cookie.name().to_string(), ""));
            } else {
                self.cookies.add(cookie);
            }
        }
    }
}

fn is_expired(cookie: &Cookie<'_>) -> bool {
    if cookie.value().is_empty() {
        return true;
    }
    if cookie
        .max_age()
        .is_some_and(|age| age <= time::Duration::ZERO)
    {
        return true;
    }
    cookie
        .expires_datetime()
        .is_some_and(|at| at <= OffsetDateTime::now_utc())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Numeric value of each dot-separated component. Only the leading digits of
/// a component count ("0rc1" is 0); a component without digits is 0.
fn version_components(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| {
            let digits: String = part
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}
