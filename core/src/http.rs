//! HTTP transport shape for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. The crate never opens a socket:
//! the caller implements [`Http::make_request`] with whatever client it
//! already uses, and every other method on the trait (query encoding, form
//! bodies, response parsing) is provided on top of that one round-trip.
//!
//! All fields use owned types (`String`, `Vec`) so values can be handed to
//! any transport without lifetime concerns.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::error::{ResponseError, Result, SplunkMessage};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is fully qualified and already carries the encoded query string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Every value of `name`, compared case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Ordered request parameters. A key may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value for `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    /// Append every value in `values` under `key`.
    pub fn with_all<I>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let key = key.into();
        for value in values {
            self.0.push((key.clone(), value.to_string()));
        }
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

/// URL-encode `params`; repeated keys produce repeated pairs.
///
/// ```
/// use splunk_sdk::http::{encode, Params};
///
/// let params = Params::new().with("a", 1).with_all("b", [2, 3, 4]);
/// assert_eq!(encode(&params), "a=1&b=2&b=3&b=4");
/// ```
pub fn encode(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.iter() {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Everything `Http::request` needs besides the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub query: Params,
    /// Form-encoded into the body. Ignored when `body` is set.
    pub post: Params,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl RequestMessage {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            headers: Vec::new(),
            query: Params::new(),
            post: Params::new(),
            body: None,
            timeout: None,
        }
    }
}

/// Outcome of a request that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteResponse {
    pub response: HttpResponse,
    pub status: u16,
    pub data: Option<Value>,
    pub error: Option<ResponseError>,
}

impl CompleteResponse {
    /// Parse a raw response. Bodies that are not JSON are kept as a string.
    pub fn from_response(response: HttpResponse) -> Self {
        let status = response.status;
        let data = parse_body(&response.body);
        let error = (status >= 400).then(|| ResponseError {
            status,
            messages: data.as_ref().map(messages_of).unwrap_or_default(),
        });
        Self {
            response,
            status,
            data,
            error,
        }
    }

    /// Turn a populated `error` into `Err`.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(err) => Err(err.into()),
            None => Ok(self),
        }
    }
}

fn parse_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

fn messages_of(data: &Value) -> Vec<SplunkMessage> {
    data.get("messages")
        .cloned()
        .and_then(|m| serde_json::from_value(m).ok())
        .unwrap_or_default()
}

/// Transport used by `Context`.
///
/// Implementors supply `make_request`; it must return 4xx/5xx responses as
/// data, reserving `Err` for failures where no response arrived.
pub trait Http: Send + Sync {
    fn make_request(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Encode `message` against `url`, perform it and parse the outcome.
    fn request(&self, url: &str, message: RequestMessage) -> Result<CompleteResponse> {
        let mut full_url = url.to_string();
        if !message.query.is_empty() {
            full_url.push(if url.contains('?') { '&' } else { '?' });
            full_url.push_str(&encode(&message.query));
        }

        let mut headers = message.headers;
        let body = match message.body {
            Some(body) => Some(body),
            None if !message.post.is_empty() => {
                if !headers
                    .iter()
                    .any(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                {
                    headers.push((
                        "Content-Type".to_string(),
                        "application/x-www-form-urlencoded".to_string(),
                    ));
                }
                Some(encode(&message.post))
            }
            None => None,
        };

        debug!(method = %message.method, url = %full_url, "sending request");
        let response = self.make_request(HttpRequest {
            method: message.method,
            url: full_url,
            headers,
            body,
            timeout: message.timeout,
        })?;
        debug!(status = response.status, "received response");

        Ok(CompleteResponse::from_response(response))
    }

    fn get(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<CompleteResponse> {
        let message = RequestMessage {
            headers,
            query: params,
            timeout,
            ..RequestMessage::new(HttpMethod::Get)
        };
        self.request(url, message)
    }

    /// `params` are sent as a form-encoded body.
    fn post(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<CompleteResponse> {
        let message = RequestMessage {
            headers,
            post: params,
            timeout,
            ..RequestMessage::new(HttpMethod::Post)
        };
        self.request(url, message)
    }

    fn del(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        params: Params,
        timeout: Option<Duration>,
    ) -> Result<CompleteResponse> {
        let message = RequestMessage {
            headers,
            query: params,
            timeout,
            ..RequestMessage::new(HttpMethod::Delete)
        };
        self.request(url, message)
    }
}
