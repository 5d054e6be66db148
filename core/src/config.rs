//! Connection settings for a splunkd instance.
//!
//! # Design
//! Every field is optional; `Context::new` fills the gaps with the defaults
//! below. A `Config` can be deserialized from JSON (accepting the camelCase
//! spellings used by other Splunk SDKs) or read from `SPLUNK_*` environment
//! variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplunkError};

pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8089;
pub const DEFAULT_VERSION: &str = "5.0";
pub const DEFAULT_AUTHORIZATION: &str = "Splunk";

/// How to reach and authenticate against splunkd.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `http` or `https`.
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Owner component of the default namespace.
    pub owner: Option<String>,
    /// App component of the default namespace.
    pub app: Option<String>,
    #[serde(alias = "sessionKey")]
    pub session_key: Option<String>,
    /// Log in again when the session expires.
    pub autologin: Option<bool>,
    /// splunkd version, for example "4.3.2".
    pub version: Option<String>,
    /// Word placed before the session key in the `Authorization` header.
    pub authorization: Option<String>,
    #[serde(with = "secs", alias = "timeoutSecs")]
    pub timeout: Option<Duration>,
}

impl Config {
    /// Read `SPLUNK_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            scheme: lookup("SPLUNK_SCHEME"),
            host: lookup("SPLUNK_HOST"),
            port: parse_var(&lookup, "SPLUNK_PORT")?,
            username: lookup("SPLUNK_USERNAME"),
            password: lookup("SPLUNK_PASSWORD"),
            owner: lookup("SPLUNK_OWNER"),
            app: lookup("SPLUNK_APP"),
            session_key: lookup("SPLUNK_SESSION_KEY"),
            autologin: parse_var(&lookup, "SPLUNK_AUTOLOGIN")?,
            version: lookup("SPLUNK_VERSION"),
            authorization: lookup("SPLUNK_AUTHORIZATION"),
            timeout: parse_var::<u64, _>(&lookup, "SPLUNK_TIMEOUT_SECS")?
                .map(Duration::from_secs),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| SplunkError::Config {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
