//! Resource visibility scopes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SplunkError;

/// Visibility level of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sharing {
    User,
    App,
    Global,
    System,
}

impl Sharing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sharing::User => "user",
            Sharing::App => "app",
            Sharing::Global => "global",
            Sharing::System => "system",
        }
    }
}

impl fmt::Display for Sharing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sharing {
    type Err = SplunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Sharing::User),
            "app" => Ok(Sharing::App),
            "global" => Ok(Sharing::Global),
            "system" => Ok(Sharing::System),
            other => Err(SplunkError::InvalidRequest(format!(
                "unknown sharing level: {other}"
            ))),
        }
    }
}

/// An (owner, app, sharing) triple. Unset parts fall back to the context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespace {
    pub owner: Option<String>,
    pub app: Option<String>,
    pub sharing: Option<Sharing>,
}

impl Namespace {
    pub fn new(owner: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            app: Some(app.into()),
            sharing: None,
        }
    }

    pub fn with_sharing(mut self, sharing: Sharing) -> Self {
        self.sharing = Some(sharing);
        self
    }
}
