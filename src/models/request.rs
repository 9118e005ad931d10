//! Value types making up a per-request configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner of a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
}

impl EntityKind {
    /// Path segment used by the remote API
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Group => "groups",
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, EntityKind::User)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Group => "Group",
        }
    }
}

/// A library owner: a user or a group, identified by its id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: String,
}

impl Entity {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(EntityKind::User, id)
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Group, id)
    }

    /// Library root relative to the API base, e.g. `groups/12345`
    pub fn api_path(&self) -> String {
        format!(
            "{}/{}",
            self.kind.path_segment(),
            urlencoding::encode(&self.id)
        )
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.id)
    }
}

/// Output format requested from the remote API
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Bibtex,
    Biblatex,
    #[serde(untagged)]
    Other(String),
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "bibtex" => OutputFormat::Bibtex,
            "biblatex" => OutputFormat::Biblatex,
            other => OutputFormat::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Bibtex => "bibtex",
            OutputFormat::Biblatex => "biblatex",
            OutputFormat::Other(s) => s,
        }
    }

    /// Formats whose entry boundaries the deduplication is known to handle
    pub fn is_verified(&self) -> bool {
        !matches!(self, OutputFormat::Other(_))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a collection request also pulls in its descendants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InclusionPolicy {
    #[default]
    All,
    OnlySelf,
}

impl InclusionPolicy {
    /// `"only-self"` selects [`InclusionPolicy::OnlySelf`], anything else is `All`
    pub fn parse(value: &str) -> Self {
        if value == "only-self" {
            InclusionPolicy::OnlySelf
        } else {
            InclusionPolicy::All
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InclusionPolicy::All => "all",
            InclusionPolicy::OnlySelf => "only-self",
        }
    }
}

/// API key whose `Debug` and `Display` never reveal more than four characters
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The full key, for the request header only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{}[omitted...]", prefix)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}
