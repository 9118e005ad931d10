//! Per-request configuration.
//!
//! Each request starts from the `ZOTERO_*` environment defaults, which are
//! then overlaid by query parameters. The request path names the collection.

use std::sync::Arc;

use crate::error::ProxyError;
use crate::models::{ApiKey, Entity, EntityKind, InclusionPolicy, OutputFormat};
use crate::utils::RequestLog;
use crate::zotero::CollectionCache;

/// Defaults taken from the process environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// `ZOTERO_GROUP`
    pub group: Option<String>,
    /// `ZOTERO_USER`, used when no group is set
    pub user: Option<String>,
    /// `ZOTERO_KEY`
    pub key: Option<String>,
    /// `ZOTERO_FORMAT`
    pub format: Option<String>,
    /// `ZOTERO_INCLUSION_STRATEGY`
    pub inclusion_strategy: Option<String>,
}

impl Environment {
    /// Read the `ZOTERO_*` variables; empty values count as unset
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            group: var("ZOTERO_GROUP"),
            user: var("ZOTERO_USER"),
            key: var("ZOTERO_KEY"),
            format: var("ZOTERO_FORMAT"),
            inclusion_strategy: var("ZOTERO_INCLUSION_STRATEGY"),
        }
    }
}

/// Query parameters of a request; the first occurrence of a name wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a raw `a=1&b=2` query string
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `remove_comments=true` suppresses the log block in the response
    pub fn remove_comments(&self) -> bool {
        self.get("remove_comments") == Some("true")
    }
}

/// Immutable configuration of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    pub entity: Entity,
    pub key: ApiKey,
    pub format: OutputFormat,
    pub inclusion: InclusionPolicy,
    pub collection_id: Option<String>,
    pub collection_lookup_failed: bool,
}

impl RequestConfig {
    /// Merge environment defaults with query overrides and validate.
    ///
    /// Collection selection is left to [`ConfigResolver::resolve`].
    pub fn from_sources(
        env: &Environment,
        query: &QueryParams,
        log: &RequestLog,
    ) -> Result<Self, ProxyError> {
        let (mut id, mut kind) = match &env.group {
            Some(group) => (group.clone(), EntityKind::Group),
            None => (env.user.clone().unwrap_or_default(), EntityKind::User),
        };
        if let Some(group_id) = query.get("group_id") {
            id = group_id.to_string();
        } else if let Some(user_id) = query.get("user_id") {
            id = user_id.to_string();
            kind = EntityKind::User;
        }

        let key = query
            .get("key")
            .map(str::to_string)
            .or_else(|| env.key.clone())
            .unwrap_or_default();
        let format = query
            .get("format")
            .or(env.format.as_deref())
            .map(OutputFormat::parse)
            .unwrap_or_default();
        let inclusion = query
            .get("inclusion_strategy")
            .or(env.inclusion_strategy.as_deref())
            .map(InclusionPolicy::parse)
            .unwrap_or_default();

        let mut missing = Vec::new();
        if id.is_empty() {
            log.error("`group_id` has not been set and is required");
            missing.push("group_id");
        }
        if key.is_empty() {
            log.error("`key` has not been set and is required");
            missing.push("key");
        }
        if !missing.is_empty() {
            log.error(
                "Please set the environment variables `ZOTERO_GROUP` or `ZOTERO_USER` and \
                 `ZOTERO_KEY` or the `group_id` and `key` query parameters.",
            );
            return Err(ProxyError::InvalidConfig(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        if !format.is_verified() {
            log.warn(format!(
                "Format '{}' has not been tested, only bibtex and biblatex are. Use at your own risk.",
                format
            ));
        }

        Ok(Self {
            entity: Entity::new(kind, id),
            key: ApiKey::new(key),
            format,
            inclusion,
            collection_id: None,
            collection_lookup_failed: false,
        })
    }

    /// Record the configuration summary, with the key masked
    pub fn log_summary(&self, log: &RequestLog) {
        log.info("Using configuration:");
        log.info(format!("  Entity Type: {}", self.entity.kind.label()));
        log.info(format!("  Entity ID: {}", self.entity.id));
        log.info(format!("  Key: {}", self.key.masked()));
        log.info(format!("  Format: {}", self.format));
        log.info(format!(
            "  Collection ID: {}",
            self.collection_id.as_deref().unwrap_or("None")
        ));
        log.info(format!("  Inclusion Strategy: {}", self.inclusion.as_str()));
    }
}

/// Builds [`RequestConfig`]s, resolving collection paths through the cache
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    collections: Arc<CollectionCache>,
}

impl ConfigResolver {
    pub fn new(collections: Arc<CollectionCache>) -> Self {
        Self { collections }
    }

    /// Resolve environment, path and query into a request configuration.
    ///
    /// A `collection_id` query parameter beats the path. A path that does not
    /// resolve, including when the collections cannot be listed at all, sets
    /// `collection_lookup_failed` instead of failing here.
    pub async fn resolve(
        &self,
        env: &Environment,
        path: &str,
        query: &QueryParams,
        log: &RequestLog,
    ) -> Result<RequestConfig, ProxyError> {
        let mut config = RequestConfig::from_sources(env, query, log)?;
        let path = path.trim_matches('/');

        if let Some(id) = query.get("collection_id").filter(|id| !id.is_empty()) {
            config.collection_id = Some(id.to_string());
        } else if path.is_empty() {
            log.info("No collection ID found");
        } else {
            log.info(format!("Trying to get collection id from name '{}'", path));
            match self
                .collections
                .resolve_path(&config.entity, &config.key, path, log)
                .await
            {
                Ok(id) => config.collection_id = Some(id),
                Err(e) => {
                    if !matches!(e, ProxyError::CollectionLookupFailed(_)) {
                        log.error(format!("Could not load the collections: {}", e));
                    }
                    log.error(format!("Collection not found: {}", path));
                    config.collection_lookup_failed = true;
                }
            }
        }

        Ok(config)
    }
}
