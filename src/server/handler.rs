//! End-to-end handling of one bibliography request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigResolver, Environment, QueryParams, RequestConfig, Settings};
use crate::error::ProxyError;
use crate::models::InclusionPolicy;
use crate::utils::{comment_lines, HttpClient, RequestLog};
use crate::zotero::{merge, BibliographyAssembler, CollectionCache, ZoteroApi};

/// Stages a request moves through. `CollectionLookupFailed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ConfigResolved,
    CollectionLookupFailed,
    CollectionResolved,
    Fetched,
    Assembled,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::ConfigResolved => "config-resolved",
            Stage::CollectionLookupFailed => "collection-lookup-failed",
            Stage::CollectionResolved => "collection-resolved",
            Stage::Fetched => "fetched",
            Stage::Assembled => "assembled",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Turns a request path and query into a response body.
///
/// Stateless across requests apart from the shared collection cache.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    env: Environment,
    resolver: ConfigResolver,
    collections: Arc<CollectionCache>,
    assembler: BibliographyAssembler,
}

impl RequestHandler {
    pub fn new(env: Environment, collections: Arc<CollectionCache>) -> Self {
        let resolver = ConfigResolver::new(Arc::clone(&collections));
        let assembler = BibliographyAssembler::new(collections.api().clone());
        Self {
            env,
            resolver,
            collections,
            assembler,
        }
    }

    /// Wire up the API client and collection cache from settings
    pub fn from_settings(settings: &Settings, env: Environment) -> Result<Self, ProxyError> {
        let api = ZoteroApi::from_config(&settings.api, HttpClient::new()?);
        let ttl = settings.cache.collection_ttl_seconds.map(Duration::from_secs);
        let collections = Arc::new(CollectionCache::new(api).with_ttl(ttl));
        Ok(Self::new(env, collections))
    }

    pub fn collections(&self) -> &Arc<CollectionCache> {
        &self.collections
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Handle one request. Failures end up in the body, never as an `Err`.
    pub async fn handle(&self, path: &str, query: &QueryParams) -> String {
        let log = RequestLog::new();
        log.debug(format!("stage: {}", Stage::Start));
        let result = self.bibliography(path, query, &log).await;
        let body = render_body(result, &log, query.remove_comments());
        log.debug(format!("stage: {}", Stage::Responded));
        body
    }

    async fn bibliography(
        &self,
        path: &str,
        query: &QueryParams,
        log: &RequestLog,
    ) -> Result<String, ProxyError> {
        let config = self.resolver.resolve(&self.env, path, query, log).await?;
        log.debug(format!("stage: {}", Stage::ConfigResolved));
        config.log_summary(log);

        if config.collection_lookup_failed {
            log.debug(format!("stage: {}", Stage::CollectionLookupFailed));
            return Err(ProxyError::CollectionLookupFailed(
                path.trim_matches('/').to_string(),
            ));
        }
        log.debug(format!("stage: {}", Stage::CollectionResolved));

        let children = self.sub_collections(&config, log).await?;
        let bibliographies = self.assembler.fetch(&config, &children, log).await;
        log.debug(format!("stage: {}", Stage::Fetched));
        let bibliography = merge(&bibliographies, log);
        log.debug(format!("stage: {}", Stage::Assembled));
        Ok(bibliography)
    }

    async fn sub_collections(
        &self,
        config: &RequestConfig,
        log: &RequestLog,
    ) -> Result<Vec<(String, String)>, ProxyError> {
        let Some(collection_id) = config.collection_id.as_deref() else {
            return Ok(Vec::new());
        };
        if config.inclusion == InclusionPolicy::OnlySelf {
            return Ok(Vec::new());
        }

        let children = self
            .collections
            .descendants_of(&config.entity, &config.key, Some(collection_id), log)
            .await?;
        if !children.is_empty() {
            log.info("Including sub-collections:");
            for (name, id) in &children {
                log.info(format!("  {}: {}", name, id));
            }
        }
        Ok(children)
    }
}

/// Compose the response body from the outcome and the request log.
///
/// With comments, the log comes first as a `% ` commented block followed by a
/// blank line. Without comments, a failed request still reports its error on
/// a single commented line.
pub fn render_body(
    result: Result<String, ProxyError>,
    log: &RequestLog,
    remove_comments: bool,
) -> String {
    let (bibliography, error) = match result {
        Ok(bibliography) => (bibliography, None),
        Err(e) => {
            log.error(format!("An error occurred: {}", e));
            (String::new(), Some(e))
        }
    };

    if !remove_comments {
        return format!("{}\n{}", log.render_commented(), bibliography);
    }
    match error {
        Some(e) => comment_lines(&format!("{}\n", e)),
        None => bibliography,
    }
}
