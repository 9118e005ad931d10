//! Zotero Web API access.
//!
//! - [`BatchFetcher`]: paginated listing fetches with concurrent page fan-out
//! - [`ZoteroApi`]: URL layout, authentication and typed listings on top of it
//! - [`CollectionCache`] / [`CollectionIndex`]: per-library collection path index
//! - [`BibliographyAssembler`]: merged, deduplicated bibliography for a request
//!
//! API documentation: <https://www.zotero.org/support/dev/web_api/v3/basics>

mod batch;
mod bibliography;
mod collections;

pub use batch::{page_starts, BatchFetcher, DEFAULT_PAGE_SIZE, TOTAL_RESULTS_HEADER};
pub use bibliography::{merge, BibliographyAssembler};
pub use collections::{build_paths, CollectionCache, CollectionIndex};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::ProxyError;
use crate::models::{parse_collections, ApiKey, Collection, Entity, OutputFormat};
use crate::utils::{HttpClient, RequestLog};

/// Default base URL of the Zotero Web API
pub const ZOTERO_API_BASE: &str = "https://api.zotero.org";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "zotero-api-key";

/// Item type filter applied to every item listing. Attachments count towards
/// `Total-Results` without being rendered, which would leave pages half empty.
pub const ITEM_TYPE_FILTER: &str = "-attachment";

/// Typed access to the library endpoints used by the proxy
#[derive(Debug, Clone)]
pub struct ZoteroApi {
    base_url: String,
    fetcher: BatchFetcher,
}

impl ZoteroApi {
    pub fn new(base_url: impl Into<String>, fetcher: BatchFetcher) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, fetcher }
    }

    /// Build from the `[api]` settings section
    pub fn from_config(config: &ApiConfig, client: HttpClient) -> Self {
        let fetcher = BatchFetcher::new(client)
            .page_size(config.page_size)
            .timeout(Duration::from_secs(config.timeout_seconds));
        Self::new(&config.base_url, fetcher)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{users|groups}/{id}/collections`
    pub fn collections_url(&self, entity: &Entity) -> String {
        format!("{}/{}/collections", self.base_url, entity.api_path())
    }

    /// Top-level items of the whole library or of one collection
    pub fn items_url(&self, entity: &Entity, collection: Option<&str>) -> String {
        match collection {
            Some(id) => format!(
                "{}/{}/collections/{}/items/top",
                self.base_url,
                entity.api_path(),
                urlencoding::encode(id)
            ),
            None => format!("{}/{}/items/top", self.base_url, entity.api_path()),
        }
    }

    fn auth_headers(&self, key: &ApiKey) -> Result<HeaderMap, ProxyError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(key.expose())
            .map_err(|_| ProxyError::InvalidConfig("API key is not a valid header value".into()))?;
        headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        Ok(headers)
    }

    /// Every collection of the library, across all pages
    pub async fn collections(
        &self,
        entity: &Entity,
        key: &ApiKey,
        log: &RequestLog,
    ) -> Result<Vec<Collection>, ProxyError> {
        let url = self.collections_url(entity);
        let headers = self.auth_headers(key)?;
        let bodies = self.fetcher.fetch(&url, &headers, &[], log).await;
        if bodies.is_empty() {
            return Err(ProxyError::Api(format!(
                "No collection data received for {}",
                entity
            )));
        }

        let mut collections = Vec::new();
        for body in &bodies {
            collections.extend(parse_collections(body)?);
        }
        Ok(collections)
    }

    /// Serialized bibliography of the library or of one collection.
    ///
    /// Page bodies are trimmed and joined with a blank line. Failed pages have
    /// already been dropped by the fetcher, so this never fails.
    pub async fn bibliography(
        &self,
        entity: &Entity,
        key: &ApiKey,
        format: &OutputFormat,
        collection: Option<&str>,
        log: &RequestLog,
    ) -> String {
        let url = self.items_url(entity, collection);
        let headers = match self.auth_headers(key) {
            Ok(headers) => headers,
            Err(e) => {
                log.error(e.to_string());
                return String::new();
            }
        };
        let params = vec![
            ("format".to_string(), format.as_str().to_string()),
            ("itemType".to_string(), ITEM_TYPE_FILTER.to_string()),
        ];

        self.fetcher
            .fetch(&url, &headers, &params, log)
            .await
            .iter()
            .map(|body| body.trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
