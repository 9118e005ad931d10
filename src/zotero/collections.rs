//! Collection path index and the process-wide cache of indexes.
//!
//! A collection is addressed by its path: the display names of its ancestor
//! chain joined with `/`, e.g. `Papers/2024/Drafts`. Paths are derived from
//! the flat listing returned by the API every time the listing is refreshed.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::ZoteroApi;
use crate::error::ProxyError;
use crate::models::{ApiKey, Collection, Entity};
use crate::utils::RequestLog;

enum PathState {
    InProgress,
    Done(String),
}

/// Derive the path of every collection, parents before children.
///
/// Walks each ancestor chain iteratively, memoizing finished paths. A chain
/// that revisits a collection still in progress is a cycle; a parent key that
/// is not part of the listing is a dangling reference. Both are errors.
/// Returned pairs are `(path, key)` in derivation order.
pub fn build_paths(collections: &[Collection]) -> Result<Vec<(String, String)>, ProxyError> {
    let by_key: HashMap<&str, &Collection> =
        collections.iter().map(|c| (c.key.as_str(), c)).collect();
    let mut memo: HashMap<&str, PathState> = HashMap::with_capacity(collections.len());
    let mut paths = Vec::with_capacity(collections.len());

    for collection in collections {
        let mut chain: Vec<&Collection> = Vec::new();
        let mut current = collection;

        loop {
            match memo.get(current.key.as_str()) {
                Some(PathState::Done(_)) => break,
                Some(PathState::InProgress) => {
                    return Err(ProxyError::MalformedCollectionGraph(format!(
                        "cycle in parent chain at collection '{}' ({})",
                        current.name, current.key
                    )))
                }
                None => {}
            }
            memo.insert(current.key.as_str(), PathState::InProgress);
            chain.push(current);

            let Some(parent_key) = current.parent.as_deref() else {
                break;
            };
            current = by_key.get(parent_key).copied().ok_or_else(|| {
                ProxyError::MalformedCollectionGraph(format!(
                    "collection '{}' ({}) refers to unknown parent {}",
                    current.name, current.key, parent_key
                ))
            })?;
        }

        for link in chain.into_iter().rev() {
            let path = match link.parent.as_deref() {
                None => link.name.clone(),
                Some(parent_key) => match memo.get(parent_key) {
                    Some(PathState::Done(parent_path)) => format!("{}/{}", parent_path, link.name),
                    _ => {
                        return Err(ProxyError::MalformedCollectionGraph(format!(
                            "parent {} of '{}' has no path",
                            parent_key, link.name
                        )))
                    }
                },
            };
            memo.insert(link.key.as_str(), PathState::Done(path.clone()));
            paths.push((path, link.key.clone()));
        }
    }

    Ok(paths)
}

/// Mapping from collection path to collection key for one library
#[derive(Debug, Clone)]
pub struct CollectionIndex {
    entries: IndexMap<String, String>,
    built_at: Instant,
}

impl CollectionIndex {
    /// Build from a raw listing. Siblings sharing a name produce the same
    /// path; the first one keeps it and the collision is logged.
    pub fn build(collections: &[Collection], log: &RequestLog) -> Result<Self, ProxyError> {
        let mut entries = IndexMap::with_capacity(collections.len());
        for (path, key) in build_paths(collections)? {
            if let Some(existing) = entries.get(&path) {
                log.warn(format!(
                    "Collection path '{}' is used by both {} and {}, keeping {}",
                    path, existing, key, existing
                ));
                continue;
            }
            entries.insert(path, key);
        }

        Ok(Self {
            entries,
            built_at: Instant::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn id_for_path(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn path_for_id(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, key)| key.as_str() == id)
            .map(|(path, _)| path.as_str())
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.path_for_id(id).is_some()
    }

    /// All `(path, key)` pairs in index order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, k)| (p.as_str(), k.as_str()))
    }

    /// Collections below `id`, or every collection when `id` is `None`
    pub fn descendants(&self, id: Option<&str>) -> Result<Vec<(String, String)>, ProxyError> {
        let Some(id) = id else {
            return Ok(self.to_pairs(|_| true));
        };
        let path = self
            .path_for_id(id)
            .ok_or_else(|| ProxyError::CollectionNotFound(id.to_string()))?;
        let prefix = format!("{}/", path);
        Ok(self.to_pairs(|p| p.starts_with(&prefix)))
    }

    fn to_pairs(&self, keep: impl Fn(&str) -> bool) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(path, _)| keep(path))
            .map(|(path, key)| (path.clone(), key.clone()))
            .collect()
    }

    fn is_older_than(&self, ttl: Duration) -> bool {
        self.built_at.elapsed() > ttl
    }
}

/// Process-wide collection indexes, one per library.
///
/// Indexes are never patched in place: a refresh builds a complete
/// replacement and swaps it in, so concurrent readers see either the old or
/// the new index. A failed refresh leaves the previous index published.
#[derive(Debug)]
pub struct CollectionCache {
    api: ZoteroApi,
    indexes: RwLock<HashMap<Entity, Arc<CollectionIndex>>>,
    ttl: Option<Duration>,
}

impl CollectionCache {
    pub fn new(api: ZoteroApi) -> Self {
        Self {
            api,
            indexes: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Treat indexes older than `ttl` as missing
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn api(&self) -> &ZoteroApi {
        &self.api
    }

    /// Number of libraries with a cached index
    pub async fn len(&self) -> usize {
        self.indexes.read().await.len()
    }

    /// Cached index, including a stale one
    pub async fn get(&self, entity: &Entity) -> Option<Arc<CollectionIndex>> {
        self.indexes.read().await.get(entity).cloned()
    }

    async fn fresh(&self, entity: &Entity) -> Option<Arc<CollectionIndex>> {
        let index = self.get(entity).await?;
        match self.ttl {
            Some(ttl) if index.is_older_than(ttl) => None,
            _ => Some(index),
        }
    }

    /// Fetch the listing, rebuild the index and publish it
    pub async fn refresh(
        &self,
        entity: &Entity,
        key: &ApiKey,
        log: &RequestLog,
    ) -> Result<Arc<CollectionIndex>, ProxyError> {
        log.info(format!("Refreshing collections of {}", entity));
        let collections = self.api.collections(entity, key, log).await?;
        let index = Arc::new(CollectionIndex::build(&collections, log)?);
        self.indexes
            .write()
            .await
            .insert(entity.clone(), Arc::clone(&index));
        log.info(format!("Indexed {} collections", index.len()));
        Ok(index)
    }

    /// Key of the collection at `path`, refreshing once if it is unknown
    pub async fn resolve_path(
        &self,
        entity: &Entity,
        key: &ApiKey,
        path: &str,
        log: &RequestLog,
    ) -> Result<String, ProxyError> {
        if let Some(index) = self.fresh(entity).await {
            if let Some(id) = index.id_for_path(path) {
                return Ok(id.to_string());
            }
        }

        let index = self.refresh(entity, key, log).await?;
        index
            .id_for_path(path)
            .map(str::to_string)
            .ok_or_else(|| ProxyError::CollectionLookupFailed(path.to_string()))
    }

    /// Descendants of `id` (every collection for `None`), refreshing once if
    /// the library or the id is unknown
    pub async fn descendants_of(
        &self,
        entity: &Entity,
        key: &ApiKey,
        id: Option<&str>,
        log: &RequestLog,
    ) -> Result<Vec<(String, String)>, ProxyError> {
        let cached = self
            .fresh(entity)
            .await
            .filter(|index| id.map_or(true, |id| index.contains_id(id)));

        let index = match cached {
            Some(index) => index,
            None => self.refresh(entity, key, log).await?,
        };

        if id.is_none() {
            log.info("No collection provided, assuming library root-level wanted");
        }
        index.descendants(id)
    }
}
