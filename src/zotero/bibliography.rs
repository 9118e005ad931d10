//! Bibliography assembly: one fetch per collection, merged and deduplicated.

use futures_util::future::join_all;

use super::ZoteroApi;
use crate::config::RequestConfig;
use crate::models::InclusionPolicy;
use crate::utils::{deduplicate_entries, RequestLog};

/// Fetches the bibliographies of a request, one per target collection
#[derive(Debug, Clone)]
pub struct BibliographyAssembler {
    api: ZoteroApi,
}

impl BibliographyAssembler {
    pub fn new(api: ZoteroApi) -> Self {
        Self { api }
    }

    /// One bibliography per target collection, in `[root, descendants...]`
    /// order. Descendants are only fetched for the `all` policy with a
    /// resolved collection.
    pub async fn fetch(
        &self,
        config: &RequestConfig,
        descendants: &[(String, String)],
        log: &RequestLog,
    ) -> Vec<String> {
        let root = config.collection_id.as_deref();
        let mut targets: Vec<Option<&str>> = vec![root];
        if root.is_some() && config.inclusion == InclusionPolicy::All {
            targets.extend(descendants.iter().map(|(_, id)| Some(id.as_str())));
        }

        let fetches = targets.into_iter().map(|collection| {
            self.api
                .bibliography(&config.entity, &config.key, &config.format, collection, log)
        });
        join_all(fetches).await
    }
}

/// Concatenate fetched bibliographies and drop duplicate entries
pub fn merge(bibliographies: &[String], log: &RequestLog) -> String {
    let deduped = deduplicate_entries(&bibliographies.join("\n\n"));
    for key in &deduped.duplicate_keys {
        log.info(format!("Duplicate entry found, deduplicating: {}", key));
    }
    for key in &deduped.key_collisions {
        log.warn(format!("Duplicate key found: {}", key));
    }
    log.info(format!("Removed {} duplicates", deduped.removed));
    log.info(format!("Returning {} entries", deduped.entries.len()));
    deduped.text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApiKey, Entity, OutputFormat};
    use crate::utils::HttpClient;
    use crate::zotero::{BatchFetcher, TOTAL_RESULTS_HEADER};
    use mockito::{Matcher, Server};

    fn config(collection: Option<&str>, inclusion: InclusionPolicy) -> RequestConfig {
        RequestConfig {
            entity: Entity::group("1"),
            key: ApiKey::new("secret"),
            format: OutputFormat::Bibtex,
            inclusion,
            collection_id: collection.map(str::to_string),
            collection_lookup_failed: false,
        }
    }

    fn assembler(server: &Server) -> BibliographyAssembler {
        let fetcher = BatchFetcher::new(HttpClient::new().unwrap());
        BibliographyAssembler::new(ZoteroApi::new(server.url(), fetcher))
    }

    async fn assemble(
        server: &Server,
        config: &RequestConfig,
        descendants: &[(String, String)],
        log: &RequestLog,
    ) -> String {
        let bibliographies = assembler(server).fetch(config, descendants, log).await;
        merge(&bibliographies, log)
    }

    async fn items(server: &mut Server, path: &str, body: &str) -> mockito::Mock {
        server
            .mock("GET", path)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("format".into(), "bibtex".into()),
                Matcher::UrlEncoded("itemType".into(), "-attachment".into()),
            ]))
            .with_status(200)
            .with_header(TOTAL_RESULTS_HEADER, "1")
            .with_body(body)
            .create_async()
            .await
    }

    const SMITH: &str = "@article{smith2020,\n  title = {A}\n}";
    const JONES: &str = "@book{jones2019,\n  title = {B}\n}";

    #[tokio::test]
    async fn test_library_without_collection() {
        let mut server = Server::new_async().await;
        let mock = items(&mut server, "/groups/1/items/top", &format!("{}\n\n{}\n", SMITH, JONES))
            .await;

        let log = RequestLog::new();
        let text = assemble(&server, &config(None, InclusionPolicy::All), &[], &log).await;

        assert_eq!(text, format!("{}\n\n{}", SMITH, JONES));
        assert!(log.contains("Returning 2 entries"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_descendants_are_merged_and_deduplicated() {
        let mut server = Server::new_async().await;
        items(&mut server, "/groups/1/collections/A/items/top", SMITH).await;
        items(
            &mut server,
            "/groups/1/collections/B/items/top",
            &format!("{}\n\n{}", SMITH, JONES),
        )
        .await;

        let log = RequestLog::new();
        let descendants = vec![("Papers/2024".to_string(), "B".to_string())];
        let text = assemble(
            &server,
            &config(Some("A"), InclusionPolicy::All),
            &descendants,
            &log,
        )
        .await;

        assert_eq!(text, format!("{}\n\n{}", SMITH, JONES));
        assert!(log.contains("Duplicate entry found, deduplicating: smith2020"));
        assert!(log.contains("Removed 1 duplicates"));
    }

    #[tokio::test]
    async fn test_only_self_ignores_descendants() {
        let mut server = Server::new_async().await;
        let root = items(&mut server, "/groups/1/collections/A/items/top", SMITH).await;
        let child = server
            .mock("GET", "/groups/1/collections/B/items/top")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let log = RequestLog::new();
        let descendants = vec![("Papers/2024".to_string(), "B".to_string())];
        let text = assemble(
            &server,
            &config(Some("A"), InclusionPolicy::OnlySelf),
            &descendants,
            &log,
        )
        .await;

        assert_eq!(text, SMITH);
        root.assert_async().await;
        child.assert_async().await;
    }

    #[tokio::test]
    async fn test_key_collision_is_logged() {
        let mut server = Server::new_async().await;
        let other = "@article{smith2020,\n  title = {Other}\n}";
        items(&mut server, "/groups/1/collections/A/items/top", SMITH).await;
        items(&mut server, "/groups/1/collections/B/items/top", other).await;

        let log = RequestLog::new();
        let descendants = vec![("X/Y".to_string(), "B".to_string())];
        let text = assemble(
            &server,
            &config(Some("A"), InclusionPolicy::All),
            &descendants,
            &log,
        )
        .await;

        assert_eq!(text, format!("{}\n\n{}", SMITH, other));
        assert!(log.contains("Duplicate key found: smith2020"));
    }

    #[tokio::test]
    async fn test_failed_descendant_contributes_nothing() {
        let mut server = Server::new_async().await;
        items(&mut server, "/groups/1/collections/A/items/top", SMITH).await;
        server
            .mock("GET", "/groups/1/collections/B/items/top")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let log = RequestLog::new();
        let descendants = vec![("X/Y".to_string(), "B".to_string())];
        let text = assemble(
            &server,
            &config(Some("A"), InclusionPolicy::All),
            &descendants,
            &log,
        )
        .await;

        assert_eq!(text, SMITH);
        assert!(log.contains("Zotero API returned with code: 503"));
    }
}
