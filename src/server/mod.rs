//! HTTP surface of the proxy.
//!
//! | Method | Path        | Behaviour                                        |
//! |--------|-------------|--------------------------------------------------|
//! | GET    | `/`         | bibliography of the whole library                |
//! | GET    | `/<path>`   | bibliography of the collection at `<path>`       |
//! | HEAD   | any         | empty `200`, no remote calls (URL validation)     |
//!
//! Every GET answers `200 text/plain`; failures are reported in the body.

mod handler;

pub use handler::{render_body, RequestHandler, Stage};

use axum::{
    extract::{RawQuery, State},
    http::{header, Uri},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{QueryParams, ServerConfig};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Build the router serving `handler`
pub fn create_router(handler: Arc<RequestHandler>) -> Router {
    Router::new()
        .route("/", get(library).head(probe))
        .route("/{*path}", get(collection).head(probe))
        .with_state(handler)
}

async fn library(
    State(handler): State<Arc<RequestHandler>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    respond(&handler, "", query.as_deref()).await
}

async fn collection(
    State(handler): State<Arc<RequestHandler>>,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    respond(&handler, &collection_path(&uri), query.as_deref()).await
}

/// Percent-decoded request path. Bytes that are not UTF-8 become U+FFFD so
/// the lookup reports an unknown collection instead of rejecting the request.
fn collection_path(uri: &Uri) -> String {
    let raw = uri.path().trim_start_matches('/');
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

async fn respond(
    handler: &RequestHandler,
    path: &str,
    query: Option<&str>,
) -> impl IntoResponse {
    tracing::info!(path = %path, "GET bibliography");
    let body = handler.handle(path, &QueryParams::parse(query)).await;
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], body)
}

async fn probe() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], "")
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &ServerConfig, handler: Arc<RequestHandler>) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(handler))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::utils::HttpClient;
    use crate::zotero::{BatchFetcher, CollectionCache, ZoteroApi};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn offline_router() -> Router {
        let fetcher = BatchFetcher::new(HttpClient::new().unwrap());
        let api = ZoteroApi::new("http://127.0.0.1:1", fetcher);
        let handler = RequestHandler::new(
            Environment::default(),
            Arc::new(CollectionCache::new(api)),
        );
        create_router(Arc::new(handler))
    }

    #[tokio::test]
    async fn test_head_is_empty_ok() {
        for uri in ["/", "/Papers/2024?key=x"] {
            let response = offline_router()
                .oneshot(
                    Request::builder()
                        .method("HEAD")
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_PLAIN);
            let body = axum::body::to_bytes(response.into_body(), 1024)
                .await
                .unwrap();
            assert!(body.is_empty());
        }
    }

    #[test]
    fn test_collection_path_decoding() {
        let uri: Uri = "/Papers%202024/Drafts?key=x".parse().unwrap();
        assert_eq!(collection_path(&uri), "Papers 2024/Drafts");

        let uri: Uri = "/Papers%FF".parse().unwrap();
        assert_eq!(collection_path(&uri), "Papers\u{FFFD}");
    }

    #[tokio::test]
    async fn test_undecodable_path_is_still_200() {
        let response = offline_router()
            .oneshot(
                Request::builder()
                    .uri("/Papers%FF?remove_comments=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_PLAIN);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("% "));
    }

    #[tokio::test]
    async fn test_invalid_config_is_still_200() {
        let response = offline_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Invalid configuration"));
    }
}
