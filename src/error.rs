//! Error type shared by the resolver, the collection index and the fetchers.

/// Errors that can occur while serving a bibliography request
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Entity id or API key missing after merging environment and query
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A collection id is not part of the entity's collection index
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// A collection path did not resolve, even after refreshing the index
    #[error("Failed to look up collection ID for path '{0}'")]
    CollectionLookupFailed(String),

    /// Cycle or dangling parent in the remote collection listing
    #[error("Malformed collection graph: {0}")]
    MalformedCollectionGraph(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected answer from the remote API
    #[error("API error: {0}")]
    Api(String),

    /// JSON parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::Parse(format!("JSON: {}", err))
    }
}
