//! # Zotero Bibliography Proxy
//!
//! An HTTP proxy that turns a Zotero user or group library into a single
//! deduplicated bibliography document. A request path such as
//! `/Papers/2024` selects a collection by its name hierarchy; by default all
//! of its sub-collections are included as well.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`]: Process settings and per-request configuration resolution
//! - [`models`]: Collections, libraries and request value types
//! - [`zotero`]: Paginated API fetching, collection index cache, bibliography assembly
//! - [`server`]: Request handler and HTTP routes
//! - [`utils`]: HTTP client, deduplication and the per-request log

pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod utils;
pub mod zotero;

// Re-export commonly used types
pub use error::ProxyError;
pub use server::RequestHandler;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
