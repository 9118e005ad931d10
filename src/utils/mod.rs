//! Utility modules supporting the proxy.
//!
//! - [`deduplicate_entries`]: Drop byte-identical bibliography entries and report key collisions
//! - [`HttpClient`]: Shared HTTP client with sensible defaults
//! - [`RequestLog`]: Request-scoped event buffer, rendered into the response body
//!
//! # Deduplication
//!
//! ```rust
//! use zotero_bib_proxy::utils::deduplicate_entries;
//!
//! let text = "@article{a,\n}\n\n@article{a,\n}\n\n@book{b,\n}";
//! let deduped = deduplicate_entries(text);
//! assert_eq!(deduped.entries.len(), 2);
//! assert_eq!(deduped.removed, 1);
//! ```

mod dedup;
mod http;
mod request_log;

pub use dedup::{citation_key, deduplicate_entries, split_entries, Deduplicated};
pub use http::HttpClient;
pub use request_log::{comment_lines, LogEvent, LogLevel, RequestLog};
