//! Core data models for collections and request configuration.

mod collection;
mod request;

pub use collection::{parse_collections, Collection, CollectionRecord};
pub use request::{ApiKey, Entity, EntityKind, InclusionPolicy, OutputFormat};
