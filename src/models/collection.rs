//! Collection model as returned by the Zotero collections endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// A named folder of items inside a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Stable identifier assigned by the remote API
    pub key: String,

    /// Display name
    pub name: String,

    /// Parent collection key, `None` for a root collection
    #[serde(
        default,
        rename = "parentCollection",
        deserialize_with = "deserialize_parent"
    )]
    pub parent: Option<String>,
}

impl Collection {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            parent: None,
        }
    }

    /// Set the parent collection key
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// One element of the collections listing; the useful fields live under `data`
#[derive(Debug, Deserialize)]
pub struct CollectionRecord {
    pub data: Collection,
}

/// Parse one page of the collections listing
pub fn parse_collections(body: &str) -> Result<Vec<Collection>, serde_json::Error> {
    let records: Vec<CollectionRecord> = serde_json::from_str(body)?;
    Ok(records.into_iter().map(|r| r.data).collect())
}

// The API reports a missing parent as `false` rather than `null`
fn deserialize_parent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ParentRef {
        Key(String),
        Flag(#[allow(dead_code)] bool),
    }

    let parent: Option<ParentRef> = Option::deserialize(deserializer)?;
    Ok(match parent {
        Some(ParentRef::Key(key)) if !key.is_empty() => Some(key),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collections_listing() {
        let body = r#"[
            {"key": "AAAA", "version": 3, "data": {"key": "AAAA", "name": "Papers", "parentCollection": false}},
            {"key": "BBBB", "version": 4, "data": {"key": "BBBB", "name": "2024", "parentCollection": "AAAA"}},
            {"key": "CCCC", "version": 5, "data": {"key": "CCCC", "name": "Talks", "parentCollection": null}}
        ]"#;

        let collections = parse_collections(body).unwrap();
        assert_eq!(collections.len(), 3);
        assert!(collections[0].is_root());
        assert_eq!(collections[1].parent.as_deref(), Some("AAAA"));
        assert!(collections[2].is_root());
    }

    #[test]
    fn test_missing_parent_field() {
        let body = r#"[{"data": {"key": "AAAA", "name": "Papers"}}]"#;
        let collections = parse_collections(body).unwrap();
        assert_eq!(collections[0], Collection::new("AAAA", "Papers"));
    }

    #[test]
    fn test_invalid_listing() {
        assert!(parse_collections("{\"not\": \"a list\"}").is_err());
    }
}
