use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One published article as it appears in the feed document.
///
/// Unknown keys from the source object are kept in `extra` and written back
/// untouched when the feed is re-encoded for publishing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub image_urls: Vec<String>,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub category: String,
    pub publish_date: String,
    pub video_id: String,
    pub author: String,
    pub view_count: u64,
    pub download_count: u64,
    pub favorite_count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AsRef<Article> for Article {
    fn as_ref(&self) -> &Article {
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedMeta {
    pub total_count: u64,
    pub last_update: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Feed {
    pub articles: Vec<Article>,
    pub meta: FeedMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Metadata envelope returned by the content-hosting API: the feed text is
/// carried Base64-encoded in `content`, `sha` is the revision marker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContentEnvelope {
    pub content: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Shape of a fetched source body, resolved once at the API boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeedPayload {
    Envelope(ContentEnvelope),
    Raw(Value),
}

/// A validated feed plus the revision marker it was read at, when the source
/// exposed one.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub feed: Feed,
    pub revision: Option<String>,
}
