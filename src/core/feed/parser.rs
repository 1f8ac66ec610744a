use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use super::codec::{resolve_payload, DecodeError};
use super::types::{Article, Feed, FeedMeta, ParsedDocument};

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("feed root is not a JSON object")]
    RootNotObject,
    #[error("feed has no `articles` array")]
    ArticlesNotArray,
    #[error("feed `meta` is not an object")]
    MetaNotObject,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

const ARTICLE_FIELDS: &[&str] = &[
    "id",
    "title",
    "description",
    "imageUrl",
    "imageUrls",
    "thumbnailUrl",
    "tags",
    "category",
    "publishDate",
    "videoId",
    "author",
    "viewCount",
    "downloadCount",
    "favoriteCount",
];

// Device-only keys that must never leak from a feed record into the overlay.
const OVERLAY_FIELDS: &[&str] = &["isFavorited", "favoriteTime", "viewTime"];

const META_FIELDS: &[&str] = &["totalCount", "lastUpdate"];

/// Decodes a fetched body (raw feed or content envelope) and validates it.
/// Article order is left as stored.
pub fn parse_feed_bytes(raw: &[u8]) -> Result<ParsedDocument, FeedParseError> {
    let (document, revision) = resolve_payload(raw)?;
    let feed = parse_feed_value(document)?;
    Ok(ParsedDocument { feed, revision })
}

/// Checks only the root shape of a feed document, leaving every record as
/// stored.
pub fn check_feed_shape(document: &Value) -> Result<(), FeedParseError> {
    let Value::Object(root) = document else {
        return Err(FeedParseError::RootNotObject);
    };
    if !matches!(root.get("articles"), Some(Value::Array(_))) {
        return Err(FeedParseError::ArticlesNotArray);
    }
    match root.get("meta") {
        None | Some(Value::Null) | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(FeedParseError::MetaNotObject),
    }
}

pub fn parse_feed_value(document: Value) -> Result<Feed, FeedParseError> {
    let Value::Object(mut root) = document else {
        return Err(FeedParseError::RootNotObject);
    };
    let Some(Value::Array(raw_articles)) = root.remove("articles") else {
        return Err(FeedParseError::ArticlesNotArray);
    };
    let raw_meta = match root.remove("meta") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(meta)) => meta,
        Some(_) => return Err(FeedParseError::MetaNotObject),
    };

    let mut articles = Vec::with_capacity(raw_articles.len());
    for (index, raw) in raw_articles.iter().enumerate() {
        match raw {
            Value::Object(fields) => articles.push(normalize_article(fields, index)),
            other => {
                tracing::warn!(index, kind = json_kind(other), "skipping non-object article entry");
            }
        }
    }

    let meta = normalize_meta(&raw_meta, articles.len());
    Ok(Feed {
        articles,
        meta,
        extra: root,
    })
}

/// Builds a fully-populated article from a loosely-typed JSON object.
pub fn normalize_article(fields: &Map<String, Value>, index: usize) -> Article {
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(coerce_string)
            .filter(|value| !value.is_empty())
    };
    let list = |key: &str| fields.get(key).and_then(coerce_string_list);

    let listed_images = list("imageUrls").unwrap_or_default();
    let image_url = text("imageUrl")
        .or_else(|| text("thumbnailUrl"))
        .or_else(|| listed_images.first().cloned())
        .unwrap_or_default();
    let image_urls = if listed_images.is_empty() && !image_url.is_empty() {
        vec![image_url.clone()]
    } else {
        listed_images
    };
    let thumbnail_url = text("thumbnailUrl").unwrap_or_else(|| image_url.clone());

    let extra = fields
        .iter()
        .filter(|(key, _)| {
            !ARTICLE_FIELDS.contains(&key.as_str()) && !OVERLAY_FIELDS.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Article {
        id: text("id").unwrap_or_else(|| format!("article_{index}")),
        title: text("title").unwrap_or_default(),
        description: text("description").unwrap_or_default(),
        image_url,
        image_urls,
        thumbnail_url,
        tags: list("tags").unwrap_or_default(),
        category: text("category").unwrap_or_default(),
        publish_date: text("publishDate").unwrap_or_default(),
        video_id: text("videoId").unwrap_or_default(),
        author: text("author").unwrap_or_default(),
        view_count: fields.get("viewCount").map(coerce_count).unwrap_or(0),
        download_count: fields.get("downloadCount").map(coerce_count).unwrap_or(0),
        favorite_count: fields.get("favoriteCount").map(coerce_count).unwrap_or(0),
        extra,
    }
}

fn normalize_meta(fields: &Map<String, Value>, article_count: usize) -> FeedMeta {
    let extra = fields
        .iter()
        .filter(|(key, _)| !META_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    FeedMeta {
        total_count: fields
            .get("totalCount")
            .map(coerce_count)
            .unwrap_or(article_count as u64),
        last_update: fields
            .get("lastUpdate")
            .and_then(coerce_string)
            .unwrap_or_default(),
        extra,
    }
}

/// Stable newest-first ordering by `publishDate`; undated records sink to
/// the end in their original relative order.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|left, right| {
        match (
            parse_loose_date(&left.publish_date),
            parse_loose_date(&right.publish_date),
        ) {
            (Some(left), Some(right)) => right.cmp(&left),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and anything whose first ten
/// characters form a calendar date.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn coerce_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(coerce_string)
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        ),
        Value::String(text) if !text.trim().is_empty() => Some(vec![text.trim().to_string()]),
        _ => None,
    }
}

fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|float| float.is_finite() && *float > 0.0).map(|float| float as u64))
            .unwrap_or(0),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| {
                    text.parse::<f64>()
                        .ok()
                        .filter(|float| float.is_finite() && *float > 0.0)
                        .map(|float| float as u64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
