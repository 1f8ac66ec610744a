use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::feed::Article;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    #[serde(flatten)]
    pub article: Article,
    pub favorite_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub article: Article,
    pub view_time: DateTime<Utc>,
}

/// A feed record with device-local flags layered on top.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlaidArticle {
    #[serde(flatten)]
    pub article: Article,
    pub is_favorited: bool,
}

impl AsRef<Article> for FavoriteEntry {
    fn as_ref(&self) -> &Article {
        &self.article
    }
}

impl AsRef<Article> for HistoryEntry {
    fn as_ref(&self) -> &Article {
        &self.article
    }
}

impl AsRef<Article> for OverlaidArticle {
    fn as_ref(&self) -> &Article {
        &self.article
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added,
    AlreadyExists,
    /// Storage was unavailable; nothing changed.
    Unavailable,
}

impl FavoriteOutcome {
    pub fn message(self) -> &'static str {
        match self {
            FavoriteOutcome::Added => "收藏成功",
            FavoriteOutcome::AlreadyExists => "已收藏",
            FavoriteOutcome::Unavailable => "收藏失败",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// The id was not favorited; still a success.
    NotFound,
    Unavailable,
}

impl RemovalOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, RemovalOutcome::Unavailable)
    }

    pub fn message(self) -> &'static str {
        match self {
            RemovalOutcome::Removed | RemovalOutcome::NotFound => "已取消收藏",
            RemovalOutcome::Unavailable => "操作失败",
        }
    }
}
