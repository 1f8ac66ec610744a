pub mod config;
pub mod core;

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;

use crate::config::AppConfig;
use crate::core::feed::Article;
use crate::core::images::DownloadTally;
use crate::core::present::{format_sync_label, relative_time_label};
use crate::core::publish::ArticleDraft;
use crate::core::query::{apply_filters, categories, find_article};
use crate::core::storage::{
    FavoriteEntry, FavoriteOutcome, HistoryEntry, OverlaidArticle, RemovalOutcome,
};
use crate::core::AppServices;

#[derive(Debug, Clone, Default)]
pub struct ListArticlesRequest {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub article_count: usize,
    pub last_update: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub article_id: String,
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub favorite_count: usize,
    pub history_count: usize,
    pub last_sync_label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayEntryDto {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub when: String,
}

/// Entry points the view layer calls. Every query takes explicit arguments;
/// the only state held here is the last fetched article list.
#[derive(Debug)]
pub struct App {
    services: AppServices,
    articles: Vec<Article>,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self, String> {
        let services = AppServices::from_config(config).map_err(|error| error.to_string())?;
        Ok(Self::with_services(services))
    }

    pub fn with_services(services: AppServices) -> Self {
        Self {
            services,
            articles: Vec::new(),
        }
    }

    pub fn health_report(&self) -> BTreeMap<String, String> {
        self.services.health_report()
    }

    /// Re-fetches the feed, replacing the in-memory list. The feed's
    /// `lastUpdate` is recorded as the last sync only on success, and only
    /// when the feed carries one.
    pub async fn refresh(&mut self) -> Result<RefreshResponse, String> {
        let feed = self
            .services
            .feed
            .load()
            .await
            .map_err(|error| error.to_string())?;
        if !feed.meta.last_update.is_empty() {
            self.services.overlay.set_last_sync(&feed.meta.last_update);
        }
        let response = RefreshResponse {
            article_count: feed.articles.len(),
            last_update: feed.meta.last_update.clone(),
        };
        self.articles = feed.articles;
        Ok(response)
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn list_articles(&self, request: &ListArticlesRequest) -> Vec<OverlaidArticle> {
        let overlaid = self.services.overlay.overlay(&self.articles);
        apply_filters(
            &overlaid,
            request.category.as_deref().unwrap_or_default(),
            request.search.as_deref().unwrap_or_default(),
        )
    }

    pub fn categories(&self) -> Vec<String> {
        categories(&self.articles)
    }

    /// Looks up an article for the detail view and records the visit.
    pub fn open_article(&self, id: &str) -> Result<OverlaidArticle, String> {
        let article = find_article(&self.articles, id)
            .cloned()
            .ok_or_else(|| format!("article {id} not found"))?;
        self.services.overlay.add_history(&article);
        let local_views = self.services.overlay.increment_view_count(id);
        tracing::debug!(id, local_views, "article opened");
        Ok(OverlaidArticle {
            is_favorited: self.services.overlay.is_favorited(id),
            article,
        })
    }

    pub fn favorite(&self, id: &str) -> Result<FavoriteOutcome, String> {
        let article = self.resolve_article(id)?;
        Ok(self.services.overlay.add_favorite(&article))
    }

    pub fn unfavorite(&self, id: &str) -> RemovalOutcome {
        self.services.overlay.remove_favorite(id)
    }

    pub fn favorites(&self) -> Vec<FavoriteEntry> {
        self.services.overlay.list_favorites()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.services.overlay.list_history()
    }

    pub fn favorites_view(&self) -> Vec<OverlayEntryDto> {
        let now = Utc::now();
        self.favorites()
            .into_iter()
            .map(|entry| OverlayEntryDto {
                when: relative_time_label(entry.favorite_time, now),
                id: entry.article.id,
                title: entry.article.title,
                thumbnail_url: entry.article.thumbnail_url,
            })
            .collect()
    }

    pub fn history_view(&self) -> Vec<OverlayEntryDto> {
        let now = Utc::now();
        self.history()
            .into_iter()
            .map(|entry| OverlayEntryDto {
                when: relative_time_label(entry.view_time, now),
                id: entry.article.id,
                title: entry.article.title,
                thumbnail_url: entry.article.thumbnail_url,
            })
            .collect()
    }

    pub fn clear_history(&self) -> Result<(), String> {
        if self.services.overlay.clear_history() {
            Ok(())
        } else {
            Err("操作失败".to_string())
        }
    }

    pub fn profile_summary(&self) -> ProfileSummary {
        ProfileSummary {
            favorite_count: self.services.overlay.list_favorites().len(),
            history_count: self.services.overlay.list_history().len(),
            last_sync_label: format_sync_label(self.services.overlay.last_sync().as_deref()),
        }
    }

    /// Saves the article's images one at a time; `all == false` saves only
    /// the primary image.
    pub async fn download_images(&self, id: &str, all: bool) -> Result<DownloadTally, String> {
        let article = self.resolve_article(id)?;
        let urls = if all {
            article.image_urls.clone()
        } else {
            vec![article.image_url.clone()]
        };
        let urls: Vec<String> = urls.into_iter().filter(|url| !url.is_empty()).collect();
        if urls.is_empty() {
            return Err(format!("article {id} has no images"));
        }
        Ok(self.services.images.save_all(&urls).await)
    }

    pub async fn publish(&self, draft: ArticleDraft) -> Result<PublishResponse, String> {
        let publisher = self
            .services
            .publisher
            .as_ref()
            .ok_or_else(|| "publishing is not configured".to_string())?;
        let receipt = publisher
            .publish(draft)
            .await
            .map_err(|error| error.to_string())?;
        Ok(PublishResponse {
            article_id: receipt.article.id,
            total_count: receipt.total_count,
        })
    }

    fn resolve_article(&self, id: &str) -> Result<Article, String> {
        if let Some(article) = find_article(&self.articles, id) {
            return Ok(article.clone());
        }
        let favorites = self.favorites();
        if let Some(entry) = find_article(&favorites, id) {
            return Ok(entry.article.clone());
        }
        let history = self.history();
        find_article(&history, id)
            .map(|entry| entry.article.clone())
            .ok_or_else(|| format!("article {id} not found"))
    }
}
