use std::collections::HashSet;
use std::sync::Mutex;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::device::DeviceStorage;
use super::models::{FavoriteEntry, FavoriteOutcome, HistoryEntry, OverlaidArticle, RemovalOutcome};
use super::StorageError;
use crate::core::feed::Article;

pub const FAVORITES_KEY: &str = "favorites";
pub const HISTORY_KEY: &str = "history";
pub const LAST_UPDATE_KEY: &str = "last_update";
pub const VIEW_COUNT_PREFIX: &str = "view_count";

pub const FAVORITES_CAPACITY: usize = 200;
pub const HISTORY_CAPACITY: usize = 100;

/// Device-local favorites, view history and sync bookkeeping.
///
/// Storage faults never escape: reads degrade to empty results and writes to
/// no-ops, both logged. Every mutation rewrites the whole list while holding
/// `write_lock`, so an add and a remove on the same id cannot interleave.
#[derive(Debug)]
pub struct OverlayStore<S> {
    storage: S,
    write_lock: Mutex<()>,
}

impl<S: DeviceStorage> OverlayStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn list_favorites(&self) -> Vec<FavoriteEntry> {
        self.read_list_or_empty(FAVORITES_KEY)
    }

    pub fn add_favorite(&self, article: &Article) -> FavoriteOutcome {
        let _guard = self.lock_writes();
        let mut favorites: Vec<FavoriteEntry> = self.read_list_or_empty(FAVORITES_KEY);
        if favorites.iter().any(|entry| entry.article.id == article.id) {
            return FavoriteOutcome::AlreadyExists;
        }

        favorites.insert(
            0,
            FavoriteEntry {
                article: article.clone(),
                favorite_time: Utc::now(),
            },
        );
        favorites.truncate(FAVORITES_CAPACITY);

        match self.write_list(FAVORITES_KEY, &favorites) {
            Ok(()) => FavoriteOutcome::Added,
            Err(error) => {
                tracing::warn!(id = %article.id, error = %error, "failed to save favorite");
                FavoriteOutcome::Unavailable
            }
        }
    }

    pub fn remove_favorite(&self, id: &str) -> RemovalOutcome {
        let _guard = self.lock_writes();
        let favorites: Vec<FavoriteEntry> = self.read_list_or_empty(FAVORITES_KEY);
        let before = favorites.len();
        let remaining: Vec<FavoriteEntry> = favorites
            .into_iter()
            .filter(|entry| entry.article.id != id)
            .collect();
        if remaining.len() == before {
            return RemovalOutcome::NotFound;
        }

        match self.write_list(FAVORITES_KEY, &remaining) {
            Ok(()) => RemovalOutcome::Removed,
            Err(error) => {
                tracing::warn!(id, error = %error, "failed to remove favorite");
                RemovalOutcome::Unavailable
            }
        }
    }

    pub fn is_favorited(&self, id: &str) -> bool {
        self.list_favorites()
            .iter()
            .any(|entry| entry.article.id == id)
    }

    pub fn list_history(&self) -> Vec<HistoryEntry> {
        self.read_list_or_empty(HISTORY_KEY)
    }

    pub fn add_history(&self, article: &Article) {
        let _guard = self.lock_writes();
        let mut history: Vec<HistoryEntry> = self.read_list_or_empty(HISTORY_KEY);
        history.retain(|entry| entry.article.id != article.id);
        history.insert(
            0,
            HistoryEntry {
                article: article.clone(),
                view_time: Utc::now(),
            },
        );
        history.truncate(HISTORY_CAPACITY);

        if let Err(error) = self.write_list(HISTORY_KEY, &history) {
            tracing::warn!(id = %article.id, error = %error, "failed to record history");
        }
    }

    /// Returns false when the underlying storage refused the removal.
    pub fn clear_history(&self) -> bool {
        let _guard = self.lock_writes();
        match self.storage.remove(HISTORY_KEY) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(error = %error, "failed to clear history");
                false
            }
        }
    }

    pub fn last_sync(&self) -> Option<String> {
        match self.storage.get(LAST_UPDATE_KEY) {
            Ok(value) => value.filter(|value| !value.is_empty()),
            Err(error) => {
                tracing::warn!(error = %error, "failed to read last sync");
                None
            }
        }
    }

    pub fn set_last_sync(&self, timestamp: &str) {
        if let Err(error) = self.storage.set(LAST_UPDATE_KEY, timestamp) {
            tracing::warn!(error = %error, "failed to store last sync");
        }
    }

    /// Bumps the local view counter for an article and returns the new value,
    /// or 0 when storage is unavailable.
    pub fn increment_view_count(&self, id: &str) -> u64 {
        let _guard = self.lock_writes();
        let key = format!("{VIEW_COUNT_PREFIX}_{id}");
        let current = match self.storage.get(&key) {
            Ok(value) => value
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .unwrap_or(0),
            Err(error) => {
                tracing::warn!(id, error = %error, "failed to read view count");
                return 0;
            }
        };
        let next = current + 1;
        match self.storage.set(&key, &next.to_string()) {
            Ok(()) => next,
            Err(error) => {
                tracing::warn!(id, error = %error, "failed to store view count");
                0
            }
        }
    }

    /// Marks every record with its favorite state. Favorites are read once.
    pub fn overlay(&self, articles: &[Article]) -> Vec<OverlaidArticle> {
        let favorited: HashSet<String> = self
            .list_favorites()
            .into_iter()
            .map(|entry| entry.article.id)
            .collect();
        articles
            .iter()
            .map(|article| OverlaidArticle {
                is_favorited: favorited.contains(&article.id),
                article: article.clone(),
            })
            .collect()
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        match self.storage.get(key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    fn read_list_or_empty<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read_list(key).unwrap_or_else(|error| {
            tracing::warn!(key, error = %error, "failed to read overlay list");
            Vec::new()
        })
    }

    fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)?;
        self.storage.set(key, &raw)
    }
}
