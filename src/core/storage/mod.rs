pub mod device;
pub mod models;
pub mod repository;

pub use device::{DeviceStorage, FileStorage, MemoryStorage};
pub use models::{FavoriteEntry, FavoriteOutcome, HistoryEntry, OverlaidArticle, RemovalOutcome};
pub use repository::OverlayStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}
