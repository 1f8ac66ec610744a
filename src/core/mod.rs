pub mod feed;
pub mod images;
pub mod present;
pub mod publish;
pub mod query;
pub mod storage;

use std::collections::BTreeMap;

use crate::config::{build_http_client, AppConfig};
use feed::FeedLoader;
use images::{DirectoryLibrary, ImageTransfer};
use publish::PublishClient;
use storage::{FileStorage, OverlayStore};

#[derive(Debug)]
pub struct AppServices {
    pub feed: FeedLoader,
    pub overlay: OverlayStore<FileStorage>,
    pub publisher: Option<PublishClient>,
    pub images: ImageTransfer<DirectoryLibrary>,
}

impl AppServices {
    pub fn from_config(config: &AppConfig) -> reqwest::Result<Self> {
        let client = build_http_client(config)?;
        Ok(Self {
            feed: FeedLoader::from_config(client.clone(), config),
            overlay: OverlayStore::new(FileStorage::new(&config.data_dir)),
            publisher: config
                .github
                .clone()
                .map(|github| PublishClient::new(client.clone(), github)),
            images: ImageTransfer::new(
                client,
                &config.download_dir,
                DirectoryLibrary::new(&config.photo_library_dir),
            ),
        })
    }

    pub fn health_report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert(
            "feed".to_string(),
            format!("ready ({} sources)", self.feed.sources().len()),
        );
        report.insert(
            "overlay".to_string(),
            format!("ready ({})", self.overlay.storage().root().display()),
        );
        let publisher = match &self.publisher {
            Some(client) if client.is_configured() => "ready",
            Some(_) => "unconfigured (no token)",
            None => "unconfigured",
        };
        report.insert("publish".to_string(), publisher.to_string());
        report.insert("images".to_string(), "ready".to_string());
        report
    }
}
