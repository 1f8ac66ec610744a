use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub const PERMISSION_HINT: &str = "需要您授权保存图片到相册，请在系统设置中开启相册权限";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("photo library access denied: {0}")]
    PermissionDenied(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    /// Guidance for the user when the failure can be fixed from system
    /// settings rather than by retrying.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ImageError::PermissionDenied(_) => Some(PERMISSION_HINT),
            _ => None,
        }
    }
}

/// Where saved images end up on the device.
pub trait PhotoLibrary: Send + Sync {
    fn save(&self, file: &Path) -> Result<PathBuf, ImageError>;
}

/// Photo library backed by a plain directory.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PhotoLibrary for DirectoryLibrary {
    fn save(&self, file: &Path) -> Result<PathBuf, ImageError> {
        let file_name = file
            .file_name()
            .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "download has no file name"))?;
        let target = self.root.join(file_name);
        let copied = std::fs::create_dir_all(&self.root).and_then(|()| std::fs::copy(file, &target));
        match copied {
            Ok(_) => Ok(target),
            Err(error) if error.kind() == ErrorKind::PermissionDenied => {
                Err(ImageError::PermissionDenied(error.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadTally {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
    pub permission_denied: bool,
}

/// Downloads images to a scratch directory and hands them to the photo
/// library.
#[derive(Debug, Clone)]
pub struct ImageTransfer<L> {
    client: reqwest::Client,
    download_dir: PathBuf,
    library: L,
}

impl<L: PhotoLibrary> ImageTransfer<L> {
    pub fn new(client: reqwest::Client, download_dir: impl Into<PathBuf>, library: L) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
            library,
        }
    }

    pub async fn download(&self, url: &str) -> Result<PathBuf, ImageError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::HttpStatus(status.as_u16()));
        }
        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.download_dir.join(download_file_name(url));
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!(url, path = %path.display(), bytes = bytes.len(), "image downloaded");
        Ok(path)
    }

    pub fn save_to_library(&self, path: &Path) -> Result<PathBuf, ImageError> {
        self.library.save(path)
    }

    pub async fn save_image(&self, url: &str) -> Result<PathBuf, ImageError> {
        let downloaded = self.download(url).await?;
        let saved = self.save_to_library(&downloaded)?;
        tracing::info!(url, path = %saved.display(), "image saved");
        Ok(saved)
    }

    /// Saves each image in turn. A failed item is tallied and the rest still
    /// run.
    pub async fn save_all(&self, urls: &[String]) -> DownloadTally {
        let mut tally = DownloadTally::default();
        for (index, url) in urls.iter().enumerate() {
            match self.save_image(url).await {
                Ok(_) => tally.succeeded += 1,
                Err(error) => {
                    tracing::warn!(index, url = %url, error = %error, "image save failed");
                    if matches!(error, ImageError::PermissionDenied(_)) {
                        tally.permission_denied = true;
                    }
                    tally.failed += 1;
                    tally.failures.push((url.clone(), error.to_string()));
                }
            }
        }
        tally
    }
}

/// Stable per-URL file name: SHA-256 of the URL plus the original extension
/// when it looks like one.
fn download_file_name(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let extension = reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(ToString::to_string))
        })
        .and_then(|segment| {
            segment
                .rsplit_once('.')
                .map(|(_, extension)| extension.to_ascii_lowercase())
        })
        .filter(|extension| {
            (1..=5).contains(&extension.len())
                && extension.chars().all(|character| character.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| "img".to_string());
    format!("{digest:x}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

    async fn spawn_image_host() -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route("/images/a.png", get(|| async { PNG_BYTES }))
            .route("/images/b.JPG", get(|| async { b"jpeg".as_slice() }))
            .route("/images/gone.png", get(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}"), join_handle)
    }

    struct DenyingLibrary {
        calls: Arc<AtomicUsize>,
    }

    impl PhotoLibrary for DenyingLibrary {
        fn save(&self, _file: &Path) -> Result<PathBuf, ImageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ImageError::PermissionDenied("auth deny".to_string()))
        }
    }

    #[test]
    fn file_names_are_stable_and_keep_extensions() {
        let first = download_file_name("https://img.example.com/a/春分.JPG?x=1");
        let second = download_file_name("https://img.example.com/a/春分.JPG?x=1");
        assert_eq!(first, second);
        assert!(first.ends_with(".jpg"));
        assert_eq!(first.len(), 64 + 4);
        assert!(download_file_name("https://img.example.com/raw").ends_with(".img"));
    }

    #[tokio::test]
    async fn save_image_downloads_then_copies_into_library() {
        let (base, server_task) = spawn_image_host().await;
        let scratch = tempfile::tempdir().expect("tempdir");
        let photos = tempfile::tempdir().expect("tempdir");
        let transfer = ImageTransfer::new(
            reqwest::Client::new(),
            scratch.path(),
            DirectoryLibrary::new(photos.path().join("album")),
        );

        let saved = transfer
            .save_image(&format!("{base}/images/a.png"))
            .await
            .expect("save should succeed");

        assert!(saved.starts_with(photos.path().join("album")));
        assert_eq!(std::fs::read(&saved).expect("saved file"), PNG_BYTES);
        server_task.abort();
    }

    #[tokio::test]
    async fn bulk_save_tallies_each_item_and_keeps_going() {
        let (base, server_task) = spawn_image_host().await;
        let scratch = tempfile::tempdir().expect("tempdir");
        let photos = tempfile::tempdir().expect("tempdir");
        let transfer = ImageTransfer::new(
            reqwest::Client::new(),
            scratch.path(),
            DirectoryLibrary::new(photos.path()),
        );
        let urls = vec![
            format!("{base}/images/a.png"),
            format!("{base}/images/gone.png"),
            format!("{base}/images/b.JPG"),
        ];

        let tally = transfer.save_all(&urls).await;

        assert_eq!(tally.succeeded, 2);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.failures[0].0, urls[1]);
        assert!(!tally.permission_denied);
        server_task.abort();
    }

    #[tokio::test]
    async fn permission_denial_carries_remediation_hint() {
        let (base, server_task) = spawn_image_host().await;
        let scratch = tempfile::tempdir().expect("tempdir");
        let calls = Arc::new(AtomicUsize::new(0));
        let transfer = ImageTransfer::new(
            reqwest::Client::new(),
            scratch.path(),
            DenyingLibrary {
                calls: calls.clone(),
            },
        );

        let error = transfer
            .save_image(&format!("{base}/images/a.png"))
            .await
            .expect_err("library denies access");
        assert_eq!(error.remediation(), Some(PERMISSION_HINT));

        let tally = transfer
            .save_all(&[format!("{base}/images/a.png"), format!("{base}/images/b.JPG")])
            .await;
        assert_eq!(tally.failed, 2);
        assert!(tally.permission_denied);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        server_task.abort();
    }
}
