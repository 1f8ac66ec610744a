use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_FEED_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/gds910228/dailynew/main/data/articles.json",
    "https://cdn.jsdelivr.net/gh/gds910228/dailynew@main/data/articles.json",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no feed sources configured")]
    NoSources,
    #[error("feed source is not an http(s) url: {0}")]
    InvalidSource(String),
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Location and credentials of the feed file in a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub feed_sources: Vec<String>,
    pub request_timeout_secs: u64,
    pub retries_per_source: usize,
    pub data_dir: PathBuf,
    pub download_dir: PathBuf,
    pub photo_library_dir: PathBuf,
    pub github: Option<GithubConfig>,
}

/// Per-user application data directory, independent of the working
/// directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dailynew")
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            feed_sources: DEFAULT_FEED_SOURCES.iter().map(ToString::to_string).collect(),
            request_timeout_secs: 20,
            retries_per_source: 0,
            photo_library_dir: data_dir.join("photos"),
            data_dir,
            download_dir: std::env::temp_dir().join("dailynew-downloads"),
            github: None,
        }
    }
}

impl AppConfig {
    /// Reads `.env.local` when present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::from_filename(".env.local");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(raw) = read("DAILYNEW_FEED_SOURCES") {
            config.feed_sources = raw
                .split(',')
                .map(str::trim)
                .filter(|source| !source.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(raw) = read("DAILYNEW_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("DAILYNEW_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = read("DAILYNEW_RETRIES") {
            config.retries_per_source = parse_number("DAILYNEW_RETRIES", &raw)?;
        }
        if let Some(raw) = read("DAILYNEW_DATA_DIR") {
            config.data_dir = PathBuf::from(raw);
            config.photo_library_dir = config.data_dir.join("photos");
        }
        if let Some(raw) = read("DAILYNEW_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(raw);
        }
        if let Some(raw) = read("DAILYNEW_PHOTO_DIR") {
            config.photo_library_dir = PathBuf::from(raw);
        }

        if let (Some(owner), Some(repo)) = (read("DAILYNEW_GITHUB_OWNER"), read("DAILYNEW_GITHUB_REPO")) {
            config.github = Some(GithubConfig {
                api_base: read("DAILYNEW_GITHUB_API_BASE")
                    .unwrap_or_else(|| "https://api.github.com".to_string()),
                owner,
                repo,
                path: read("DAILYNEW_GITHUB_PATH").unwrap_or_else(|| "data/articles.json".to_string()),
                branch: read("DAILYNEW_GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
                token: read("DAILYNEW_GITHUB_TOKEN"),
            });
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed_sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if let Some(source) = self
            .feed_sources
            .iter()
            .find(|source| !(source.starts_with("http://") || source.starts_with("https://")))
        {
            return Err(ConfigError::InvalidSource(source.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Shared HTTP client for feed, publish and image requests. The content API
/// rejects requests without a user agent.
pub fn build_http_client(config: &AppConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("dailynew/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
