use reqwest::header::ACCEPT;
use std::time::Duration;

use super::parser::{parse_feed_bytes, sort_newest_first, FeedParseError};
use super::types::Feed;
use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("all {sources_tried} feed sources failed, last error: {last_error}")]
    FetchFailed {
        sources_tried: usize,
        last_error: String,
    },
    #[error("malformed feed: {0}")]
    MalformedFeed(String),
    #[error("could not decode feed: {0}")]
    Decode(#[from] super::codec::DecodeError),
}

impl From<FeedParseError> for LoadError {
    fn from(error: FeedParseError) -> Self {
        match error {
            FeedParseError::Decode(inner) => LoadError::Decode(inner),
            structural => LoadError::MalformedFeed(structural.to_string()),
        }
    }
}

pub async fn fetch_source(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .header(ACCEPT, "application/json, application/vnd.github.v3+json")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }
    Ok(response.bytes().await?.to_vec())
}

pub async fn fetch_source_with_retry(
    client: &reqwest::Client,
    url: &str,
    max_retries: usize,
    backoff: Duration,
) -> Result<Vec<u8>, FetchError> {
    let mut attempt = 0_usize;
    loop {
        match fetch_source(client, url).await {
            Ok(body) => return Ok(body),
            Err(err) => {
                let should_retry = matches!(err, FetchError::Request(_))
                    || matches!(err, FetchError::HttpStatus(code) if code >= 500);
                if !should_retry || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                tracing::debug!(url, attempt, error = %err, "retrying feed source");
                tokio::time::sleep(backoff * attempt as u32).await;
            }
        }
    }
}

/// Fetches the article feed from an ordered list of sources.
///
/// Sources are tried strictly one after another; the first is the
/// authoritative copy, later ones are mirrors. Only transport failures and
/// non-success statuses move on to the next source. A body that decodes but
/// is not a feed is reported as is.
#[derive(Debug, Clone)]
pub struct FeedLoader {
    client: reqwest::Client,
    sources: Vec<String>,
    retries_per_source: usize,
    retry_backoff: Duration,
}

impl FeedLoader {
    pub fn new(client: reqwest::Client, sources: Vec<String>) -> Self {
        Self {
            client,
            sources,
            retries_per_source: 0,
            retry_backoff: Duration::from_millis(40),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &AppConfig) -> Self {
        Self::new(client, config.feed_sources.clone())
            .with_retries(config.retries_per_source, Duration::from_millis(40))
    }

    pub fn with_retries(mut self, retries_per_source: usize, backoff: Duration) -> Self {
        self.retries_per_source = retries_per_source;
        self.retry_backoff = backoff;
        self
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub async fn load(&self) -> Result<Feed, LoadError> {
        let mut last_error: Option<String> = None;

        for (position, source) in self.sources.iter().enumerate() {
            tracing::debug!(source = %source, position, "fetching feed source");
            match fetch_source_with_retry(
                &self.client,
                source,
                self.retries_per_source,
                self.retry_backoff,
            )
            .await
            {
                Ok(body) => {
                    let mut feed = parse_feed_bytes(&body)?.feed;
                    sort_newest_first(&mut feed.articles);
                    tracing::info!(
                        source = %source,
                        articles = feed.articles.len(),
                        last_update = %feed.meta.last_update,
                        "feed loaded"
                    );
                    return Ok(feed);
                }
                Err(error) => {
                    tracing::warn!(source = %source, position, error = %error, "feed source failed");
                    last_error = Some(error.to_string());
                }
            }
        }

        Err(LoadError::FetchFailed {
            sources_tried: self.sources.len(),
            last_error: last_error.unwrap_or_else(|| "no feed sources configured".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feed::codec::encode_content;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const FIXTURE: &str = include_str!("../../../fixtures/articles.json");

    #[derive(Clone, Default)]
    struct SourceLog {
        hits: Arc<Mutex<Vec<&'static str>>>,
        flaky_calls: Arc<AtomicUsize>,
    }

    impl SourceLog {
        fn record(&self, name: &'static str) {
            self.hits.lock().expect("log lock").push(name);
        }

        fn hits(&self) -> Vec<&'static str> {
            self.hits.lock().expect("log lock").clone()
        }
    }

    async fn down(State(log): State<SourceLog>) -> (StatusCode, &'static str) {
        log.record("down");
        (StatusCode::INTERNAL_SERVER_ERROR, "temporary failure")
    }

    async fn missing(State(log): State<SourceLog>) -> StatusCode {
        log.record("missing");
        StatusCode::NOT_FOUND
    }

    async fn raw_feed(State(log): State<SourceLog>) -> &'static str {
        log.record("raw");
        FIXTURE
    }

    async fn envelope(State(log): State<SourceLog>) -> Json<Value> {
        log.record("envelope");
        Json(json!({
            "name": "articles.json",
            "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
            "encoding": "base64",
            "content": encode_content(FIXTURE),
        }))
    }

    async fn not_a_feed(State(log): State<SourceLog>) -> &'static str {
        log.record("not_a_feed");
        r#"{"items":[]}"#
    }

    async fn flaky(State(log): State<SourceLog>) -> (StatusCode, &'static str) {
        log.record("flaky");
        if log.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return (StatusCode::BAD_GATEWAY, "warming up");
        }
        (StatusCode::OK, FIXTURE)
    }

    async fn spawn_test_server(log: SourceLog) -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route("/down", get(down))
            .route("/missing", get(missing))
            .route("/raw", get(raw_feed))
            .route("/envelope", get(envelope))
            .route("/not-a-feed", get(not_a_feed))
            .route("/flaky", get(flaky))
            .with_state(log);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}"), join_handle)
    }

    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        drop(listener);
        format!("http://{address}/feed.json")
    }

    #[tokio::test]
    async fn falls_back_in_order_until_a_source_succeeds() {
        let log = SourceLog::default();
        let (base, server_task) = spawn_test_server(log.clone()).await;
        let loader = FeedLoader::new(
            reqwest::Client::new(),
            vec![
                format!("{base}/down"),
                format!("{base}/missing"),
                format!("{base}/raw"),
                format!("{base}/envelope"),
            ],
        );

        let feed = loader.load().await.expect("third source should succeed");

        assert_eq!(log.hits(), vec!["down", "missing", "raw"]);
        assert_eq!(feed.articles.len(), 4);
        assert_eq!(feed.meta.last_update, "2025-03-02");
        server_task.abort();
    }

    #[tokio::test]
    async fn exhausting_every_source_reports_fetch_failed() {
        let log = SourceLog::default();
        let (base, server_task) = spawn_test_server(log.clone()).await;
        let loader = FeedLoader::new(
            reqwest::Client::new(),
            vec![
                format!("{base}/down"),
                closed_port_url().await,
                format!("{base}/missing"),
            ],
        );

        let error = loader.load().await.expect_err("every source fails");

        match error {
            LoadError::FetchFailed {
                sources_tried,
                last_error,
            } => {
                assert_eq!(sources_tried, 3);
                assert!(last_error.contains("404"));
            }
            other => panic!("expected FetchFailed, got {other:?}"),
        }
        assert_eq!(log.hits(), vec!["down", "missing"]);
        server_task.abort();
    }

    #[tokio::test]
    async fn envelope_source_is_decoded_and_sorted_newest_first() {
        let log = SourceLog::default();
        let (base, server_task) = spawn_test_server(log.clone()).await;
        let loader = FeedLoader::new(reqwest::Client::new(), vec![format!("{base}/envelope")]);

        let feed = loader.load().await.expect("envelope source should load");
        let dates: Vec<&str> = feed
            .articles
            .iter()
            .map(|article| article.publish_date.as_str())
            .collect();

        assert_eq!(dates, vec!["2025-03-02", "2025-03-01", "2025-02-28", "2025-02-15"]);
        assert_eq!(feed.articles[0].title, "春分：昼夜平分的日子");
        let legacy = &feed.articles[3];
        assert_eq!(legacy.image_urls, vec![legacy.image_url.clone()]);
        assert_eq!(feed.articles[2].view_count, 5);
        assert_eq!(feed.articles[1].view_count, 40);
        server_task.abort();
    }

    #[tokio::test]
    async fn malformed_feed_is_reported_without_trying_mirrors() {
        let log = SourceLog::default();
        let (base, server_task) = spawn_test_server(log.clone()).await;
        let loader = FeedLoader::new(
            reqwest::Client::new(),
            vec![format!("{base}/not-a-feed"), format!("{base}/raw")],
        );

        let error = loader.load().await.expect_err("wrong shape must fail");

        assert!(matches!(error, LoadError::MalformedFeed(_)));
        assert_eq!(log.hits(), vec!["not_a_feed"]);
        server_task.abort();
    }

    #[tokio::test]
    async fn retries_transient_failures_before_falling_back() {
        let log = SourceLog::default();
        let (base, server_task) = spawn_test_server(log.clone()).await;
        let loader = FeedLoader::new(
            reqwest::Client::new(),
            vec![format!("{base}/flaky"), format!("{base}/raw")],
        )
        .with_retries(1, Duration::from_millis(5));

        let feed = loader.load().await.expect("retry should recover");

        assert_eq!(log.hits(), vec!["flaky", "flaky"]);
        assert_eq!(feed.articles.len(), 4);
        server_task.abort();
    }

    #[tokio::test]
    async fn empty_source_list_fails_immediately() {
        let loader = FeedLoader::new(reqwest::Client::new(), Vec::new());
        let error = loader.load().await.expect_err("nothing to fetch");
        assert!(matches!(error, LoadError::FetchFailed { sources_tried: 0, .. }));
    }
}
