pub mod draft;

use chrono::{Local, NaiveDate, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::GithubConfig;
use crate::core::feed::codec::{encode_feed, resolve_payload, DecodeError};
use crate::core::feed::parser::{check_feed_shape, FeedParseError};
use crate::core::feed::Article;

pub use draft::{generate_article_id, parse_image_urls, ArticleDraft};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid article: {0}")]
    Validation(String),
    #[error("remote feed changed since it was read ({0}); reload and try again")]
    ConflictOrStale(String),
    #[error("could not decode remote feed: {0}")]
    Decode(#[from] DecodeError),
    #[error("malformed remote feed: {0}")]
    MalformedFeed(String),
    #[error("could not encode feed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code {status}: {message}")]
    HttpStatus { status: u16, message: String },
}

impl From<FeedParseError> for PublishError {
    fn from(error: FeedParseError) -> Self {
        match error {
            FeedParseError::Decode(inner) => PublishError::Decode(inner),
            structural => PublishError::MalformedFeed(structural.to_string()),
        }
    }
}

/// The stored feed document, exactly as read, together with the revision
/// marker it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub document: Map<String, Value>,
    pub sha: String,
}

impl RemoteDocument {
    pub fn article_count(&self) -> usize {
        self.document
            .get("articles")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    pub article: Article,
    pub total_count: u64,
}

#[derive(Debug, Serialize)]
struct UpdateContentRequest<'a> {
    message: String,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

/// Places `article` at the head of the stored `articles` array and refreshes
/// `meta`. Existing entries are left exactly as they were read.
pub fn prepend_article(
    document: &mut Map<String, Value>,
    article: &Article,
    today: NaiveDate,
) -> Result<u64, PublishError> {
    let record = serde_json::to_value(article)?;
    let Some(Value::Array(articles)) = document.get_mut("articles") else {
        return Err(PublishError::MalformedFeed(
            FeedParseError::ArticlesNotArray.to_string(),
        ));
    };
    articles.insert(0, record);
    let total_count = articles.len() as u64;

    let meta = document
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    if meta.is_null() {
        *meta = Value::Object(Map::new());
    }
    let Value::Object(meta) = meta else {
        return Err(PublishError::MalformedFeed(
            FeedParseError::MetaNotObject.to_string(),
        ));
    };
    meta.insert("totalCount".to_string(), Value::from(total_count));
    meta.insert(
        "lastUpdate".to_string(),
        Value::from(today.format("%Y-%m-%d").to_string()),
    );
    Ok(total_count)
}

/// Read-modify-write client for the feed file in a GitHub repository.
#[derive(Debug, Clone)]
pub struct PublishClient {
    client: reqwest::Client,
    github: GithubConfig,
}

impl PublishClient {
    pub fn new(client: reqwest::Client, github: GithubConfig) -> Self {
        Self { client, github }
    }

    pub fn is_configured(&self) -> bool {
        self.token().is_ok()
    }

    /// Reads the current feed and its revision marker, prepends the draft and
    /// writes the result back guarded by that marker.
    pub async fn publish(&self, draft: ArticleDraft) -> Result<PublishReceipt, PublishError> {
        draft.validate()?;
        self.token()?;
        let today = Local::now().date_naive();
        let article = draft.into_article(generate_article_id(today), today)?;
        let document = self.fetch_document().await?;
        self.publish_onto(article, document).await
    }

    /// Writes `article` on top of a previously read document. Fails with
    /// `ConflictOrStale` when the remote moved past `existing.sha`.
    pub async fn publish_onto(
        &self,
        article: Article,
        existing: RemoteDocument,
    ) -> Result<PublishReceipt, PublishError> {
        if article.image_urls.is_empty() {
            return Err(PublishError::Validation(
                "at least one image URL is required".to_string(),
            ));
        }
        let RemoteDocument { mut document, sha } = existing;
        let total_count = prepend_article(&mut document, &article, Utc::now().date_naive())?;
        self.write_document(&document, &sha).await?;
        tracing::info!(id = %article.id, total = total_count, "article published");
        Ok(PublishReceipt {
            article,
            total_count,
        })
    }

    pub async fn fetch_document(&self) -> Result<RemoteDocument, PublishError> {
        let token = self.token()?;
        let response = self
            .client
            .get(format!("{}?ref={}", self.contents_url(), self.github.branch))
            .header(AUTHORIZATION, format!("token {token}"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await?;
        let body = ensure_success(response).await?.bytes().await?;
        let (value, revision) = resolve_payload(&body)?;
        check_feed_shape(&value)?;
        let Value::Object(document) = value else {
            return Err(FeedParseError::RootNotObject.into());
        };
        let sha = revision.ok_or_else(|| {
            PublishError::MalformedFeed("contents response carried no revision marker".to_string())
        })?;
        let remote = RemoteDocument { document, sha };
        tracing::debug!(sha = %remote.sha, articles = remote.article_count(), "remote feed read");
        Ok(remote)
    }

    async fn write_document(
        &self,
        document: &Map<String, Value>,
        sha: &str,
    ) -> Result<(), PublishError> {
        let token = self.token()?;
        let request = UpdateContentRequest {
            message: format!("更新文章数据 - {}", Local::now().format("%Y/%m/%d %H:%M:%S")),
            content: encode_feed(document)?,
            sha,
            branch: &self.github.branch,
        };
        let response = self
            .client
            .put(self.contents_url())
            .header(AUTHORIZATION, format!("token {token}"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&request)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.github.api_base.trim_end_matches('/'),
            self.github.owner,
            self.github.repo,
            self.github.path.trim_start_matches('/'),
        )
    }

    fn token(&self) -> Result<&str, PublishError> {
        self.github
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PublishError::Auth("no GitHub token configured".to_string()))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("message").and_then(|message| message.as_str()).map(ToString::to_string))
        .unwrap_or(body);
    match status.as_u16() {
        401 | 403 => Err(PublishError::Auth(message)),
        409 | 412 => Err(PublishError::ConflictOrStale(message)),
        code => Err(PublishError::HttpStatus {
            status: code,
            message,
        }),
    }
}
