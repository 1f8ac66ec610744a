use chrono::NaiveDate;
use rand::Rng;
use serde_json::Map;

use super::PublishError;
use crate::core::feed::Article;

/// What the admin form collects for one new article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub description: String,
    pub image_urls: Vec<String>,
    pub publish_date: String,
    pub video_id: String,
    pub author: String,
}

impl ArticleDraft {
    /// Builds a draft from the form's raw image field, one URL per line.
    pub fn from_form(
        title: &str,
        description: &str,
        image_url_text: &str,
        publish_date: &str,
        video_id: &str,
        author: &str,
    ) -> Self {
        Self {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            image_urls: parse_image_urls(image_url_text),
            publish_date: publish_date.trim().to_string(),
            video_id: video_id.trim().to_string(),
            author: author.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), PublishError> {
        if self.image_urls.is_empty() {
            return Err(PublishError::Validation(
                "at least one image URL is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Turns the draft into a feed record. The first image doubles as the
    /// primary and thumbnail image; a blank date becomes `today`.
    pub fn into_article(self, id: String, today: NaiveDate) -> Result<Article, PublishError> {
        self.validate()?;
        let primary = self.image_urls[0].clone();
        let publish_date = if self.publish_date.is_empty() {
            today.format("%Y-%m-%d").to_string()
        } else {
            self.publish_date
        };

        Ok(Article {
            id,
            title: self.title,
            description: self.description,
            image_url: primary.clone(),
            image_urls: self.image_urls,
            thumbnail_url: primary,
            tags: Vec::new(),
            category: String::new(),
            publish_date,
            video_id: self.video_id,
            author: self.author,
            view_count: 0,
            download_count: 0,
            favorite_count: 0,
            extra: Map::new(),
        })
    }
}

pub fn parse_image_urls(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// `YYYYMMDD` followed by a zero-padded random three-digit suffix.
pub fn generate_article_id(date: NaiveDate) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..999);
    format!("{}{suffix:03}", date.format("%Y%m%d"))
}
