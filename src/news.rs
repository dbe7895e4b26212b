// News items shared by the Câmara and Senado feeds, feed selection and ranking

use crate::config::UpstreamUrls;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub publication_date: String,
    pub description: String,
}

impl NewsItem {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.publication_date)
    }
}

/// RSS dates are RFC 2822; a few feeds publish RFC 3339 instead.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Concatenates the collections and orders them newest first.
///
/// The sort is stable, so items with equal timestamps keep their input
/// order; items whose date does not parse go to the end.
pub fn merge_and_rank<I>(collections: I) -> Vec<NewsItem>
where
    I: IntoIterator<Item = Vec<NewsItem>>,
{
    let mut merged: Vec<NewsItem> = collections.into_iter().flatten().collect();
    merged.sort_by_cached_key(|item| Reverse(item.published_at()));
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewsTopic {
    #[default]
    Latest,
    Politics,
    Economy,
}

impl NewsTopic {
    // Unknown or missing topics fall back to the latest-news feed
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|t| t.trim().to_ascii_uppercase()).as_deref() {
            Some("POLITICA") => NewsTopic::Politics,
            Some("ECONOMIA") => NewsTopic::Economy,
            _ => NewsTopic::Latest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NewsTopic::Latest => "ULTIMAS",
            NewsTopic::Politics => "POLITICA",
            NewsTopic::Economy => "ECONOMIA",
        }
    }

    pub fn feed_url(&self, urls: &UpstreamUrls) -> String {
        match self {
            NewsTopic::Latest => urls.camara_news.clone(),
            NewsTopic::Politics | NewsTopic::Economy => {
                format!("{}/dinamico/{}", urls.camara_news, self.as_str())
            }
        }
    }
}
