//! Remote RSS/Atom feed adapter.

use crate::config::FetchSettings;
use crate::fetcher::Fetcher;
use crate::sources::SourceAdapter;
use crate::types::{JournalistError, RawItem, RawKey, Result};
use async_trait::async_trait;
use chrono::Utc;
use feed_rs::parser;
use tracing::{debug, warn};

pub struct FeedSource {
    name: String,
    url: String,
    fetcher: Fetcher,
}

impl FeedSource {
    pub fn new(name: String, url: String, fetch_settings: FetchSettings) -> Result<Self> {
        Ok(Self {
            name,
            url,
            fetcher: Fetcher::new(fetch_settings)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for FeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let body = self.fetcher.fetch_text(&self.url).await?;

        let feed = parser::parse(body.as_bytes())
            .map_err(|e| JournalistError::Parse(format!("{}: {}", self.url, e)))?;

        let mut items = Vec::new();
        for entry in feed.entries {
            let link = match entry.links.first() {
                Some(link) => link.href.clone(),
                None => {
                    warn!("{}: entry without link skipped ({})", self.name, entry.id);
                    continue;
                }
            };

            let key = if entry.id.is_empty() {
                RawKey::Link
            } else {
                RawKey::Natural(entry.id.clone())
            };

            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let summary = entry.summary.map(|s| s.content);
            let content = entry.content.and_then(|c| c.body);
            let published_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc));
            let tags = entry.categories.into_iter().map(|c| c.term).collect();

            items.push(RawItem {
                key,
                link,
                title,
                summary,
                content,
                published_at,
                tags,
            });
        }

        debug!("{}: {} candidate items from {}", self.name, items.len(), self.url);
        Ok(items)
    }
}
