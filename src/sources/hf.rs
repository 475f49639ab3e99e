//! Weekly papers adapter: scrapes the Hugging Face papers listing for the
//! current ISO week.

use crate::config::FetchSettings;
use crate::fetcher::Fetcher;
use crate::sources::SourceAdapter;
use crate::types::{JournalistError, RawItem, RawKey, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use scraper::{Html, Selector};
use tracing::{debug, warn};

const BASE_URL: &str = "https://huggingface.co";

#[derive(Debug, Clone, Copy)]
pub struct Week {
    pub year: i32,
    pub week: u32,
}

impl Week {
    pub fn current() -> Self {
        let now = Utc::now();
        Self {
            year: now.iso_week().year(),
            week: now.iso_week().week(),
        }
    }

    fn listing_url(&self) -> String {
        format!("{}/papers/week/{}-W{}", BASE_URL, self.year, self.week)
    }
}

pub struct HfPapersSource {
    name: String,
    fetcher: Fetcher,
}

impl HfPapersSource {
    pub fn new(name: String, fetch_settings: FetchSettings) -> Result<Self> {
        Ok(Self {
            name,
            fetcher: Fetcher::new(fetch_settings)?,
        })
    }

    fn parse_listing(&self, body: &str) -> Result<Vec<RawItem>> {
        let document = Html::parse_document(body);
        let article_selector = Selector::parse("article")
            .map_err(|e| JournalistError::Parse(format!("bad selector: {}", e)))?;
        let link_selector = Selector::parse("h3 a")
            .map_err(|e| JournalistError::Parse(format!("bad selector: {}", e)))?;
        let div_selector = Selector::parse("div")
            .map_err(|e| JournalistError::Parse(format!("bad selector: {}", e)))?;

        let mut items = Vec::new();
        for article in document.select(&article_selector) {
            let Some(link_element) = article.select(&link_selector).next() else {
                continue;
            };
            let title = link_element.text().collect::<String>().trim().to_string();
            let Some(rel_link) = link_element.attr("href") else {
                warn!("{}: paper without href skipped", self.name);
                continue;
            };

            // The vote badge is the only bare-number div in the card.
            let votes = article
                .select(&div_selector)
                .filter_map(|div| div.text().collect::<String>().trim().parse::<usize>().ok())
                .next();

            items.push(RawItem {
                // The relative paper path is stable across listings.
                key: RawKey::Natural(rel_link.to_string()),
                link: format!("{}{}", BASE_URL, rel_link),
                title,
                summary: votes.map(|v| format!("{} votes", v)),
                content: None,
                published_at: None,
                tags: Vec::new(),
            });
        }

        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for HfPapersSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let week = Week::current();
        let url = week.listing_url();
        let body = self.fetcher.fetch_text(&url).await?;

        let items = self.parse_listing(&body)?;
        debug!(
            "{}: {} papers for {}-W{}",
            self.name,
            items.len(),
            week.year,
            week.week
        );
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_parse_extracts_titles_and_links() {
        let source =
            HfPapersSource::new("hf-papers".to_string(), FetchSettings::default()).unwrap();

        let html = r#"
            <html><body>
              <article><div><div>42</div><div><h3><a href="/papers/2405.00001">Paper One</a></h3></div></div></article>
              <article><div><h3><a href="/papers/2405.00002">Paper Two</a></h3></div></article>
            </body></html>
        "#;

        let items = source.parse_listing(html).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Paper One");
        assert_eq!(items[0].link, "https://huggingface.co/papers/2405.00001");
        assert_eq!(items[0].summary.as_deref(), Some("42 votes"));
        assert_eq!(
            items[1].key,
            RawKey::Natural("/papers/2405.00002".to_string())
        );
        assert_eq!(items[1].summary, None);
    }

    #[test]
    fn week_url_follows_listing_format() {
        let week = Week { year: 2024, week: 18 };
        assert_eq!(
            week.listing_url(),
            "https://huggingface.co/papers/week/2024-W18"
        );
    }
}
