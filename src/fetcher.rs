//! HTTP fetch shared by the remote-source adapters. Every fetch carries a
//! timeout; transient failures retry with exponential backoff.

use crate::config::FetchSettings;
use crate::types::{JournalistError, Result};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Fetcher {
    client: Client,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, settings })
    }

    /// Fetch a document body as text. A timed-out or exhausted fetch is an
    /// adapter failure for the calling channel, never a partial success.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.settings.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.settings.retry_delay_seconds),
            max_interval: Duration::from_secs(self.settings.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.settings.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error: Option<JournalistError> = None;

        for attempt in 0..=self.settings.max_retries {
            match self.fetch_once(url).await {
                Ok(body) => {
                    info!("fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(e) => {
                    debug!("attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = Some(e);

                    if attempt < self.settings.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!("retrying {} in {:?}", url, delay);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            JournalistError::Fetch(format!("no attempts made for {}", url))
        }))
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(JournalistError::Fetch(format!(
                "HTTP {} for {}",
                status, url
            )));
        }

        Ok(response.text().await?)
    }
}
