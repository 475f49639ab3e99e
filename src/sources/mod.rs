//! Source adapters. Each one turns an external source into a sequence of
//! raw candidate items for the curator; everything past that boundary is
//! source-agnostic.

pub mod feed;
pub mod hf;
pub mod pile;

use crate::config::{ChannelConfig, FetchSettings, SourceConfig};
use crate::types::{RawItem, Result};
use async_trait::async_trait;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the current candidate items. A transport or parse failure
    /// here aborts generation for the owning channel only.
    async fn fetch(&self) -> Result<Vec<RawItem>>;
}

/// Wire up the adapter a channel's config asks for.
pub fn build_adapter(
    channel: &ChannelConfig,
    fetch_settings: &FetchSettings,
) -> Result<Box<dyn SourceAdapter>> {
    match &channel.source {
        SourceConfig::Feed { url } => Ok(Box::new(feed::FeedSource::new(
            channel.name.clone(),
            url.clone(),
            fetch_settings.clone(),
        )?)),
        SourceConfig::Pile {
            db_path,
            filter,
            timezone,
        } => Ok(Box::new(pile::PileSource::new(
            channel.name.clone(),
            db_path.clone(),
            *filter,
            timezone.clone(),
        )?)),
        SourceConfig::HfPapers => Ok(Box::new(hf::HfPapersSource::new(
            channel.name.clone(),
            fetch_settings.clone(),
        )?)),
    }
}
