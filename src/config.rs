use crate::curator::Curator;
use crate::types::{ChannelAuthor, ChannelPolicy, JournalistError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which bookmarks a pile channel selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PileFilter {
    #[default]
    Unread,
    Recommended,
    Projects,
    All,
}

/// Source wiring for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Remote RSS/Atom feed.
    Feed { url: String },
    /// org-roam bookmarks database.
    Pile {
        db_path: PathBuf,
        #[serde(default)]
        filter: PileFilter,
        /// IANA timezone for interpreting file-name timestamps.
        #[serde(default)]
        timezone: Option<String>,
    },
    /// Weekly papers listing.
    HfPapers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub source: SourceConfig,
    #[serde(default)]
    pub policy: ChannelPolicy,
    /// Artifact file name under `output_dir`; defaults to `<name>.xml`.
    #[serde(default)]
    pub output_file: Option<String>,
}

impl ChannelConfig {
    pub fn output_file_name(&self) -> String {
        self.output_file
            .clone()
            .unwrap_or_else(|| format!("{}.xml", self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

fn default_user_agent() -> String {
    "journalist/0.2".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    5
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalistConfig {
    pub author: ChannelAuthor,
    /// Public base URL under which the generated feeds are served.
    pub base_url: String,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    #[serde(default = "default_opml_file")]
    pub opml_file: String,
    #[serde(default = "default_max_concurrent_channels")]
    pub max_concurrent_channels: usize,
    /// Ledger entries unseen for this many days are evicted at commit.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub channels: Vec<ChannelConfig>,
}

fn default_opml_file() -> String {
    "index.opml".to_string()
}

fn default_max_concurrent_channels() -> usize {
    4
}

fn default_retention_days() -> i64 {
    90
}

impl JournalistConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!(
            "loaded config with {} channels from {}",
            config.channels.len(),
            path.display()
        );
        Ok(config)
    }

    /// Structural misconfiguration is fatal for the whole invocation.
    fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(JournalistError::Curation(
                "no channels configured".to_string(),
            ));
        }
        if self.max_concurrent_channels == 0 {
            return Err(JournalistError::Curation(
                "max_concurrent_channels must be at least 1".to_string(),
            ));
        }
        if self.retention_days <= 0 {
            return Err(JournalistError::Curation(
                "retention_days must be positive".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                return Err(JournalistError::Curation(
                    "channel with empty name".to_string(),
                ));
            }
            if !names.insert(channel.name.as_str()) {
                return Err(JournalistError::Curation(format!(
                    "duplicate channel name '{}'",
                    channel.name
                )));
            }
            // A contradictory policy aborts the whole invocation before any
            // channel runs, not just the channel that carries it.
            Curator::new(channel.policy.clone()).map_err(|e| {
                JournalistError::Curation(format!("channel '{}': {}", channel.name, e))
            })?;
        }
        Ok(())
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn artifact_path(&self, channel: &ChannelConfig) -> PathBuf {
        self.output_dir.join(channel.output_file_name())
    }

    pub fn feed_url(&self, channel: &ChannelConfig) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            channel.output_file_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(channels: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "author": {
                "name": "Abhinav",
                "email": "abhinav@example.com",
                "uri": "https://example.com"
            },
            "base_url": "https://example.com/feeds/",
            "output_dir": "/tmp/out",
            "state_dir": "/tmp/state",
            "channels": channels
        })
    }

    #[test]
    fn defaults_are_filled_in() {
        let value = base_config(serde_json::json!([
            {
                "name": "pile-bookmarks",
                "title": "Bookmarks",
                "source": { "kind": "pile", "db_path": "/tmp/org-roam.db" }
            }
        ]));
        let config: JournalistConfig = serde_json::from_value(value).unwrap();
        config.validate().unwrap();

        assert_eq!(config.opml_file, "index.opml");
        assert_eq!(config.max_concurrent_channels, 4);
        assert_eq!(config.channels[0].policy.max_items, 50);
        assert_eq!(
            config.feed_url(&config.channels[0]),
            "https://example.com/feeds/pile-bookmarks.xml"
        );
    }

    #[test]
    fn contradictory_policy_is_fatal_for_the_whole_invocation() {
        let value = base_config(serde_json::json!([
            { "name": "ok", "title": "OK", "source": { "kind": "hf_papers" } },
            {
                "name": "broken",
                "title": "Broken",
                "source": { "kind": "hf_papers" },
                "policy": {
                    "required_tags": ["unsorted"],
                    "forbidden_tags": ["unsorted"]
                }
            }
        ]));
        let config: JournalistConfig = serde_json::from_value(value).unwrap();
        match config.validate() {
            Err(JournalistError::Curation(message)) => {
                assert!(message.contains("broken"));
                assert!(message.contains("unsorted"));
            }
            other => panic!("expected curation error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_channel_names_are_fatal() {
        let value = base_config(serde_json::json!([
            { "name": "a", "title": "A", "source": { "kind": "hf_papers" } },
            { "name": "a", "title": "A again", "source": { "kind": "hf_papers" } }
        ]));
        let config: JournalistConfig = serde_json::from_value(value).unwrap();
        assert!(matches!(
            config.validate(),
            Err(JournalistError::Curation(_))
        ));
    }
}
