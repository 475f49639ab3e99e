use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical unit of content. Every adapter normalizes into this shape and
/// both serializers consume it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Stable identity, derived from the source's natural key or the
    /// canonicalized link. The dedup key across runs and across merges.
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    /// First time the item was observed. Immutable once set.
    pub published_at: DateTime<Utc>,
    /// Bumped when the content fingerprint changes. Always >= published_at.
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
    /// Originating channel/source, for provenance.
    pub source: String,
}

/// How a raw item identifies itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    /// The source provides a stable identifier of its own.
    Natural(String),
    /// No native key; the canonicalized link is the key.
    Link,
}

/// Candidate item as produced by a source adapter, before curation.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub key: RawKey,
    pub link: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    /// Source-provided timestamp, if any. The curator never invents one;
    /// absent timestamps are assigned by the engine at reconciliation.
    pub published_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Item accepted by the curator, with its identity resolved.
#[derive(Debug, Clone)]
pub struct AcceptedItem {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub source: String,
}

/// Per-channel curation policy, deserialized from the channel config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPolicy {
    /// Size of the active output window.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Items whose text body is shorter than this are dropped. Zero disables
    /// the check.
    #[serde(default)]
    pub min_content_length: usize,
    /// Every listed tag must be present on an item for it to pass.
    #[serde(default)]
    pub required_tags: Vec<String>,
    /// Any listed tag present on an item drops it.
    #[serde(default)]
    pub forbidden_tags: Vec<String>,
    /// Trim item content to at most this many characters.
    #[serde(default)]
    pub trim_content_to: Option<usize>,
}

fn default_max_items() -> usize {
    50
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            min_content_length: 0,
            required_tags: Vec::new(),
            forbidden_tags: Vec::new(),
            trim_content_to: None,
        }
    }
}

/// Feed author rendered into the Atom output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAuthor {
    pub name: String,
    pub email: String,
    pub uri: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JournalistError {
    #[error("adapter failure for channel {channel}: {message}")]
    Adapter { channel: String, message: String },

    #[error("curation policy error: {0}")]
    Curation(String),

    #[error("state corrupted for channel {channel}: {message}")]
    StateCorruption { channel: String, message: String },

    #[error("merge input error: {0}")]
    MergeInput(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("internal failure: {0}")]
    Internal(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("template error: {0}")]
    Render(#[from] tera::Error),
}

pub type Result<T> = std::result::Result<T, JournalistError>;
