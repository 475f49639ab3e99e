//! Bookmarks adapter over an org-roam SQLite database. The database gives
//! id, title, and ref link; tags, body text, and the creation timestamp come
//! from the underlying org file.

use crate::sources::SourceAdapter;
use crate::types::{JournalistError, RawItem, RawKey, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::PileFilter;

static TAGS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\#\+TAGS:\s*(.*)").unwrap());

/// Bookmark as stored in the pile.
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub id: String,
    pub link: String,
    pub title: String,
    pub tags: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

impl Bookmark {
    pub fn is_unread(&self) -> bool {
        self.tags.iter().any(|t| t == "unsorted")
    }

    pub fn is_project(&self) -> bool {
        self.tags.iter().any(|t| t == "project") || self.link.starts_with("https://github.com")
    }

    pub fn is_recommended(&self) -> bool {
        self.tags.iter().any(|t| t == "recommend") && !self.is_unread()
    }

    fn matches(&self, filter: PileFilter) -> bool {
        match filter {
            PileFilter::Unread => self.is_unread(),
            PileFilter::Recommended => self.is_recommended(),
            PileFilter::Projects => self.is_project(),
            PileFilter::All => true,
        }
    }
}

pub struct PileSource {
    name: String,
    db_path: PathBuf,
    filter: PileFilter,
    timezone: Tz,
}

impl PileSource {
    pub fn new(
        name: String,
        db_path: PathBuf,
        filter: PileFilter,
        timezone: Option<String>,
    ) -> Result<Self> {
        let timezone = match timezone {
            Some(tz) => tz.parse::<Tz>().map_err(|_| {
                JournalistError::Curation(format!("unknown timezone '{}' for pile source", tz))
            })?,
            None => chrono_tz::UTC,
        };

        Ok(Self {
            name,
            db_path,
            filter,
            timezone,
        })
    }

    async fn read_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .read_only(true);
        let pool = SqlitePool::connect_with(options).await?;

        // org-roam quotes stored values, hence the TRIMs.
        let rows = sqlx::query(
            r#"
            SELECT
                TRIM(id, '"') AS id,
                TRIM(file, '"') AS file,
                TRIM(title, '"') AS title,
                TRIM(type, '"') || ':' || TRIM(ref, '"') AS ref
            FROM nodes
            INNER JOIN refs ON nodes.id = refs.node_id
            "#,
        )
        .fetch_all(&pool)
        .await?;

        pool.close().await;

        let mut bookmarks = Vec::new();
        for row in rows {
            let id: String = row.try_get("id")?;
            let file: String = row.try_get("file")?;
            let title: String = row.try_get("title")?;
            let link: String = row.try_get("ref")?;

            let file_path = Path::new(&file);
            bookmarks.push(Bookmark {
                id,
                link,
                title,
                tags: read_tags(file_path),
                created: file_created_at(file_path, self.timezone),
                content: read_content(file_path),
            });
        }

        Ok(bookmarks)
    }
}

#[async_trait]
impl SourceAdapter for PileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let bookmarks = self.read_bookmarks().await?;
        let total = bookmarks.len();

        let items: Vec<RawItem> = bookmarks
            .into_iter()
            .filter(|bm| bm.matches(self.filter))
            .map(|bm| RawItem {
                key: RawKey::Natural(bm.id),
                link: bm.link,
                title: bm.title,
                summary: None,
                content: bm.content,
                published_at: bm.created,
                tags: bm.tags,
            })
            .collect();

        debug!(
            "{}: {} of {} bookmarks match filter {:?}",
            self.name,
            items.len(),
            total,
            self.filter
        );
        Ok(items)
    }
}

/// Read `#+TAGS:` from an org file. Missing file or tags line means no tags.
fn read_tags(file_path: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(file_path) else {
        return Vec::new();
    };

    for line in content.lines() {
        if let Some(captures) = TAGS_REGEX.captures(line) {
            if let Some(tags) = captures.get(1) {
                return tags
                    .as_str()
                    .split(',')
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect();
            }
        }
    }
    Vec::new()
}

/// Body of an org file, skipping the metadata block at the top.
fn read_content(file_path: &Path) -> Option<String> {
    let raw = fs::read_to_string(file_path).ok()?;
    let mut content = String::new();
    let mut in_content = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if !in_content {
            if trimmed.starts_with('#') || trimmed.starts_with(':') || trimmed.is_empty() {
                continue;
            }
            in_content = true;
        }
        content.push_str(line);
        content.push('\n');
    }

    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

/// Creation time from the `YYYYmmddHHMMSS-<slug>.org` file name pattern,
/// interpreted in the configured timezone. Unparseable names yield None and
/// the engine assigns a first-seen timestamp instead.
fn file_created_at(file_path: &Path, tz: Tz) -> Option<DateTime<Utc>> {
    let file_name = file_path.file_name()?.to_str()?;
    let (stamp, _) = file_name.split_once('-')?;

    let naive = match NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S") {
        Ok(naive) => naive,
        Err(_) => {
            warn!("unparseable timestamp in file name: {}", file_name);
            return None;
        }
    };

    naive
        .and_local_timezone(tz)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn tags_line_parses_into_trimmed_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240501120000-figaro.org");
        fs::write(
            &path,
            ":PROPERTIES:\n:ID: cae71435\n:END:\n#+TAGS: project, speech, privacy\n#+TITLE: Figaro\n",
        )
        .unwrap();

        assert_eq!(read_tags(&path), vec!["project", "speech", "privacy"]);
    }

    #[test]
    fn content_skips_metadata_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240501120000-note.org");
        fs::write(&path, "#+TITLE: Note\n:ID: x\n\nActual body here.\n").unwrap();

        assert_eq!(read_content(&path).unwrap(), "Actual body here.\n");
    }

    #[test]
    fn file_name_timestamp_is_read_in_configured_timezone() {
        let path = Path::new("/pile/20240501120000-note.org");
        let created = file_created_at(path, chrono_tz::UTC).unwrap();
        assert_eq!(created.hour(), 12);

        let kolkata = file_created_at(path, chrono_tz::Asia::Kolkata).unwrap();
        assert!(kolkata < created);
    }

    #[test]
    fn filters_match_original_semantics() {
        let bm = Bookmark {
            id: "x".to_string(),
            link: "https://github.com/someone/repo".to_string(),
            title: "Repo".to_string(),
            tags: vec!["recommend".to_string()],
            created: None,
            content: None,
        };

        assert!(bm.is_project());
        assert!(bm.is_recommended());
        assert!(!bm.is_unread());
        assert!(bm.matches(PileFilter::All));
        assert!(!bm.matches(PileFilter::Unread));
    }
}
