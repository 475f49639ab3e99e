//! Merge engine: combines already-generated Atom documents into one
//! consolidated feed. Pure: no channel state is read or written, and the
//! same inputs always yield the same output regardless of argument order.

use crate::atom::{AtomSerializer, FeedMetadata};
use crate::identity;
use crate::state;
use crate::types::{Item, JournalistError, Result};
use chrono::Utc;
use feed_rs::parser;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Parse one Atom document into canonical items. Any malformed entry is an
/// error for the whole merge; in particular an entry without a published
/// timestamp, since merge cannot fabricate provenance timestamps.
pub fn parse_atom_document(content: &str, source_label: &str) -> Result<Vec<Item>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| JournalistError::MergeInput(format!("{}: {}", source_label, e)))?;

    let mut items = Vec::new();
    for entry in feed.entries {
        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .ok_or_else(|| {
                JournalistError::MergeInput(format!(
                    "{}: entry '{}' has no link",
                    source_label, entry.id
                ))
            })?;

        let title = entry
            .title
            .map(|t| t.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                JournalistError::MergeInput(format!(
                    "{}: entry '{}' has no title",
                    source_label, entry.id
                ))
            })?;

        let published_at = entry
            .published
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                JournalistError::MergeInput(format!(
                    "{}: entry '{}' has no published timestamp",
                    source_label, entry.id
                ))
            })?;
        let updated_at = entry
            .updated
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(published_at)
            .max(published_at);

        let id = entry_identity(&entry.id, &link)?;

        items.push(Item {
            id,
            title,
            link,
            summary: entry.summary.map(|s| s.content),
            content: entry.content.and_then(|c| c.body),
            published_at,
            updated_at,
            tags: entry.categories.into_iter().map(|c| c.term).collect(),
            source: source_label.to_string(),
        });
    }

    debug!("{}: parsed {} entries", source_label, items.len());
    Ok(items)
}

/// Identity for a merged entry: a `urn:uuid:` id (our own generator's form)
/// is taken verbatim, any other non-empty id is treated as a natural key,
/// and entries without an id fall back to link identity.
fn entry_identity(entry_id: &str, link: &str) -> Result<Uuid> {
    if let Some(raw) = entry_id.strip_prefix("urn:uuid:") {
        if let Ok(id) = Uuid::parse_str(raw) {
            return Ok(id);
        }
    }
    if !entry_id.is_empty() {
        return Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, entry_id.as_bytes()));
    }
    identity::link_identity(link)
}

/// Deduplicate by identity, keeping the item with the latest `updated_at`
/// (ties resolved by content fingerprint so merge order cannot matter), then
/// order by `published_at` descending with id ascending as tiebreak.
pub fn merge_items(documents: Vec<Vec<Item>>) -> Vec<Item> {
    let mut by_identity: HashMap<Uuid, Item> = HashMap::new();

    for item in documents.into_iter().flatten() {
        match by_identity.get(&item.id) {
            Some(existing) if !supersedes(&item, existing) => {}
            _ => {
                by_identity.insert(item.id, item);
            }
        }
    }

    let mut merged: Vec<Item> = by_identity.into_values().collect();
    merged.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

fn supersedes(candidate: &Item, existing: &Item) -> bool {
    if candidate.updated_at != existing.updated_at {
        return candidate.updated_at > existing.updated_at;
    }
    fingerprint(candidate) < fingerprint(existing)
}

fn fingerprint(item: &Item) -> Uuid {
    identity::content_fingerprint(
        &item.title,
        item.summary.as_deref(),
        item.content.as_deref(),
    )
}

/// Feed header for the consolidated document.
pub struct MergeOutput {
    pub title: String,
    pub feed_id: String,
    pub author: crate::types::ChannelAuthor,
}

/// Read, merge, and serialize a set of Atom files. Aborts before writing if
/// any input is malformed, so no partial output file is left behind.
pub fn merge_files(inputs: &[std::path::PathBuf], output: &Path, meta: &MergeOutput) -> Result<usize> {
    let mut documents = Vec::new();
    for input in inputs {
        let label = input.display().to_string();
        let content = fs::read_to_string(input)
            .map_err(|e| JournalistError::MergeInput(format!("{}: {}", label, e)))?;
        documents.push(parse_atom_document(&content, &label)?);
    }

    let merged = merge_items(documents);
    let count = merged.len();

    let serializer = AtomSerializer::new()?;
    let metadata = FeedMetadata {
        id: meta.feed_id.clone(),
        title: meta.title.clone(),
        subtitle: None,
        link: meta.feed_id.clone(),
        author: meta.author.clone(),
    };
    let rendered = serializer.render(&metadata, &merged, Utc::now())?;
    state::write_atomic(output, rendered.as_bytes())?;

    info!(
        "merged {} inputs into {} ({} entries)",
        inputs.len(),
        output.display(),
        count
    );
    Ok(count)
}
