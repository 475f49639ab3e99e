//! Generation engine: drives one channel end-to-end and orchestrates batch
//! runs. Owns all mutation of channel state.

use crate::atom::{AtomSerializer, FeedMetadata};
use crate::config::{ChannelConfig, FetchSettings, JournalistConfig};
use crate::curator::Curator;
use crate::identity;
use crate::opml::{ChannelOutline, OpmlSerializer};
use crate::sources::{self, SourceAdapter};
use crate::state::{self, ChannelState, FileStateStore, StateEntry};
use crate::types::{AcceptedItem, Item, JournalistError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Merge newly curated items against prior channel state. New identities get
/// `published_at = updated_at = now` (unless the source supplied a
/// timestamp); known identities keep their stored `published_at` and bump
/// `updated_at` only when the content fingerprint changed. Entries in the
/// ledger but absent from `accepted` are left untouched and excluded from
/// the window.
///
/// Returns the active output window: `published_at` descending, ties broken
/// by id ascending, truncated to `max_items`.
pub fn reconcile(
    accepted: Vec<AcceptedItem>,
    state: &mut ChannelState,
    now: DateTime<Utc>,
    max_items: usize,
) -> Vec<Item> {
    let mut window = Vec::new();
    let mut seen: HashSet<uuid::Uuid> = HashSet::new();

    for item in accepted {
        if !seen.insert(item.id) {
            warn!("{}: duplicate identity {} in one run, keeping first", item.source, item.id);
            continue;
        }

        let fingerprint = identity::content_fingerprint(
            &item.title,
            item.summary.as_deref(),
            item.content.as_deref(),
        );

        let entry = match state.entries.get_mut(&item.id) {
            Some(entry) => {
                if entry.fingerprint != fingerprint {
                    // A source may supply a future publication date; keep
                    // updated_at from dropping below it.
                    entry.updated_at = now.max(entry.published_at);
                    entry.fingerprint = fingerprint;
                }
                entry.last_seen = now;
                entry.clone()
            }
            None => {
                let published_at = item.published_at.unwrap_or(now);
                let entry = StateEntry {
                    published_at,
                    updated_at: published_at,
                    fingerprint,
                    last_seen: now,
                };
                state.entries.insert(item.id, entry.clone());
                entry
            }
        };

        window.push(Item {
            id: item.id,
            title: item.title,
            link: item.link,
            summary: item.summary,
            content: item.content,
            published_at: entry.published_at,
            updated_at: entry.updated_at,
            tags: item.tags,
            source: item.source,
        });
    }

    window.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    window.truncate(max_items);
    window
}

pub struct GenerationEngine {
    store: FileStateStore,
    atom: AtomSerializer,
    opml: OpmlSerializer,
    /// Per-channel generation locks; generation of one channel is serialized
    /// end-to-end while distinct channels run concurrently.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GenerationEngine {
    pub fn new(config: &JournalistConfig) -> Result<Self> {
        Ok(Self {
            store: FileStateStore::new(&config.state_dir)?,
            atom: AtomSerializer::new()?,
            opml: OpmlSerializer::new()?,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn channel_lock(&self, channel: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("channel lock map poisoned");
        locks
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Generate one channel: adapter fetch, curation, reconciliation against
    /// the ledger, then one atomic commit of state and artifact. Returns the
    /// size of the written window.
    pub async fn generate_channel(
        &self,
        config: &JournalistConfig,
        channel: &ChannelConfig,
        adapter: &dyn SourceAdapter,
    ) -> Result<usize> {
        let lock = self.channel_lock(&channel.name);
        let _guard = lock.lock().await;

        let raw_items = adapter
            .fetch()
            .await
            .map_err(|e| JournalistError::Adapter {
                channel: channel.name.clone(),
                message: e.to_string(),
            })?;

        let curator = Curator::new(channel.policy.clone())?;
        let accepted = curator.curate(raw_items, &channel.name);

        let mut state = self.store.load(&channel.name)?;
        let now = Utc::now();
        let window = reconcile(accepted, &mut state, now, channel.policy.max_items);

        let evicted = state.evict_older_than(now - Duration::days(config.retention_days));
        if evicted > 0 {
            info!("{}: evicted {} ledger entries past retention", channel.name, evicted);
        }

        let artifact = self
            .atom
            .render(&feed_metadata(config, channel), &window, now)?;
        let artifact_path = config.artifact_path(channel);
        self.store
            .commit(&channel.name, &state, artifact.as_bytes(), &artifact_path)?;

        info!(
            "{}: wrote {} entries to {}",
            channel.name,
            window.len(),
            artifact_path.display()
        );
        Ok(window.len())
    }

    /// Run every configured channel (or a single one) with bounded
    /// concurrency. One channel's failure never aborts its siblings; the
    /// per-channel outcomes are returned for the caller's summary.
    pub async fn run_all(
        self: &Arc<Self>,
        config: &Arc<JournalistConfig>,
        only: Option<&str>,
    ) -> Vec<(String, Result<usize>)> {
        self.run_with(config, only, sources::build_adapter).await
    }

    /// [`run_all`](Self::run_all) with an explicit adapter factory, so
    /// channels can be driven by in-process sources.
    pub async fn run_with<F>(
        self: &Arc<Self>,
        config: &Arc<JournalistConfig>,
        only: Option<&str>,
        build_adapter: F,
    ) -> Vec<(String, Result<usize>)>
    where
        F: Fn(&ChannelConfig, &FetchSettings) -> Result<Box<dyn SourceAdapter>>,
    {
        let selected: Vec<ChannelConfig> = config
            .channels
            .iter()
            .filter(|c| only.map_or(true, |name| c.name == name))
            .cloned()
            .collect();

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_channels));
        let mut handles = Vec::new();

        for channel in selected {
            let adapter = build_adapter(&channel, &config.fetch);
            let engine = Arc::clone(self);
            let config = Arc::clone(config);
            let semaphore = Arc::clone(&semaphore);
            let name = channel.name.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("channel semaphore closed");

                match adapter {
                    Ok(adapter) => {
                        engine
                            .generate_channel(&config, &channel, adapter.as_ref())
                            .await
                    }
                    Err(e) => Err(e),
                }
            });
            handles.push((name, handle));
        }

        // A panicked task still produces an entry, so the summary and exit
        // status account for every selected channel.
        let mut results = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(outcome) => results.push((name, outcome)),
                Err(e) => {
                    error!("channel {} task panicked: {}", name, e);
                    results.push((
                        name,
                        Err(JournalistError::Internal(format!(
                            "channel task panicked: {}",
                            e
                        ))),
                    ));
                }
            }
        }
        results
    }

    /// Regenerate the OPML registry from the full channel set. Stateless, so
    /// it runs after every batch regardless of per-channel outcomes.
    pub fn write_registry(&self, config: &JournalistConfig) -> Result<PathBuf> {
        let outlines: Vec<ChannelOutline> = config
            .channels
            .iter()
            .map(|channel| ChannelOutline {
                text: channel.title.clone(),
                title: channel.title.clone(),
                xml_url: config.feed_url(channel),
            })
            .collect();

        let rendered = self.opml.render("journalist channels", &outlines)?;
        let path = config.output_dir.join(&config.opml_file);
        state::write_atomic(&path, rendered.as_bytes())?;

        info!("wrote channel registry to {}", path.display());
        Ok(path)
    }
}

fn feed_metadata(config: &JournalistConfig, channel: &ChannelConfig) -> FeedMetadata {
    FeedMetadata {
        id: config.feed_url(channel),
        title: channel.title.clone(),
        subtitle: channel.subtitle.clone(),
        link: config.feed_url(channel),
        author: config.author.clone(),
    }
}
