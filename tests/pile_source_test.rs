use journalist::sources::pile::PileSource;
use journalist::types::{ChannelAuthor, RawKey};
use journalist::{
    ChannelConfig, ChannelPolicy, FetchSettings, GenerationEngine, JournalistConfig, PileFilter,
    SourceAdapter, SourceConfig,
};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build an org-roam-shaped database with two bookmarks backed by org files.
/// org-roam stores values quoted, which the adapter TRIMs away.
async fn build_pile(dir: &Path) -> PathBuf {
    let unread = dir.join("20240501120000-unread.org");
    fs::write(
        &unread,
        ":PROPERTIES:\n:ID: one\n:END:\n#+TAGS: unsorted\n#+TITLE: Unread bookmark\n\nSaved for later.\n",
    )
    .unwrap();

    let sorted = dir.join("20240301080000-sorted.org");
    fs::write(
        &sorted,
        ":PROPERTIES:\n:ID: two\n:END:\n#+TAGS: reference\n#+TITLE: Sorted bookmark\n\nAlready read.\n",
    )
    .unwrap();

    let db_path = dir.join("org-roam.db");
    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();

    sqlx::query("CREATE TABLE nodes (id TEXT, file TEXT, title TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE refs (node_id TEXT, ref TEXT, type TEXT)")
        .execute(&pool)
        .await
        .unwrap();

    for (id, file, title, reference) in [
        ("one", &unread, "Unread bookmark", "//example.com/unread"),
        ("two", &sorted, "Sorted bookmark", "//example.com/sorted"),
    ] {
        sqlx::query("INSERT INTO nodes (id, file, title) VALUES (?1, ?2, ?3)")
            .bind(format!("\"{}\"", id))
            .bind(format!("\"{}\"", file.display()))
            .bind(format!("\"{}\"", title))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO refs (node_id, ref, type) VALUES (?1, ?2, ?3)")
            .bind(format!("\"{}\"", id))
            .bind(format!("\"{}\"", reference))
            .bind("\"https\"")
            .execute(&pool)
            .await
            .unwrap();
    }

    pool.close().await;
    db_path
}

#[tokio::test]
async fn pile_adapter_reads_bookmarks_with_unread_filter() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = build_pile(dir.path()).await;

    let source = PileSource::new(
        "pile-bookmarks".to_string(),
        db_path.clone(),
        PileFilter::Unread,
        None,
    )
    .unwrap();

    let items = source.fetch().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Unread bookmark");
    assert_eq!(items[0].key, RawKey::Natural("one".to_string()));
    assert_eq!(items[0].link, "https://example.com/unread");
    assert!(items[0].published_at.is_some());
    assert!(items[0].content.as_deref().unwrap().contains("Saved for later."));

    let all = PileSource::new("pile-bookmarks".to_string(), db_path, PileFilter::All, None)
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn batch_run_generates_pile_channel_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = build_pile(dir.path()).await;

    let config = Arc::new(JournalistConfig {
        author: ChannelAuthor {
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            uri: "https://example.com".to_string(),
        },
        base_url: "https://example.com/feeds".to_string(),
        output_dir: dir.path().join("out"),
        state_dir: dir.path().join("state"),
        opml_file: "index.opml".to_string(),
        max_concurrent_channels: 2,
        retention_days: 90,
        fetch: FetchSettings::default(),
        channels: vec![ChannelConfig {
            name: "pile-bookmarks".to_string(),
            title: "Bookmarks".to_string(),
            subtitle: Some("Unread picks from the saved bookmarks.".to_string()),
            source: SourceConfig::Pile {
                db_path,
                filter: PileFilter::Unread,
                timezone: Some("Asia/Kolkata".to_string()),
            },
            policy: ChannelPolicy::default(),
            output_file: None,
        }],
    });

    let engine = Arc::new(GenerationEngine::new(&config).unwrap());
    let results = engine.run_all(&config, None).await;

    assert_eq!(results.len(), 1);
    let (name, outcome) = &results[0];
    assert_eq!(name, "pile-bookmarks");
    assert_eq!(*outcome.as_ref().unwrap(), 1);

    let artifact = fs::read_to_string(config.artifact_path(&config.channels[0])).unwrap();
    assert!(artifact.contains("<title>Unread bookmark</title>"));
    assert!(artifact.contains("<category term=\"unsorted\" />"));

    engine.write_registry(&config).unwrap();
    let opml = fs::read_to_string(config.output_dir.join("index.opml")).unwrap();
    assert!(opml.contains("xmlUrl=\"https://example.com/feeds/pile-bookmarks.xml\""));
}
