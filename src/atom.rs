//! Atom rendering. Deterministic: the same channel metadata and item window
//! always produce byte-identical output, apart from the generated-at comment
//! which sits alone on its own line so tests can strip it.

use crate::types::{ChannelAuthor, Item, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tera::{Context, Tera};

/// Template names end in `.xml` so tera autoescapes every interpolated
/// value; the escape function itself is swapped for [`xml_escape`] because
/// tera's default is HTML-flavored and rewrites `/` as `&#x2F;`, which would
/// mangle every URL in the output.
const FEED_TEMPLATE_NAME: &str = "feed.xml";

/// Escape the five XML entities and nothing else. Installed with
/// `Tera::set_escape_fn` on every serializer in this crate.
pub(crate) fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

const FEED_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>{{ feed.id }}</id>
  <title>{{ feed.title }}</title>
  {%- if feed.subtitle %}
  <subtitle>{{ feed.subtitle }}</subtitle>
  {%- endif %}
  <updated>{{ feed.updated }}</updated>
  <link rel="self" href="{{ feed.link }}" />
  <author>
    <name>{{ feed.author.name }}</name>
    <email>{{ feed.author.email }}</email>
    <uri>{{ feed.author.uri }}</uri>
  </author>
  <generator>{{ feed.generator }}</generator>
  <!-- generated at {{ feed.generated_at }} -->
  {%- for entry in feed.entries %}
  <entry>
    <id>urn:uuid:{{ entry.id }}</id>
    <title>{{ entry.title }}</title>
    <link href="{{ entry.link }}" />
    <published>{{ entry.published }}</published>
    <updated>{{ entry.updated }}</updated>
    {%- if entry.summary %}
    <summary>{{ entry.summary }}</summary>
    {%- endif %}
    {%- if entry.content %}
    <content type="text">{{ entry.content }}</content>
    {%- endif %}
    {%- for category in entry.categories %}
    <category term="{{ category }}" />
    {%- endfor %}
  </entry>
  {%- endfor %}
</feed>
"#;

/// Channel-level metadata rendered into the feed header.
#[derive(Debug, Clone)]
pub struct FeedMetadata {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    /// `rel=self` link of the generated feed.
    pub link: String,
    pub author: ChannelAuthor,
}

#[derive(Serialize)]
struct FeedContext {
    id: String,
    title: String,
    subtitle: Option<String>,
    updated: String,
    link: String,
    author: ChannelAuthor,
    generator: String,
    generated_at: String,
    entries: Vec<EntryContext>,
}

#[derive(Serialize)]
struct EntryContext {
    id: String,
    title: String,
    link: String,
    published: String,
    updated: String,
    summary: Option<String>,
    content: Option<String>,
    categories: Vec<String>,
}

pub struct AtomSerializer {
    tera: Tera,
}

impl AtomSerializer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.set_escape_fn(xml_escape);
        tera.add_raw_template(FEED_TEMPLATE_NAME, FEED_TEMPLATE)?;
        Ok(Self { tera })
    }

    /// Render the active item window. The feed `updated` element is the
    /// latest item `updated_at`; an empty window falls back to the run time.
    pub fn render(
        &self,
        metadata: &FeedMetadata,
        items: &[Item],
        generated_at: DateTime<Utc>,
    ) -> Result<String> {
        let feed_updated = items
            .iter()
            .map(|item| item.updated_at)
            .max()
            .unwrap_or(generated_at);

        let feed = FeedContext {
            id: metadata.id.clone(),
            title: metadata.title.clone(),
            subtitle: metadata.subtitle.clone(),
            updated: rfc3339(feed_updated),
            link: metadata.link.clone(),
            author: metadata.author.clone(),
            generator: "journalist".to_string(),
            generated_at: rfc3339(generated_at),
            entries: items.iter().map(entry_context).collect(),
        };

        let mut context = Context::new();
        context.insert("feed", &feed);
        Ok(self.tera.render(FEED_TEMPLATE_NAME, &context)?)
    }
}

fn entry_context(item: &Item) -> EntryContext {
    EntryContext {
        id: item.id.to_string(),
        title: item.title.clone(),
        link: item.link.clone(),
        published: rfc3339(item.published_at),
        updated: rfc3339(item.updated_at),
        summary: item.summary.clone(),
        content: item.content.clone(),
        categories: item.tags.clone(),
    }
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn author() -> ChannelAuthor {
        ChannelAuthor {
            name: "Test Author".to_string(),
            email: "author@example.com".to_string(),
            uri: "https://example.com".to_string(),
        }
    }

    fn metadata() -> FeedMetadata {
        FeedMetadata {
            id: "https://example.com/feeds/test".to_string(),
            title: "Test Channel".to_string(),
            subtitle: Some("A channel".to_string()),
            link: "https://example.com/feeds/test.xml".to_string(),
            author: author(),
        }
    }

    fn item(title: &str) -> Item {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Item {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, title.as_bytes()),
            title: title.to_string(),
            link: "https://example.com/post".to_string(),
            summary: Some("Ampersand & <tag>".to_string()),
            content: None,
            published_at: ts,
            updated_at: ts,
            tags: vec!["one".to_string()],
            source: "test".to_string(),
        }
    }

    #[test]
    fn output_is_deterministic() {
        let serializer = AtomSerializer::new().unwrap();
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let items = vec![item("First"), item("Second")];

        let a = serializer.render(&metadata(), &items, generated_at).unwrap();
        let b = serializer.render(&metadata(), &items, generated_at).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn markup_in_text_is_escaped() {
        let serializer = AtomSerializer::new().unwrap();
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();

        let rendered = serializer
            .render(&metadata(), &[item("Tricky & <title>")], generated_at)
            .unwrap();

        assert!(rendered.contains("Tricky &amp; &lt;title&gt;"));
        assert!(rendered.contains("Ampersand &amp; &lt;tag&gt;"));
    }

    #[test]
    fn urls_are_rendered_literally() {
        let serializer = AtomSerializer::new().unwrap();
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();

        let mut quoted = item("Author's 'pick'");
        quoted.link = "https://example.com/a/b?x=1&y=2".to_string();
        let rendered = serializer
            .render(&metadata(), &[quoted], generated_at)
            .unwrap();

        assert!(rendered.contains("<id>https://example.com/feeds/test</id>"));
        assert!(rendered.contains("href=\"https://example.com/a/b?x=1&amp;y=2\""));
        assert!(rendered.contains("Author&apos;s &apos;pick&apos;"));
        assert!(!rendered.contains("&#x2F;"));
        assert!(!rendered.contains("&#x27;"));
    }

    #[test]
    fn generated_at_is_isolated_on_its_own_line() {
        let serializer = AtomSerializer::new().unwrap();
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();

        let rendered = serializer
            .render(&metadata(), &[item("Only")], generated_at)
            .unwrap();

        let stamp_lines: Vec<&str> = rendered
            .lines()
            .filter(|line| line.contains("generated at"))
            .collect();
        assert_eq!(stamp_lines.len(), 1);
        assert!(stamp_lines[0].trim().starts_with("<!--"));
    }

    #[test]
    fn feed_updated_is_latest_item_update() {
        let serializer = AtomSerializer::new().unwrap();
        let generated_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut newer = item("Newer");
        newer.updated_at = Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap();
        let rendered = serializer
            .render(&metadata(), &[item("Old"), newer], generated_at)
            .unwrap();

        assert!(rendered.contains("<updated>2024-05-20T08:00:00Z</updated>"));
    }
}
