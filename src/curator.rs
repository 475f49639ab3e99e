use crate::identity;
use crate::types::{AcceptedItem, ChannelPolicy, JournalistError, RawItem, Result};
use tracing::{debug, warn};

/// Optional per-channel rewrite applied to every accepted item.
pub type TransformHook = Box<dyn Fn(AcceptedItem) -> AcceptedItem + Send + Sync>;

/// Filters and transforms raw adapter output into accepted items, assigning
/// each one its identity. Deterministic: the same raw item always yields the
/// same accepted item.
pub struct Curator {
    policy: ChannelPolicy,
    transform: Option<TransformHook>,
}

impl Curator {
    /// Validates the policy up front; a contradictory policy is fatal at
    /// startup, not per-item.
    pub fn new(policy: ChannelPolicy) -> Result<Self> {
        if policy.max_items == 0 {
            return Err(JournalistError::Curation(
                "max_items must be at least 1".to_string(),
            ));
        }
        if let Some(tag) = policy
            .required_tags
            .iter()
            .find(|tag| policy.forbidden_tags.contains(tag))
        {
            return Err(JournalistError::Curation(format!(
                "tag '{}' is both required and forbidden",
                tag
            )));
        }
        if let Some(limit) = policy.trim_content_to {
            if limit == 0 {
                return Err(JournalistError::Curation(
                    "trim_content_to must be at least 1".to_string(),
                ));
            }
        }

        Ok(Self {
            policy,
            transform: None,
        })
    }

    pub fn with_transform(mut self, transform: TransformHook) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn policy(&self) -> &ChannelPolicy {
        &self.policy
    }

    /// Run the policy over one adapter's output. Malformed items are skipped
    /// with a warning, never fatal.
    pub fn curate(&self, raw_items: Vec<RawItem>, source: &str) -> Vec<AcceptedItem> {
        let total = raw_items.len();
        let mut accepted = Vec::new();

        for raw in raw_items {
            match self.curate_one(raw, source) {
                Ok(Some(item)) => accepted.push(item),
                Ok(None) => {}
                Err(e) => warn!("{}: skipping malformed item: {}", source, e),
            }
        }

        debug!(
            "{}: accepted {}/{} items after curation",
            source,
            accepted.len(),
            total
        );
        accepted
    }

    /// Ok(None) means the item failed a policy predicate; Err means it was
    /// malformed.
    fn curate_one(&self, raw: RawItem, source: &str) -> Result<Option<AcceptedItem>> {
        if raw.title.trim().is_empty() {
            return Err(JournalistError::Parse(format!(
                "item without title ({})",
                raw.link
            )));
        }

        let id = identity::identity(&raw.key, &raw.link)?;

        if !self
            .policy
            .required_tags
            .iter()
            .all(|tag| raw.tags.contains(tag))
        {
            debug!("{}: dropping '{}' (missing required tag)", source, raw.title);
            return Ok(None);
        }
        if raw.tags.iter().any(|tag| self.policy.forbidden_tags.contains(tag)) {
            debug!("{}: dropping '{}' (forbidden tag)", source, raw.title);
            return Ok(None);
        }

        if self.policy.min_content_length > 0 {
            let body_len = raw
                .content
                .as_deref()
                .or(raw.summary.as_deref())
                .map(|text| text.chars().count())
                .unwrap_or(0);
            if body_len < self.policy.min_content_length {
                debug!("{}: dropping '{}' (body too short)", source, raw.title);
                return Ok(None);
            }
        }

        let content = match (raw.content, self.policy.trim_content_to) {
            (Some(text), Some(limit)) => Some(trim_to_chars(&text, limit)),
            (content, _) => content,
        };

        let mut item = AcceptedItem {
            id,
            title: raw.title.trim().to_string(),
            link: raw.link,
            summary: raw.summary,
            content,
            published_at: raw.published_at,
            tags: raw.tags,
            source: source.to_string(),
        };

        if let Some(transform) = &self.transform {
            item = transform(item);
        }

        Ok(Some(item))
    }
}

/// Truncate at a character boundary, preferring the last whitespace before
/// the limit.
fn trim_to_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let truncated: String = text.chars().take(limit).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => format!("{}…", truncated[..pos].trim_end()),
        _ => format!("{}…", truncated),
    }
}
