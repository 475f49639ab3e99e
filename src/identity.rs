//! Identity rule shared by the curator (intra-channel) and the merge engine
//! (inter-feed). Two items are the same logical item iff their identities
//! match.

use crate::types::{RawKey, Result};
use url::Url;
use uuid::Uuid;

/// Query parameters stripped during link canonicalization, on top of the
/// `utm_` prefix family.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "igshid", "mc_cid", "mc_eid", "ref_src"];

/// Canonicalize a link for identity purposes: lowercase scheme and host
/// (the URL parser already does this), drop tracking query parameters, and
/// strip a trailing slash from the path.
pub fn canonicalize_link(link: &str) -> Result<String> {
    let mut url = Url::parse(link)?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        url.set_query(Some(&query));
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    Ok(url.to_string())
}

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

/// Derive the stable identity for an item: the natural key when the source
/// provides one, otherwise a hash of the canonicalized link. Deterministic
/// across runs and across merges.
pub fn identity(key: &RawKey, link: &str) -> Result<Uuid> {
    match key {
        RawKey::Natural(natural) => Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, natural.as_bytes())),
        RawKey::Link => {
            let canonical = canonicalize_link(link)?;
            Ok(Uuid::new_v5(&Uuid::NAMESPACE_URL, canonical.as_bytes()))
        }
    }
}

/// Identity for an item drawn from an arbitrary Atom document during merge:
/// always link-based, since foreign guids are not comparable across feeds.
pub fn link_identity(link: &str) -> Result<Uuid> {
    identity(&RawKey::Link, link)
}

/// Content fingerprint used for change detection during reconciliation.
pub fn content_fingerprint(title: &str, summary: Option<&str>, content: Option<&str>) -> Uuid {
    let material = format!(
        "{}\n{}\n{}",
        title,
        summary.unwrap_or(""),
        content.unwrap_or("")
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes())
}
