//! Resource identifier helpers.
//!
//! Every lookup in the crate keys on [`normalize`]d identifiers. The other
//! helpers pull identifiers out of arbitrary property blobs and derive related
//! identifiers (parents, owning resources, diagram aliases).
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const SUBSCRIPTIONS_ROOT: &str = "/subscriptions/";
const PROVIDERS_MARKER: &str = "/providers/";
const SLUG_MAX_LEN: usize = 60;

/// Lowercase and trim an identifier.
#[must_use]
pub fn normalize(id: &str) -> String {
    id.trim().to_lowercase()
}

/// True when `s` looks like a fully-qualified resource identifier.
#[must_use]
pub fn is_arm_id(s: &str) -> bool {
    let n = normalize(s);
    n.starts_with(SUBSCRIPTIONS_ROOT) && n.contains(PROVIDERS_MARKER)
}

/// Collect every identifier-looking string found anywhere inside `value`.
///
/// Returned identifiers are normalized. Non-string scalars and strings that do
/// not match the identifier shape are ignored.
#[must_use]
pub fn extract_references(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_references(value, &mut found);
    found
}

fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if is_arm_id(s) {
                out.insert(normalize(s));
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Return `id` truncated right before `/{segment}/`.
///
/// The match ignores case but the returned prefix keeps the input's casing.
/// When the segment does not occur, `id` is returned unchanged.
#[must_use]
pub fn derive_parent(id: &str, segment: &str) -> String {
    let marker = format!("/{}/", segment.to_ascii_lowercase());
    // ASCII lowercasing keeps byte offsets aligned with `id`
    match id.to_ascii_lowercase().find(&marker) {
        Some(idx) => id[..idx].to_string(),
        None => id.to_string(),
    }
}

/// Drop the last `n` path segments of `id`.
///
/// `.../networkInterfaces/nic1/ipConfigurations/ipconfig1` with `n = 2`
/// yields `.../networkInterfaces/nic1`. Returns `None` when nothing would
/// remain.
#[must_use]
pub fn strip_child(id: &str, n: usize) -> Option<String> {
    let parts: Vec<&str> = id.trim_end_matches('/').split('/').collect();
    if parts.len() <= n {
        return None;
    }
    let owner = parts[..parts.len() - n].join("/");
    if owner.is_empty() {
        None
    } else {
        Some(owner)
    }
}

/// Final path segment of an identifier.
#[must_use]
pub fn last_segment(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]").unwrap())
}

/// Rendering-safe alias for an identifier: `[a-z0-9_]`, at most 60 chars.
///
/// Long identifiers sharing a 60 character prefix collapse onto the same
/// alias; diagram consumers tolerate that.
#[must_use]
pub fn slugify(id: &str) -> String {
    let lowered = id.to_lowercase();
    let replaced = slug_pattern().replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches('_');
    // only ASCII remains, so byte truncation is char-safe
    trimmed[..trimmed.len().min(SLUG_MAX_LEN)].trim_end_matches('_').to_string()
}
