use std::sync::LazyLock;

use regex::Regex;

static PROFILE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?://[^/]+)?/in/([^/?#]+)").unwrap());

/// Public identifier from a profile address: `/in/<id>/...` → `<id>`.
pub fn subject_id_from_url(url: &str) -> Option<String> {
    PROFILE_PATH_RE
        .captures(url.trim())
        .map(|c| c[1].to_string())
        .filter(|id| !id.is_empty())
}

/// Profile pages, excluding the owner's edit views.
pub fn is_profile_url(url: &str) -> bool {
    subject_id_from_url(url).is_some() && !url.contains("/edit")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
