pub mod cascade;
pub mod document;
pub mod extract;
pub mod patterns;
pub mod relevance;

use document::Snapshot;
use extract::PrimaryExtract;

/// Parse one snapshot and run every field cascade over it. The parsed
/// document is dropped before returning, so callers can hold the result
/// across await points.
pub fn process_page(html: &str, viewport_height: f32) -> PrimaryExtract {
    process_page_with_url(html, viewport_height).1
}

/// Same as [`process_page`], also returning the page's own canonical address.
pub fn process_page_with_url(html: &str, viewport_height: f32) -> (Option<String>, PrimaryExtract) {
    let doc = Snapshot::parse(html).with_viewport_height(viewport_height);
    (doc.canonical_url(), extract::extract_all(&doc))
}
