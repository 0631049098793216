use crate::parser::cascade::{resolve_text, Field};
use crate::parser::document::Snapshot;

/// Biography text, or `None` when every strategy including the leaf scan
/// came up empty.
pub fn extract(doc: &Snapshot) -> Option<String> {
    resolve_text(doc, Field::About).map(|hit| hit.text)
}
