//! Polls a page file that a capture tool keeps rewriting and turns changes
//! into mutation batches and navigation events.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::parser::document::Snapshot;
use crate::scheduler::{DocumentSource, MutationBatch};

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DocumentSource for FileSource {
    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageShape {
    pub element_count: usize,
    pub canonical_url: Option<String>,
}

pub fn observe(html: &str) -> PageShape {
    let doc = Snapshot::parse(html);
    PageShape {
        element_count: doc.element_count(),
        canonical_url: doc.canonical_url(),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Change {
    pub mutation: Option<MutationBatch>,
    pub navigated_to: Option<String>,
}

pub struct FileWatcher {
    source: FileSource,
    interval: Duration,
    last: Option<PageShape>,
}

impl FileWatcher {
    pub fn new(path: impl AsRef<Path>, interval: Duration) -> Self {
        Self {
            source: FileSource::new(path),
            interval,
            last: None,
        }
    }

    /// Compare against the previous observation. The first observation only
    /// sets the baseline.
    pub fn diff(&mut self, shape: PageShape) -> Change {
        let Some(prev) = self.last.replace(shape.clone()) else {
            return Change::default();
        };

        let mutation = shape
            .element_count
            .checked_sub(prev.element_count)
            .filter(|&n| n > 0)
            .map(|added_nodes| MutationBatch { added_nodes });

        let navigated_to = match (&prev.canonical_url, &shape.canonical_url) {
            (Some(old), Some(new)) if old != new => Some(new.clone()),
            (None, Some(new)) => Some(new.clone()),
            _ => None,
        };

        Change {
            mutation,
            navigated_to,
        }
    }

    /// Poll until the navigation receiver goes away.
    pub async fn run(mut self, feed: broadcast::Sender<MutationBatch>, navigation: mpsc::Sender<String>) {
        info!(path = %self.source.path.display(), interval = ?self.interval, "Watching page file");
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            ticker.tick().await;
            if navigation.is_closed() {
                break;
            }

            let html = match self.source.read() {
                Ok(html) => html,
                Err(e) => {
                    warn!(error = %e, "Page file unreadable");
                    continue;
                }
            };
            let change = self.diff(observe(&html));

            if let Some(url) = change.navigated_to {
                if navigation.send(url).await.is_err() {
                    break;
                }
            }
            if let Some(batch) = change.mutation {
                if feed.send(batch).is_err() {
                    debug!(added = batch.added_nodes, "No active subscription for mutation");
                }
            }
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, paragraphs: usize) -> String {
        format!(
            r#"<html><head><link rel="canonical" href="{}"></head><body>{}</body></html>"#,
            url,
            "<p>text</p>".repeat(paragraphs)
        )
    }

    fn replace(path: &Path, html: String) {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, html).unwrap();
        std::fs::rename(&tmp, path).unwrap();
    }

    const A: &str = "https://www.linkedin.com/in/a/";
    const B: &str = "https://www.linkedin.com/in/b/";

    #[test]
    fn first_observation_is_baseline() {
        let mut w = FileWatcher::new("unused", Duration::from_millis(10));
        assert_eq!(w.diff(observe(&page(A, 2))), Change::default());
    }

    #[test]
    fn growth_and_navigation() {
        let mut w = FileWatcher::new("unused", Duration::from_millis(10));
        w.diff(observe(&page(A, 2)));

        let grown = w.diff(observe(&page(A, 5)));
        assert_eq!(grown.mutation, Some(MutationBatch { added_nodes: 3 }));
        assert_eq!(grown.navigated_to, None);

        let shrunk = w.diff(observe(&page(A, 1)));
        assert_eq!(shrunk, Change::default());

        let moved = w.diff(observe(&page(B, 1)));
        assert_eq!(moved.navigated_to.as_deref(), Some(B));
        assert_eq!(moved.mutation, None);
    }

    #[tokio::test]
    async fn polling_emits_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        replace(&path, page(A, 1));

        let (feed, mut mutations) = broadcast::channel(8);
        let (nav_tx, mut nav_rx) = mpsc::channel(8);
        let watcher = FileWatcher::new(&path, Duration::from_millis(10));
        let task = tokio::spawn(watcher.run(feed, nav_tx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        replace(&path, page(A, 4));
        let batch = tokio::time::timeout(Duration::from_secs(2), mutations.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.added_nodes, 3);

        replace(&path, page(B, 4));
        let url = tokio::time::timeout(Duration::from_secs(2), nav_rx.recv())
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some(B));

        drop(nav_rx);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn file_source_reports_missing_file() {
        let err = FileSource::new("/nonexistent/page.html").read().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/page.html"));
    }
}
