//! Re-parse state machine for one tracked page. Mutation batches schedule
//! passes behind a fixed delay; a debounce window and an attempt limit bound
//! how often a page that never settles gets re-read.

use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::parser;
use crate::session::{ExtractionSession, PassReport, SessionConfig};
use crate::settings::Settings;
use crate::utils::is_profile_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
    Sealed,
}

/// One notification from the document observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationBatch {
    pub added_nodes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Schedule(Duration),
    Ignore(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NothingAdded,
    NotAProfile,
    AlreadyValid,
    Sealed,
    Busy,
    Debounced,
    SameSubject,
}

#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub debounce: Duration,
    pub initial_delay: Duration,
    pub reparse_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(5000),
            initial_delay: Duration::from_millis(2000),
            reparse_delay: Duration::from_millis(500),
        }
    }
}

impl Timing {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            debounce: settings.debounce(),
            initial_delay: settings.initial_delay(),
            reparse_delay: settings.reparse_delay(),
        }
    }
}

/// Live registration with the mutation feed. Cancelling drops the receiver;
/// a fresh one is taken when the subject changes.
pub struct Subscription {
    rx: Option<broadcast::Receiver<MutationBatch>>,
}

impl Subscription {
    fn open(feed: &broadcast::Sender<MutationBatch>) -> Self {
        Self {
            rx: Some(feed.subscribe()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    pub fn cancel(&mut self) {
        self.rx = None;
    }

    /// Next batch, or `None` once the feed is gone. Never resolves while
    /// cancelled.
    async fn recv(&mut self) -> Option<MutationBatch> {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(batch) => Some(batch),
            Err(broadcast::error::RecvError::Lagged(missed)) => Some(MutationBatch {
                added_nodes: missed as usize,
            }),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Anything that can hand over the current page markup.
pub trait DocumentSource: Send + Sync {
    fn read(&self) -> Result<String>;
}

pub struct ReparseScheduler {
    state: SchedulerState,
    session: ExtractionSession,
    config: SessionConfig,
    timing: Timing,
    viewport_height: f32,
    feed: broadcast::Sender<MutationBatch>,
    subscription: Subscription,
}

impl ReparseScheduler {
    pub fn new(
        subject_url: &str,
        config: SessionConfig,
        timing: Timing,
        feed: broadcast::Sender<MutationBatch>,
    ) -> Self {
        Self {
            state: SchedulerState::Idle,
            session: config.open(subject_url),
            subscription: Subscription::open(&feed),
            config,
            timing,
            viewport_height: parser::document::DEFAULT_VIEWPORT_HEIGHT,
            feed,
        }
    }

    pub fn with_viewport_height(mut self, height: f32) -> Self {
        self.viewport_height = height;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn session(&self) -> &ExtractionSession {
        &self.session
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Initial pass for the current subject.
    pub fn on_start(&mut self, now: Instant) -> Decision {
        if self.state == SchedulerState::Sealed {
            return Decision::Ignore(IgnoreReason::Sealed);
        }
        if !is_profile_url(self.session.subject_url()) {
            return Decision::Ignore(IgnoreReason::NotAProfile);
        }
        self.schedule(now, self.timing.initial_delay)
    }

    pub fn on_mutation(&mut self, batch: MutationBatch, now: Instant) -> Decision {
        let reason = if self.state == SchedulerState::Sealed {
            IgnoreReason::Sealed
        } else if batch.added_nodes == 0 {
            IgnoreReason::NothingAdded
        } else if !is_profile_url(self.session.subject_url()) {
            IgnoreReason::NotAProfile
        } else if self.session.is_valid() {
            IgnoreReason::AlreadyValid
        } else if matches!(self.state, SchedulerState::Scheduled | SchedulerState::Running) {
            IgnoreReason::Busy
        } else if self.session.within_debounce(now, self.timing.debounce) {
            IgnoreReason::Debounced
        } else {
            return self.schedule(now, self.timing.reparse_delay);
        };

        debug!(?reason, added = batch.added_nodes, "Mutation ignored");
        Decision::Ignore(reason)
    }

    fn schedule(&mut self, now: Instant, delay: Duration) -> Decision {
        self.state = SchedulerState::Scheduled;
        self.session.touch(now);
        Decision::Schedule(delay)
    }

    /// Enter `Running`. Returns `false` (and seals) when the attempt limit
    /// is already spent.
    pub fn begin_run(&mut self, now: Instant) -> bool {
        if self.state != SchedulerState::Scheduled {
            return false;
        }
        if !self.session.begin_attempt(now) {
            warn!(
                url = %self.session.subject_url(),
                attempts = self.session.attempts_made() - 1,
                "Attempt limit reached, no valid profile; sealing"
            );
            self.seal();
            return false;
        }
        self.state = SchedulerState::Running;
        true
    }

    pub fn finish_run(&mut self, is_valid: bool, now: Instant) {
        self.session.touch(now);
        if is_valid {
            info!(url = %self.session.subject_url(), "Valid profile, sealing");
            self.seal();
        } else {
            self.state = SchedulerState::Idle;
        }
    }

    fn seal(&mut self) {
        self.state = SchedulerState::Sealed;
        self.subscription.cancel();
    }

    /// A different subject starts over with a fresh session and subscription.
    pub fn on_navigation(&mut self, url: &str, now: Instant) -> Decision {
        if url == self.session.subject_url() {
            return Decision::Ignore(IgnoreReason::SameSubject);
        }
        info!(from = %self.session.subject_url(), to = url, "Subject changed");
        self.session = self.config.open(url);
        self.state = SchedulerState::Idle;
        self.subscription = Subscription::open(&self.feed);
        self.on_start(now)
    }

    async fn run_pass<S: DocumentSource>(&mut self, source: &S) -> Option<PassReport> {
        if !self.begin_run(Instant::now()) {
            return None;
        }

        let primary = match source.read() {
            Ok(html) => parser::process_page(&html, self.viewport_height),
            Err(e) => {
                warn!(error = %e, "Document unavailable, pass skipped");
                self.finish_run(false, Instant::now());
                return None;
            }
        };

        let report = self.session.run_pass(primary).await;
        self.finish_run(report.is_valid, Instant::now());
        Some(report)
    }

    /// Drive the scheduler until the navigation channel closes. Reports of
    /// every completed pass go to `reports`.
    pub async fn run<S: DocumentSource>(
        mut self,
        source: S,
        mut navigation: mpsc::Receiver<String>,
        reports: mpsc::Sender<PassReport>,
    ) -> Self {
        let timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(timer);
        let mut armed = false;

        if let Decision::Schedule(delay) = self.on_start(Instant::now()) {
            timer.as_mut().reset(tokio::time::Instant::now() + delay);
            armed = true;
        }

        loop {
            let decision = tokio::select! {
                () = &mut timer, if armed => {
                    armed = false;
                    if let Some(report) = self.run_pass(&source).await {
                        if reports.send(report).await.is_err() {
                            debug!("Report receiver dropped");
                        }
                    }
                    continue;
                }
                batch = self.subscription.recv() => match batch {
                    Some(batch) => self.on_mutation(batch, Instant::now()),
                    None => {
                        self.subscription.cancel();
                        continue;
                    }
                },
                url = navigation.recv() => match url {
                    Some(url) => {
                        let decision = self.on_navigation(&url, Instant::now());
                        if decision != Decision::Ignore(IgnoreReason::SameSubject) {
                            armed = false;
                        }
                        decision
                    }
                    None => break,
                },
            };

            if let Decision::Schedule(delay) = decision {
                timer.as_mut().reset(tokio::time::Instant::now() + delay);
                armed = true;
            }
        }

        self
    }
}

// ── Tests ──
