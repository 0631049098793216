//! One extraction session per subject: absorbs primary passes, backfills
//! from the secondary source when the page falls short, and tracks the
//! attempt and validity state the scheduler gates on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::collaborator::{Action, Collaborator, CollaboratorRequest, ScoreCard};
use crate::parser::cascade::Field;
use crate::parser::extract::PrimaryExtract;
use crate::profile::{
    about_is_usable, clean, EducationCandidate, EducationEntry, ExperienceCandidate,
    ExperienceEntry, ProfileDraft, MAX_EDUCATION, MAX_EXPERIENCE, MAX_SKILLS,
};
use crate::secondary::{self, SecondarySource, StructuredProfile};
use crate::utils::subject_id_from_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Empty,
    PrimaryExtracted,
    SecondaryConsulted,
    Merged,
    Scored,
}

/// Fetched results, including "nothing", are kept for the whole session.
#[derive(Debug, Clone)]
enum SecondaryCache {
    Unfetched,
    Fetched(Option<StructuredProfile>),
}

/// Outcome of one pass, carrying a full copy of the merged draft.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub draft: ProfileDraft,
    pub attempt: u32,
    pub is_valid: bool,
    pub consulted_secondary: bool,
    pub backfilled: Vec<Field>,
    pub score: Option<Result<ScoreCard, String>>,
}

/// Extraction passes allowed per tracked subject.
pub const DEFAULT_ATTEMPT_LIMIT: u32 = 3;

/// What every session for a tracked page is opened with.
#[derive(Clone)]
pub struct SessionConfig {
    pub attempt_limit: u32,
    pub source: Option<Arc<dyn SecondarySource>>,
    pub collaborator: Option<Arc<dyn Collaborator>>,
    pub user_name: Option<String>,
    pub objective: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
            source: None,
            collaborator: None,
            user_name: None,
            objective: None,
        }
    }
}

impl SessionConfig {
    pub fn open(&self, subject_url: &str) -> ExtractionSession {
        ExtractionSession::new(subject_url, self.attempt_limit)
            .with_source(self.source.clone())
            .with_collaborator(self.collaborator.clone())
            .with_sender(self.user_name.clone(), self.objective.clone())
    }
}

pub struct ExtractionSession {
    subject_url: String,
    subject_id: Option<String>,
    draft: ProfileDraft,
    stage: Stage,
    attempts_made: u32,
    attempt_limit: u32,
    last_attempt: Option<Instant>,
    is_valid: bool,
    cache: SecondaryCache,
    source: Option<Arc<dyn SecondarySource>>,
    collaborator: Option<Arc<dyn Collaborator>>,
    sender: (Option<String>, Option<String>),
}

impl ExtractionSession {
    pub fn new(subject_url: &str, attempt_limit: u32) -> Self {
        Self {
            subject_url: subject_url.to_string(),
            subject_id: subject_id_from_url(subject_url),
            draft: ProfileDraft::new(subject_url),
            stage: Stage::Empty,
            attempts_made: 0,
            attempt_limit,
            last_attempt: None,
            is_valid: false,
            cache: SecondaryCache::Unfetched,
            source: None,
            collaborator: None,
            sender: (None, None),
        }
    }

    pub fn with_source(mut self, source: Option<Arc<dyn SecondarySource>>) -> Self {
        self.source = source;
        self
    }

    pub fn with_collaborator(mut self, collaborator: Option<Arc<dyn Collaborator>>) -> Self {
        self.collaborator = collaborator;
        self
    }

    /// Display name and objective forwarded with collaborator requests.
    pub fn with_sender(mut self, user_name: Option<String>, objective: Option<String>) -> Self {
        self.sender = (user_name, objective);
        self
    }

    pub fn subject_url(&self) -> &str {
        &self.subject_url
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Count a new attempt. Returns `false` once the attempt limit is spent.
    pub fn begin_attempt(&mut self, now: Instant) -> bool {
        self.attempts_made += 1;
        self.last_attempt = Some(now);
        self.attempts_made <= self.attempt_limit
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    /// Whether the last attempt happened less than `window` before `now`.
    pub fn within_debounce(&self, now: Instant, window: Duration) -> bool {
        self.last_attempt
            .is_some_and(|last| now.saturating_duration_since(last) < window)
    }

    pub async fn run_pass(&mut self, primary: PrimaryExtract) -> PassReport {
        self.stage = Stage::Empty;
        self.absorb(primary);
        self.stage = Stage::PrimaryExtracted;

        let gaps = self.gaps();
        let mut consulted = false;
        let mut backfilled = Vec::new();

        if !gaps.is_empty() {
            if let Some(structured) = self.consult_secondary().await {
                consulted = true;
                backfilled = self.backfill(&structured, &gaps);
            }
        } else {
            debug!(url = %self.subject_url, "Primary extraction complete, secondary skipped");
        }

        self.enforce_caps();
        self.stage = Stage::Merged;
        self.is_valid = self.is_valid || self.draft.is_valid();

        info!(
            url = %self.subject_url,
            attempt = self.attempts_made,
            valid = self.is_valid,
            experience = self.draft.experience.len(),
            education = self.draft.education.len(),
            skills = self.draft.skills.len(),
            backfilled = ?backfilled,
            "Pass merged"
        );

        let draft = self.draft.clone();
        let score = self.score(&draft).await;

        PassReport {
            draft,
            attempt: self.attempts_made,
            is_valid: self.is_valid,
            consulted_secondary: consulted,
            backfilled,
            score,
        }
    }

    /// Take every value the page produced. Values the page did not produce
    /// leave the draft as it was, and a usable biography is never replaced
    /// by a worse one.
    fn absorb(&mut self, primary: PrimaryExtract) {
        let d = &mut self.draft;
        for (slot, value) in [
            (&mut d.name, primary.name),
            (&mut d.headline, primary.headline),
            (&mut d.location, primary.location),
            (&mut d.company, primary.company),
        ] {
            if let Some(v) = clean(value) {
                *slot = Some(v);
            }
        }

        if let Some(about) = clean(primary.about) {
            if !d.about_is_sufficient() || about_is_usable(&about) {
                d.about = Some(about);
            }
        }

        let experience = finish_experience(primary.experience);
        if !experience.is_empty() {
            d.experience = experience;
        }
        let education = finish_education(primary.education);
        if !education.is_empty() {
            d.education = education;
        }
        if !primary.skills.is_empty() {
            d.skills = primary.skills;
        }
    }

    fn gaps(&self) -> Vec<Field> {
        let mut gaps = Vec::new();
        if !self.draft.about_is_sufficient() {
            gaps.push(Field::About);
        }
        if self.draft.experience.is_empty() {
            gaps.push(Field::Experience);
        }
        if self.draft.education.is_empty() {
            gaps.push(Field::Education);
        }
        gaps
    }

    async fn consult_secondary(&mut self) -> Option<StructuredProfile> {
        let source = self.source.clone()?;
        let subject_id = self.subject_id.clone()?;

        if let SecondaryCache::Unfetched = self.cache {
            let fetched = source.fetch(&subject_id).await;
            self.cache = SecondaryCache::Fetched(fetched);
        }
        self.stage = Stage::SecondaryConsulted;

        match &self.cache {
            SecondaryCache::Fetched(found) => found.clone(),
            SecondaryCache::Unfetched => None,
        }
    }

    fn backfill(&mut self, structured: &StructuredProfile, gaps: &[Field]) -> Vec<Field> {
        let mut filled = Vec::new();
        for &field in gaps {
            let changed = match field {
                Field::About => match secondary::extract_about(structured) {
                    Some(about) => {
                        self.draft.about = Some(about);
                        true
                    }
                    None => false,
                },
                Field::Experience => {
                    self.draft.experience =
                        finish_experience(secondary::extract_experience(structured));
                    !self.draft.experience.is_empty()
                }
                Field::Education => {
                    self.draft.education =
                        finish_education(secondary::extract_education(structured));
                    !self.draft.education.is_empty()
                }
                _ => false,
            };
            if changed {
                filled.push(field);
            }
        }
        filled
    }

    fn enforce_caps(&mut self) {
        self.draft.experience.truncate(MAX_EXPERIENCE);
        self.draft.education.truncate(MAX_EDUCATION);
        self.draft.skills.truncate(MAX_SKILLS);
    }

    async fn score(&mut self, draft: &ProfileDraft) -> Option<Result<ScoreCard, String>> {
        let collaborator = self.collaborator.clone()?;
        let (user_name, objective) = self.sender.clone();
        let request = CollaboratorRequest::new(Action::ScoreProfile, draft.clone())
            .with_sender(user_name, objective);

        let outcome = collaborator
            .score_profile(request)
            .await
            .map_err(|e| e.to_string());
        self.stage = Stage::Scored;
        Some(outcome)
    }
}

fn finish_experience(candidates: Vec<ExperienceCandidate>) -> Vec<ExperienceEntry> {
    candidates
        .into_iter()
        .filter_map(ExperienceCandidate::finish)
        .take(MAX_EXPERIENCE)
        .collect()
}

fn finish_education(candidates: Vec<EducationCandidate>) -> Vec<EducationEntry> {
    candidates
        .into_iter()
        .filter_map(EducationCandidate::finish)
        .take(MAX_EDUCATION)
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::collaborator::RawResponse;
    use crate::error::CollaboratorError;
    use crate::profile::{COMPANY_SENTINEL, MIN_ABOUT_CHARS};
    use crate::secondary::parse_payload;

    const URL: &str = "https://www.linkedin.com/in/jane-doe/";

    struct StubSource {
        payload: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(payload: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                payload,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SecondarySource for StubSource {
        async fn fetch(&self, _subject_id: &str) -> Option<StructuredProfile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload.and_then(|p| parse_payload(p).ok())
        }
    }

    struct FixedScore;

    #[async_trait]
    impl Collaborator for FixedScore {
        async fn send(&self, request: &CollaboratorRequest) -> Result<RawResponse, CollaboratorError> {
            assert_eq!(request.action, Action::ScoreProfile);
            Ok(RawResponse {
                success: true,
                message: Some("```json\n{\"score\": 77, \"reasons\": [\"Relevant role\"]}\n```".into()),
                ..Default::default()
            })
        }
    }

    const SECONDARY: &str = r#"{
        "summary": "Engineer with a decade of experience in distributed systems.",
        "positionView": {"elements": [
            {"title": "Engineer", "companyName": "Acme",
             "timePeriod": {"startDate": {"month": 3, "year": 2019}}}
        ]}
    }"#;

    fn session(source: &Arc<StubSource>) -> ExtractionSession {
        let source: Arc<dyn SecondarySource> = source.clone();
        ExtractionSession::new(URL, 3).with_source(Some(source))
    }

    fn fixture(name: &str) -> PrimaryExtract {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        crate::parser::process_page(&html, 900.0)
    }

    #[tokio::test]
    async fn complete_page_needs_no_secondary() {
        let stub = StubSource::new(Some(SECONDARY));
        let mut s = session(&stub);
        let report = s.run_pass(fixture("profile_full")).await;

        assert_eq!(stub.calls(), 0);
        assert!(!report.consulted_secondary);
        assert!(report.is_valid);
        assert_eq!(
            report.draft.about.as_deref(),
            Some("Hey there, i am a product manager at Initech.")
        );
        assert!(!crate::parser::relevance::is_noise(report.draft.about.as_deref().unwrap()));
        assert_eq!(s.stage(), Stage::Merged);
    }

    #[tokio::test]
    async fn sparse_page_is_backfilled() {
        let stub = StubSource::new(Some(SECONDARY));
        let mut s = session(&stub);
        let report = s.run_pass(fixture("profile_sparse")).await;

        assert_eq!(stub.calls(), 1);
        assert_eq!(
            report.draft.about.as_deref(),
            Some("Engineer with a decade of experience in distributed systems.")
        );
        assert_eq!(report.draft.experience.len(), 1);
        assert_eq!(report.draft.experience[0].duration, "Mar 2019 – Present");
        assert_eq!(report.draft.experience[0].company, "Acme");
        assert!(report.draft.education.is_empty());
        assert_eq!(report.backfilled, vec![Field::About, Field::Experience]);
        assert_eq!(report.draft.name.as_deref(), Some("Sam Rivera"));
    }

    #[tokio::test]
    async fn primary_experience_is_never_replaced() {
        let stub = StubSource::new(Some(SECONDARY));
        let mut s = session(&stub);
        let primary = PrimaryExtract {
            experience: vec![ExperienceCandidate {
                title: "Founder".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let report = s.run_pass(primary).await;

        assert_eq!(stub.calls(), 1);
        assert_eq!(report.draft.experience.len(), 1);
        assert_eq!(report.draft.experience[0].title, "Founder");
        assert_eq!(report.draft.experience[0].company, COMPANY_SENTINEL);
        assert!(!report.backfilled.contains(&Field::Experience));
    }

    #[tokio::test]
    async fn secondary_result_is_cached_even_when_absent() {
        let stub = StubSource::new(None);
        let mut s = session(&stub);
        s.run_pass(PrimaryExtract::default()).await;
        s.run_pass(PrimaryExtract::default()).await;
        assert_eq!(stub.calls(), 1);
        assert!(!s.is_valid());
    }

    #[tokio::test]
    async fn later_pass_keeps_earlier_values() {
        let stub = StubSource::new(None);
        let mut s = session(&stub);
        s.run_pass(fixture("profile_full")).await;
        let report = s
            .run_pass(PrimaryExtract {
                headline: Some("  ".into()),
                about: Some("Short".into()),
                ..Default::default()
            })
            .await;

        assert_eq!(report.draft.name.as_deref(), Some("Jane Doe"));
        assert!(report.draft.about.as_deref().unwrap().chars().count() >= MIN_ABOUT_CHARS);
        assert_eq!(report.draft.experience.len(), 2);
        assert!(report.is_valid);
    }

    #[tokio::test]
    async fn entries_are_capped() {
        let mut s = ExtractionSession::new(URL, 3);
        let primary = PrimaryExtract {
            experience: (0..6)
                .map(|i| ExperienceCandidate {
                    title: format!("Role {}", i),
                    ..Default::default()
                })
                .collect(),
            education: (0..4)
                .map(|i| EducationCandidate {
                    school: format!("School {}", i),
                    ..Default::default()
                })
                .collect(),
            skills: (0..15).map(|i| format!("Skill {}", i)).collect(),
            ..Default::default()
        };
        let report = s.run_pass(primary).await;
        assert_eq!(report.draft.experience.len(), MAX_EXPERIENCE);
        assert_eq!(report.draft.education.len(), MAX_EDUCATION);
        assert_eq!(report.draft.skills.len(), MAX_SKILLS);
        assert!(!report.consulted_secondary);
    }

    #[test]
    fn default_config_allows_three_attempts() {
        let mut s = SessionConfig::default().open(URL);
        let now = std::time::Instant::now();
        assert!((0..DEFAULT_ATTEMPT_LIMIT).all(|_| s.begin_attempt(now)));
        assert!(!s.begin_attempt(now));
        assert_eq!(s.attempts_made(), 4);
    }

    #[tokio::test]
    async fn collaborator_scores_merged_draft() {
        let collaborator: Arc<dyn Collaborator> = Arc::new(FixedScore);
        let config = SessionConfig {
            attempt_limit: 3,
            collaborator: Some(collaborator),
            user_name: Some("Pat".into()),
            ..Default::default()
        };
        let mut s = config.open(URL);
        let report = s.run_pass(fixture("profile_full")).await;
        let card = report.score.unwrap().unwrap();
        assert_eq!(card.score, 77);
        assert_eq!(s.stage(), Stage::Scored);
    }

    #[test]
    fn attempts_and_debounce() {
        let t0 = Instant::now();
        let mut s = ExtractionSession::new(URL, 2);
        assert!(!s.within_debounce(t0, Duration::from_secs(5)));
        assert!(s.begin_attempt(t0));
        assert!(s.within_debounce(t0 + Duration::from_secs(4), Duration::from_secs(5)));
        assert!(!s.within_debounce(t0 + Duration::from_secs(5), Duration::from_secs(5)));
        assert!(s.begin_attempt(t0 + Duration::from_secs(6)));
        assert!(!s.begin_attempt(t0 + Duration::from_secs(12)));
        assert_eq!(s.attempts_made(), 3);
    }
}
