//! Declarative per-field selector cascades and the runner that evaluates them.
//!
//! Each field owns an ordered list of rules. A rule pairs a strategy (where to
//! look) with an acceptance test (what counts as a hit). The runner walks the
//! list in order and stops at the first accepted candidate, so earlier rules
//! always win over later, possibly more specific, ones.

use tracing::{debug, info};

use super::document::{Scope, Snapshot};
use super::patterns::{is_duration, is_entity_text, is_year};
use super::relevance::{bio_score, is_noise, BIO_THRESHOLD};
use crate::profile::MIN_ABOUT_CHARS;

pub const BIO_LEAF_SELECTOR: &str = r#"span[aria-hidden="true"]"#;
pub const BIO_TOP_MARGIN: f32 = 200.0;
pub const BIO_BOTTOM_MARGIN: f32 = 200.0;
pub const BIO_MIN_CHARS: usize = 50;
pub const BIO_MAX_CHARS: usize = 1000;

/// Free-text sub-values shorter than this are not descriptions.
pub const DESCRIPTION_MIN_CHARS: usize = 51;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Headline,
    Location,
    Company,
    About,
    Experience,
    Education,
    Skills,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Name,
        Field::Headline,
        Field::Location,
        Field::Company,
        Field::About,
        Field::Experience,
        Field::Education,
        Field::Skills,
    ];

    /// Candidate nodes consumed from a single strategy, applied before filtering.
    pub fn candidate_cap(self) -> usize {
        match self {
            Field::Experience => 5,
            Field::Education => 3,
            Field::Skills => 10,
            _ => 1,
        }
    }

    pub fn is_repeated(self) -> bool {
        matches!(self, Field::Experience | Field::Education | Field::Skills)
    }

    /// Markers identifying the page section that belongs to this field.
    fn section_markers(self) -> &'static [&'static str] {
        match self {
            Field::About => &["#about", r#"[data-section="summary"]"#, ".pv-about-section"],
            Field::Experience => &[
                "#experience",
                r#"[data-section="experience"]"#,
                ".experience-section",
            ],
            Field::Education => &[
                "#education",
                r#"[data-section="education"]"#,
                ".education-section",
            ],
            Field::Skills => &["#skills", r#"[data-section="skills"]"#],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// Document-wide selector.
    Select(&'static str),
    /// Locate `anchor`, widen to its enclosing section, then query inside.
    Within {
        anchor: &'static str,
        inner: &'static str,
    },
    /// Score every aria-hidden leaf as a potential biography. About only.
    BioScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    NonEmpty,
    /// Not noise, at least `min_chars` long.
    FreeText { min_chars: usize },
    /// Names, titles, degrees: nothing date- or place-shaped.
    Entity,
    Duration,
    Year,
    /// Long prose that is neither noise nor a date.
    Description,
}

impl Accept {
    pub fn admits(self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        match self {
            Accept::NonEmpty => true,
            Accept::FreeText { min_chars } => {
                text.chars().count() >= min_chars && !is_noise(text)
            }
            Accept::Entity => is_entity_text(text),
            Accept::Duration => is_duration(text),
            Accept::Year => is_year(text),
            Accept::Description => {
                text.chars().count() >= DESCRIPTION_MIN_CHARS
                    && !is_noise(text)
                    && !is_duration(text)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub strategy: Strategy,
    pub accept: Accept,
}

const fn select(css: &'static str, accept: Accept) -> Rule {
    Rule {
        strategy: Strategy::Select(css),
        accept,
    }
}

const fn within(anchor: &'static str, inner: &'static str, accept: Accept) -> Rule {
    Rule {
        strategy: Strategy::Within { anchor, inner },
        accept,
    }
}

const ABOUT_TEXT: Accept = Accept::FreeText {
    min_chars: MIN_ABOUT_CHARS,
};
const LABEL_TEXT: Accept = Accept::FreeText { min_chars: 1 };

static NAME_RULES: &[Rule] = &[
    select("h1.text-heading-xlarge", LABEL_TEXT),
    select("h1.pv-top-card-section__name", LABEL_TEXT),
    select(".pv-text-details__left-panel h1", LABEL_TEXT),
    select(".ph5 h1", LABEL_TEXT),
];

static HEADLINE_RULES: &[Rule] = &[
    select(".text-body-medium.break-words", LABEL_TEXT),
    select(".pv-top-card-section__headline", LABEL_TEXT),
    select(".pv-text-details__left-panel .text-body-medium", LABEL_TEXT),
];

static LOCATION_RULES: &[Rule] = &[
    select(".text-body-small.inline.t-black--light.break-words", Accept::NonEmpty),
    select(".pv-top-card--list-bullet .t-black--light", Accept::NonEmpty),
];

static COMPANY_RULES: &[Rule] = &[
    select(
        r#".inline-show-more-text .mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        Accept::NonEmpty,
    ),
    select(
        r#".pv-text-details__right-panel .inline-show-more-text"#,
        Accept::NonEmpty,
    ),
];

static ABOUT_RULES: &[Rule] = &[
    select(".pv-shared-text-with-see-more .full-text", ABOUT_TEXT),
    select(
        r#".pv-shared-text-with-see-more .inline-show-more-text span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    select(".pv-shared-text-with-see-more .visually-hidden", ABOUT_TEXT),
    select("#about ~ .pvs-list__container .full-text", ABOUT_TEXT),
    select(
        r#"#about ~ .pvs-list__container .inline-show-more-text span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    select(
        r#"#about ~ .pvs-list__container .break-words span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    select(
        ".pv-about-section .pv-about__summary-text .lt-line-clamp__raw-line",
        ABOUT_TEXT,
    ),
    select(
        r#".pv-about-section .inline-show-more-text span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    select(
        r#"[data-field="summary_expanded"] .inline-show-more-text span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    select(r#"[data-field="summary_expanded"] .full-text"#, ABOUT_TEXT),
    select(
        r#"section[data-section="summary"] .inline-show-more-text span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    select(r#"section[data-section="summary"] .full-text"#, ABOUT_TEXT),
    select(
        r#".pvs-list__outer-container .break-words span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    within(
        "#about",
        r#".inline-show-more-text span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    within("#about", ".full-text", ABOUT_TEXT),
    within("#about", ".pv-shared-text-with-see-more", ABOUT_TEXT),
    within("#about", ".lt-line-clamp__raw-line", ABOUT_TEXT),
    within("#about", r#".break-words span[aria-hidden="true"]"#, ABOUT_TEXT),
    within(
        "#about",
        r#".pvs-list__outer-container span[aria-hidden="true"]"#,
        ABOUT_TEXT,
    ),
    Rule {
        strategy: Strategy::BioScan,
        accept: ABOUT_TEXT,
    },
];

static EXPERIENCE_RULES: &[Rule] = &[
    select("#experience ~ .pvs-list__paged-list-item", Accept::NonEmpty),
    select("#experience ~ .pvs-list .pvs-list__paged-list-item", Accept::NonEmpty),
    select(
        "#experience ~ .pvs-list__outer-container .pvs-list__paged-list-item",
        Accept::NonEmpty,
    ),
    select(
        r#"section[data-section="experience"] .pvs-list__paged-list-item"#,
        Accept::NonEmpty,
    ),
    select(".experience-section .pvs-list__paged-list-item", Accept::NonEmpty),
    select(".experience-section .pv-entity__position-group-pager", Accept::NonEmpty),
    within("#experience", ".pvs-list__paged-list-item", Accept::NonEmpty),
];

static EDUCATION_RULES: &[Rule] = &[
    select("#education ~ .pvs-list__paged-list-item", Accept::NonEmpty),
    select("#education ~ .pvs-list .pvs-list__paged-list-item", Accept::NonEmpty),
    select(
        "#education ~ .pvs-list__outer-container .pvs-list__paged-list-item",
        Accept::NonEmpty,
    ),
    select(
        r#"section[data-section="education"] .pvs-list__paged-list-item"#,
        Accept::NonEmpty,
    ),
    select(".education-section .pvs-list__paged-list-item", Accept::NonEmpty),
    select(".education-section .pv-education-entity", Accept::NonEmpty),
    within("#education", ".pvs-list__paged-list-item", Accept::NonEmpty),
];

static SKILLS_RULES: &[Rule] = &[
    select(
        r#"#skills ~ .pvs-list .mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        Accept::NonEmpty,
    ),
    select(
        r#"#skills ~ .pvs-list__outer-container .mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        Accept::NonEmpty,
    ),
    within(
        "#skills",
        r#".hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        Accept::NonEmpty,
    ),
    select(".pv-skill-category-entity__name-text", Accept::NonEmpty),
];

pub fn rules(field: Field) -> &'static [Rule] {
    match field {
        Field::Name => NAME_RULES,
        Field::Headline => HEADLINE_RULES,
        Field::Location => LOCATION_RULES,
        Field::Company => COMPANY_RULES,
        Field::About => ABOUT_RULES,
        Field::Experience => EXPERIENCE_RULES,
        Field::Education => EDUCATION_RULES,
        Field::Skills => SKILLS_RULES,
    }
}

impl Strategy {
    fn candidates<'a>(&self, doc: &'a Snapshot, limit: usize) -> Vec<Scope<'a>> {
        match *self {
            Strategy::Select(css) => doc.root().all(css).into_iter().take(limit).collect(),
            Strategy::Within { anchor, inner } => {
                let Some(found) = doc.root().first(anchor) else {
                    return Vec::new();
                };
                let container = found
                    .closest("section")
                    .or_else(|| found.parent())
                    .unwrap_or(found);
                container.all(inner).into_iter().take(limit).collect()
            }
            Strategy::BioScan => bio_scan(doc).into_iter().collect(),
        }
    }
}

/// A single-valued field hit and the index of the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub text: String,
    pub rule: usize,
}

/// Resolve a single-valued field. `None` means every rule was exhausted.
pub fn resolve_text(doc: &Snapshot, field: Field) -> Option<Resolved> {
    resolve_text_with(doc, field, rules(field))
}

pub fn resolve_text_with(doc: &Snapshot, field: Field, table: &[Rule]) -> Option<Resolved> {
    for (idx, rule) in table.iter().enumerate() {
        for candidate in rule.strategy.candidates(doc, 1) {
            let text = candidate.text();
            if rule.accept.admits(&text) && !is_foreign(candidate, field) {
                info!(?field, rule = idx, strategy = ?rule.strategy, "Field resolved");
                return Some(Resolved { text, rule: idx });
            }
        }
    }
    debug!(?field, "Selector cascade exhausted");
    None
}

/// Resolve a repeated field to its entry nodes: the first rule producing at
/// least one accepted node wins. Candidates are capped before filtering.
pub fn resolve_nodes(doc: &Snapshot, field: Field) -> Vec<Scope<'_>> {
    for (idx, rule) in rules(field).iter().enumerate() {
        let nodes: Vec<Scope<'_>> = rule
            .strategy
            .candidates(doc, field.candidate_cap())
            .into_iter()
            .filter(|n| rule.accept.admits(&n.text()) && !is_foreign(*n, field))
            .collect();
        if !nodes.is_empty() {
            info!(?field, rule = idx, count = nodes.len(), "Entries found");
            return nodes;
        }
    }
    debug!(?field, "Selector cascade exhausted");
    Vec::new()
}

/// First accepted sub-value inside one entry, trying selectors in order and
/// every match of each selector.
pub fn pick_within(entry: Scope<'_>, selectors: &[&str], accept: Accept) -> Option<String> {
    selectors.iter().find_map(|css| {
        entry
            .all(css)
            .into_iter()
            .map(|n| n.text())
            .find(|t| accept.admits(t))
    })
}

/// A candidate sitting inside a section that belongs to another field was
/// produced by a strategy meant for that field and must not be reused.
fn is_foreign(node: Scope<'_>, field: Field) -> bool {
    owning_field(node).is_some_and(|owner| owner != field)
}

fn owning_field(node: Scope<'_>) -> Option<Field> {
    let section = node.closest("section, [data-section]")?;
    Field::ALL.into_iter().find(|f| {
        f.section_markers()
            .iter()
            .any(|m| section.matches(m) || section.first(m).is_some())
    })
}

/// Best-effort biography search over every leaf in the visible band of the
/// page. Header and footer chrome are excluded by the vertical margins.
pub fn bio_scan(doc: &Snapshot) -> Option<Scope<'_>> {
    let floor = doc.viewport_height() - BIO_BOTTOM_MARGIN;
    let mut best: Option<(u32, Scope<'_>)> = None;

    for leaf in doc.text_leaves(BIO_LEAF_SELECTOR) {
        let len = leaf.text.chars().count();
        if !(BIO_MIN_CHARS..BIO_MAX_CHARS).contains(&len) || is_noise(&leaf.text) {
            continue;
        }
        if !(leaf.top > BIO_TOP_MARGIN && leaf.top < floor) {
            continue;
        }
        let score = bio_score(&leaf.text);
        if score <= BIO_THRESHOLD {
            continue;
        }
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, leaf.scope));
        }
    }

    best.map(|(_, scope)| scope)
}
