use std::sync::LazyLock;

use regex::RegexSet;

/// Candidates scoring above this are accepted as a biography.
pub const BIO_THRESHOLD: u32 = 3;

// Every pattern is anchored on both ends so that a sentence which merely
// mentions "connect" or "present" is not thrown away.
static NOISE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^\d[\d,.]*\+?\s*(followers?|connections?)$",
        r"(?i)^(followers?|connections?)\s*\d[\d,.]*\+?$",
        r"(?i)^(message|connect|follow|following|pending|more)$",
        r"(?i)^view\s+(full\s+)?profile$",
        r"(?i)^see\s+(more|less|all)$",
        r"(?i)^show\s+(more|less|all)$",
        r"(?i)^\d+\s*(yrs?|years?)(\s*\d+\s*(mos?|months?))?$",
        r"(?i)^\d+\s*(mos?|months?)$",
        r"(?i)^(jan(uary)?|feb(ruary)?|mar(ch)?|apr(il)?|may|june?|july?|aug(ust)?|sep(t(ember)?)?|oct(ober)?|nov(ember)?|dec(ember)?)\.?(\s+\d{4})?$",
        r"(?i)^\d{4}\s*[-–]\s*(\d{4}|present)$",
        r"(?i)^present$",
        r"^[•·\-–|]$",
        r"^(\.{3,}|…)$",
    ])
    .unwrap()
});

const SELF_DESCRIPTIVE: &[&str] = &[
    "passionate",
    "experienced",
    "dedicated",
    "focused",
    "specialized",
    "expertise",
    "professional",
    "years",
    "background",
    "skills",
    "leading",
    "managing",
    "developing",
    "creating",
    "building",
    "helping",
    "working",
    "love",
    "enjoy",
    "enthusiastic",
];

const FIRST_PERSON: &[&str] = &[
    "i am",
    "i have",
    "i work",
    "i love",
    "my experience",
    "my passion",
];

const ROLE_TERMS: &[&str] = &[
    "ceo",
    "cto",
    "manager",
    "director",
    "engineer",
    "developer",
    "consultant",
    "analyst",
    "specialist",
    "coordinator",
    "lead",
];

/// True for navigation chrome, counters, bare dates and decorative glyphs.
pub fn is_noise(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || NOISE_SET.is_match(t)
}

/// Heuristic score of how much a fragment reads like a self-written bio.
///
/// Each listed term contributes once when present: +1 for self-descriptive
/// words, +2 for first-person phrases, +1 for role terms.
pub fn bio_score(text: &str) -> u32 {
    let lower = text.to_lowercase();
    let hits = |terms: &[&str]| terms.iter().filter(|t| lower.contains(*t)).count() as u32;

    hits(SELF_DESCRIPTIVE) + 2 * hits(FIRST_PERSON) + hits(ROLE_TERMS)
}

pub fn reads_like_bio(text: &str) -> bool {
    bio_score(text) > BIO_THRESHOLD
}
