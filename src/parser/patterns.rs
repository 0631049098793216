use std::sync::LazyLock;

use regex::{Regex, RegexSet};

static DURATION_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\d+\s*(yrs?|years?)\s*\d*\s*(mos?|months?)",
        r"\d{4}\s*[-–]\s*\d{4}",
        r"(?i)\d{4}\s*[-–]\s*present",
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4}",
        r"(?i)\b\d+\s*(mos?|months?)\b",
        r"(?i)\b\d+\s*(yrs?|years?)\b",
        r"(?i)\bpresent\b",
    ])
    .unwrap()
});

static YEAR_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(19|20)\d{2}\b",
        r"\d{4}\s*[-–]\s*\d{4}",
        r"(?i)\d{4}\s*[-–]\s*present",
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4}",
    ])
    .unwrap()
});

static LOCATION_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r",\s*[A-Z]{2}$",
        r"(?i)\b(united states|usa|united kingdom|uk|canada|australia|germany|india|france)$",
        r"(?i)\b(remote|hybrid|on-site|onsite)\b",
    ])
    .unwrap()
});

const EMPLOYMENT_TYPES: &str =
    "full-time|part-time|contract|internship|self-employed|freelance|apprenticeship|seasonal|temporary";

static EMPLOYMENT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\s*·\s*({EMPLOYMENT_TYPES})\s*$")).unwrap());
static EMPLOYMENT_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^({EMPLOYMENT_TYPES})$")).unwrap());

pub fn is_duration(text: &str) -> bool {
    DURATION_SET.is_match(text)
}

pub fn is_year(text: &str) -> bool {
    YEAR_SET.is_match(text)
}

pub fn is_location(text: &str) -> bool {
    LOCATION_SET.is_match(text.trim())
}

/// Names, titles and degrees must not look like a date or a place.
pub fn is_entity_text(text: &str) -> bool {
    !text.is_empty() && !is_duration(text) && !is_year(text) && !is_location(text)
}

/// "Acme · Full-time" → "Acme". A bare qualifier collapses to "".
pub fn strip_employment_type(text: &str) -> String {
    let t = text.trim();
    if EMPLOYMENT_ONLY_RE.is_match(t) {
        return String::new();
    }
    EMPLOYMENT_SUFFIX_RE.replace(t, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        for t in [
            "Jan 2020 - Present · 3 yrs 2 mos",
            "2016 – 2019",
            "2 years 4 months",
            "8 mos",
            "Mar 2019 – Present",
        ] {
            assert!(is_duration(t), "{t:?}");
        }
        assert!(!is_duration("Acme Corp"));
        assert!(!is_duration("Representative"));
    }

    #[test]
    fn years() {
        assert!(is_year("2014 – 2018"));
        assert!(is_year("Sep 2012"));
        assert!(is_year("2020"));
        assert!(!is_year("Bachelor of Science, Computer Science"));
    }

    #[test]
    fn locations() {
        assert!(is_location("Austin, TX"));
        assert!(is_location("Berlin, Germany"));
        assert!(is_location("Remote"));
        assert!(is_location("London · Hybrid"));
        assert!(!is_location("Acme, Inc."));
        assert!(!is_location("Stripe"));
    }

    #[test]
    fn entity_text_rejects_dates_and_places() {
        assert!(is_entity_text("Acme Corp"));
        assert!(!is_entity_text("2019 - 2021"));
        assert!(!is_entity_text("Seattle, WA"));
        assert!(!is_entity_text(""));
    }

    #[test]
    fn employment_type_is_dropped() {
        assert_eq!(strip_employment_type("Acme · Full-time"), "Acme");
        assert_eq!(strip_employment_type("Globex"), "Globex");
        assert_eq!(strip_employment_type("Full-time"), "");
    }
}
