use serde::{Deserialize, Serialize};

pub const MAX_EXPERIENCE: usize = 3;
pub const MAX_EDUCATION: usize = 2;
pub const MAX_SKILLS: usize = 10;

/// About text shorter than this is treated as missing, both when deciding
/// whether to consult the secondary source and when judging validity.
pub const MIN_ABOUT_CHARS: usize = 30;

pub const DESCRIPTION_MAX_CHARS: usize = 200;

pub const COMPANY_SENTINEL: &str = "Company not specified";
pub const DURATION_SENTINEL: &str = "Duration not specified";
pub const DEGREE_SENTINEL: &str = "Degree not specified";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub about: Option<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<String>,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    pub duration: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub school: String,
    pub degree: String,
    pub year: String,
}

/// A work-history entry before sentinel substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperienceCandidate {
    pub title: String,
    pub company: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EducationCandidate {
    pub school: String,
    pub degree: Option<String>,
    pub year: Option<String>,
}

impl ProfileDraft {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            ..Default::default()
        }
    }

    pub fn about_is_sufficient(&self) -> bool {
        self.about.as_deref().is_some_and(about_is_usable)
    }

    /// A draft is valid once it carries a usable biography.
    pub fn is_valid(&self) -> bool {
        self.about_is_sufficient()
    }
}

impl ExperienceCandidate {
    /// Apply sentinels. Entries without a title are dropped.
    pub fn finish(self) -> Option<ExperienceEntry> {
        let title = clean(Some(self.title))?;
        Some(ExperienceEntry {
            title,
            company: clean(self.company).unwrap_or_else(|| COMPANY_SENTINEL.to_string()),
            duration: clean(self.duration).unwrap_or_else(|| DURATION_SENTINEL.to_string()),
            description: clean(self.description)
                .map(|d| truncate_description(&d))
                .unwrap_or_default(),
        })
    }
}

impl EducationCandidate {
    pub fn finish(self) -> Option<EducationEntry> {
        let school = clean(Some(self.school))?;
        Some(EducationEntry {
            school,
            degree: clean(self.degree).unwrap_or_else(|| DEGREE_SENTINEL.to_string()),
            year: clean(self.year).unwrap_or_default(),
        })
    }
}

pub fn about_is_usable(text: &str) -> bool {
    text.chars().count() >= MIN_ABOUT_CHARS
}

/// Trimmed, or `None` when nothing is left.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn truncate_description(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_MAX_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(DESCRIPTION_MAX_CHARS).collect();
        format!("{}...", cut)
    }
}
