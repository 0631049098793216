//! Alternate structured representation of a profile, fetched from the
//! authenticated profile API and used only to backfill what the page
//! cascades could not resolve.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::SecondaryError;
use crate::profile::{clean, EducationCandidate, ExperienceCandidate};

const SECONDARY_ENTRY_LIMIT: usize = 3;
const PROTOCOL_VERSION: &str = "2.0.0";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

static SESSION_COOKIE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"JSESSIONID\s*=\s*"?([^";]+)"#).unwrap());

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredProfile {
    pub profile_summary: Option<SummaryBlock>,
    pub summary: Option<String>,
    pub position_view: Option<Elements<Position>>,
    pub education_view: Option<Elements<Education>>,
    pub educations: Option<Vec<Education>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SummaryBlock {
    pub text: Option<TextBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TextBlock {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Elements<T> {
    #[serde(default = "Vec::new")]
    pub elements: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedRef {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Position {
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub company: Option<NamedRef>,
    pub time_period: Option<TimePeriod>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub school_name: Option<String>,
    pub school: Option<NamedRef>,
    pub degree_name: Option<String>,
    pub field_of_study: Option<String>,
    pub time_period: Option<TimePeriod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimePeriod {
    pub start_date: Option<YearMonth>,
    pub end_date: Option<YearMonth>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct YearMonth {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// A source of structured profile data. Implementations fail soft: any
/// problem is reported as `None`.
#[async_trait]
pub trait SecondarySource: Send + Sync {
    async fn fetch(&self, subject_id: &str) -> Option<StructuredProfile>;
}

pub struct ProfileApiClient {
    client: reqwest::Client,
    root: String,
    cookie: Option<String>,
}

impl ProfileApiClient {
    pub fn new(root: &str, cookie: Option<&str>) -> Result<Self, SecondaryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            root: root.trim_end_matches('/').to_string(),
            cookie: cookie.map(String::from),
        })
    }

    async fn try_fetch(&self, subject_id: &str) -> Result<StructuredProfile, SecondaryError> {
        let cookie = self.cookie.as_deref().unwrap_or_default();
        let csrf = csrf_token(cookie).ok_or(SecondaryError::MissingCredential)?;
        let endpoint = format!("{}/profiles/{}/profileView", self.root, subject_id);

        let resp = self
            .client
            .get(&endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::COOKIE, cookie)
            .header("csrf-token", csrf)
            .header("x-restli-protocol-version", PROTOCOL_VERSION)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SecondaryError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        parse_payload(&body)
    }
}

#[async_trait]
impl SecondarySource for ProfileApiClient {
    async fn fetch(&self, subject_id: &str) -> Option<StructuredProfile> {
        match self.try_fetch(subject_id).await {
            Ok(profile) => {
                info!(subject = subject_id, "Secondary profile fetched");
                Some(profile)
            }
            Err(e) => {
                warn!(subject = subject_id, error = %e, "Secondary source unavailable");
                None
            }
        }
    }
}

pub fn parse_payload(body: &str) -> Result<StructuredProfile, SecondaryError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SecondaryError::Payload(e.to_string()))?;
    if !value.is_object() {
        return Err(SecondaryError::Payload("expected a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| SecondaryError::Payload(e.to_string()))
}

/// Session credential carried in the `JSESSIONID` cookie. The value already
/// includes whatever prefix the API expects.
pub fn csrf_token(cookie: &str) -> Option<String> {
    SESSION_COOKIE_RE
        .captures(cookie)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn extract_about(profile: &StructuredProfile) -> Option<String> {
    let nested = profile
        .profile_summary
        .as_ref()
        .and_then(|s| s.text.as_ref())
        .and_then(|t| t.text.clone());
    clean(nested).or_else(|| clean(profile.summary.clone()))
}

pub fn extract_experience(profile: &StructuredProfile) -> Vec<ExperienceCandidate> {
    let Some(view) = &profile.position_view else {
        return Vec::new();
    };
    view.elements
        .iter()
        .take(SECONDARY_ENTRY_LIMIT)
        .map(|pos| ExperienceCandidate {
            title: pos.title.clone().unwrap_or_default(),
            company: clean(pos.company_name.clone())
                .or_else(|| clean(pos.company.as_ref().and_then(|c| c.name.clone()))),
            duration: pos
                .time_period
                .as_ref()
                .map(format_duration)
                .filter(|d| !d.is_empty()),
            description: clean(pos.description.clone()),
        })
        .collect()
}

pub fn extract_education(profile: &StructuredProfile) -> Vec<EducationCandidate> {
    let list = profile
        .education_view
        .as_ref()
        .map(|v| v.elements.as_slice())
        .or(profile.educations.as_deref())
        .unwrap_or_default();

    list.iter()
        .take(SECONDARY_ENTRY_LIMIT)
        .map(|ed| {
            let degree = [&ed.degree_name, &ed.field_of_study]
                .into_iter()
                .filter_map(|p| clean(p.clone()))
                .collect::<Vec<_>>()
                .join(", ");
            EducationCandidate {
                school: clean(ed.school_name.clone())
                    .or_else(|| clean(ed.school.as_ref().and_then(|s| s.name.clone())))
                    .unwrap_or_default(),
                degree: clean(Some(degree)),
                year: ed
                    .time_period
                    .as_ref()
                    .map(format_duration)
                    .filter(|y| !y.is_empty()),
            }
        })
        .collect()
}

/// `"Mar 2019 – Present"`, `"Jan 2016 – Aug 2018"`; empty without a start.
pub fn format_duration(period: &TimePeriod) -> String {
    let Some(start) = period.start_date.and_then(format_year_month) else {
        return String::new();
    };
    let end = period
        .end_date
        .and_then(format_year_month)
        .unwrap_or_else(|| "Present".to_string());
    format!("{} – {}", start, end)
}

fn format_year_month(ym: YearMonth) -> Option<String> {
    let year = ym.year?;
    let month = ym
        .month
        .filter(|m| (1..=12).contains(m))
        .map(|m| MONTHS[(m - 1) as usize])
        .unwrap_or(MONTHS[0]);
    Some(format!("{} {}", month, year))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> StructuredProfile {
        parse_payload(json).unwrap()
    }

    #[test]
    fn duration_formatting() {
        let open = TimePeriod {
            start_date: Some(YearMonth { month: Some(3), year: Some(2019) }),
            end_date: None,
        };
        assert_eq!(format_duration(&open), "Mar 2019 – Present");

        let closed = TimePeriod {
            start_date: Some(YearMonth { month: None, year: Some(2016) }),
            end_date: Some(YearMonth { month: Some(8), year: Some(2018) }),
        };
        assert_eq!(format_duration(&closed), "Jan 2016 – Aug 2018");
        assert_eq!(format_duration(&TimePeriod::default()), "");
    }

    #[test]
    fn about_prefers_nested_summary() {
        let p = payload(r#"{"profileSummary":{"text":{"text":"Nested bio"}},"summary":"Flat"}"#);
        assert_eq!(extract_about(&p).as_deref(), Some("Nested bio"));
        let p = payload(r#"{"summary":"  Flat bio  "}"#);
        assert_eq!(extract_about(&p).as_deref(), Some("Flat bio"));
        assert_eq!(extract_about(&payload("{}")), None);
    }

    #[test]
    fn experience_from_positions() {
        let p = payload(
            r#"{"positionView":{"elements":[
                {"title":"Engineer","companyName":"Acme","timePeriod":{"startDate":{"month":3,"year":2019}}},
                {"title":"Intern","company":{"name":"Globex"}},
                {"title":"A"},{"title":"B"}
            ]}}"#,
        );
        let exp = extract_experience(&p);
        assert_eq!(exp.len(), 3);
        assert_eq!(exp[0].company.as_deref(), Some("Acme"));
        assert_eq!(exp[0].duration.as_deref(), Some("Mar 2019 – Present"));
        assert_eq!(exp[1].company.as_deref(), Some("Globex"));
        assert_eq!(exp[1].duration, None);
    }

    #[test]
    fn education_from_either_key() {
        let p = payload(
            r#"{"educationView":{"elements":[
                {"schoolName":"MIT","degreeName":"BS","fieldOfStudy":"Physics",
                 "timePeriod":{"startDate":{"year":2008},"endDate":{"year":2012}}}
            ]}}"#,
        );
        let ed = extract_education(&p);
        assert_eq!(ed[0].school, "MIT");
        assert_eq!(ed[0].degree.as_deref(), Some("BS, Physics"));
        assert_eq!(ed[0].year.as_deref(), Some("Jan 2008 – Jan 2012"));

        let p = payload(r#"{"educations":[{"school":{"name":"Reed College"}}]}"#);
        let ed = extract_education(&p);
        assert_eq!(ed[0].school, "Reed College");
        assert_eq!(ed[0].degree, None);
    }

    #[test]
    fn missing_keys_give_empty_values() {
        let p = payload(r#"{"positionView":{}}"#);
        assert!(extract_experience(&p).is_empty());
        assert!(extract_education(&p).is_empty());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(parse_payload("not json").is_err());
        assert!(parse_payload("[1,2]").is_err());
        assert!(parse_payload(r#"{"summary": 12}"#).is_err());
    }

    #[test]
    fn csrf_from_cookie() {
        let cookie = r#"lang=v=2; JSESSIONID="ajax:123456"; li_at=abc"#;
        assert_eq!(csrf_token(cookie).as_deref(), Some("ajax:123456"));
        assert_eq!(csrf_token("lang=en"), None);
    }

    #[tokio::test]
    async fn missing_credential_fails_soft() {
        let client = ProfileApiClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(client.fetch("jane-doe").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_fails_soft() {
        let client =
            ProfileApiClient::new("http://127.0.0.1:9", Some(r#"JSESSIONID="ajax:1""#)).unwrap();
        assert!(client.fetch("jane-doe").await.is_none());
    }
}
