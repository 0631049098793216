pub mod about;
pub mod education;
pub mod experience;
pub mod skills;
pub mod top_card;

use crate::parser::document::Snapshot;
use crate::profile::{EducationCandidate, ExperienceCandidate};

/// Everything the selector cascades could read from one snapshot, before
/// secondary backfill and sentinel merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryExtract {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub about: Option<String>,
    pub experience: Vec<ExperienceCandidate>,
    pub education: Vec<EducationCandidate>,
    pub skills: Vec<String>,
}

pub fn extract_all(doc: &Snapshot) -> PrimaryExtract {
    let card = top_card::extract(doc);

    PrimaryExtract {
        name: card.name,
        headline: card.headline,
        location: card.location,
        company: card.company,
        about: about::extract(doc),
        experience: experience::extract(doc),
        education: education::extract(doc),
        skills: skills::extract(doc),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fixture: &str) -> PrimaryExtract {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        extract_all(&Snapshot::parse(&html))
    }

    #[test]
    fn full_profile_top_card() {
        let p = parse("profile_full");
        assert_eq!(p.name.as_deref(), Some("Jane Doe"));
        assert_eq!(
            p.headline.as_deref(),
            Some("Product Manager at Initech | Building tools for small teams")
        );
        assert_eq!(p.location.as_deref(), Some("Austin, Texas, United States"));
        assert_eq!(p.company.as_deref(), Some("Initech"));
    }

    #[test]
    fn full_profile_about() {
        let p = parse("profile_full");
        assert_eq!(
            p.about.as_deref(),
            Some("Hey there, i am a product manager at Initech.")
        );
    }

    #[test]
    fn full_profile_experience() {
        let p = parse("profile_full");
        assert_eq!(p.experience.len(), 2);
        assert_eq!(p.experience[0].title, "Product Manager");
        assert_eq!(p.experience[0].company.as_deref(), Some("Initech"));
        assert_eq!(p.experience[0].duration.as_deref(), Some("Mar 2021 - Present · 3 yrs 2 mos"));
        assert!(p.experience[0].description.is_some());
        assert_eq!(p.experience[1].title, "Business Analyst");
        assert_eq!(p.experience[1].company, None);
    }

    #[test]
    fn full_profile_education_and_skills() {
        let p = parse("profile_full");
        assert_eq!(p.education.len(), 1);
        assert_eq!(p.education[0].school, "University of Texas at Austin");
        assert_eq!(p.education[0].degree.as_deref(), Some("BBA, Management Information Systems"));
        assert_eq!(p.education[0].year.as_deref(), Some("2013 - 2017"));
        assert_eq!(p.skills, vec!["Product Strategy", "Roadmapping", "SQL"]);
    }

    #[test]
    fn sparse_profile_has_gaps() {
        let p = parse("profile_sparse");
        assert_eq!(p.name.as_deref(), Some("Sam Rivera"));
        assert_eq!(p.about, None);
        assert!(p.experience.is_empty());
        assert!(p.education.is_empty());
        assert!(p.skills.is_empty());
    }

    #[test]
    fn same_snapshot_same_result() {
        let html = std::fs::read_to_string("tests/fixtures/profile_full.html").unwrap();
        assert_eq!(
            extract_all(&Snapshot::parse(&html)),
            extract_all(&Snapshot::parse(&html))
        );
    }
}
