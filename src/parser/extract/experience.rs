use tracing::debug;

use crate::parser::cascade::{pick_within, resolve_nodes, Accept, Field};
use crate::parser::document::{Scope, Snapshot};
use crate::parser::patterns::strip_employment_type;
use crate::profile::{clean, ExperienceCandidate};

const TITLE: &[&str] = &[
    r#".mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
    r#".display-flex.align-items-center .mr1.t-bold span[aria-hidden="true"]"#,
    r#".pv-entity__summary-info h3 span[aria-hidden="true"]"#,
    r#".t-16.t-black.t-bold span[aria-hidden="true"]"#,
    "h3 .visually-hidden",
];

const COMPANY: &[&str] = &[
    r#".t-14.t-normal span[aria-hidden="true"]"#,
    r#".pv-entity__secondary-title span[aria-hidden="true"]"#,
    r#".t-14.t-normal.break-words span[aria-hidden="true"]"#,
    r#".inline-show-more-text .t-14 span[aria-hidden="true"]"#,
];

const DURATION: &[&str] = &[
    r#".pvs-entity__caption-wrapper span[aria-hidden="true"]"#,
    r#".t-12.t-black--light span[aria-hidden="true"]"#,
    r#".pv-entity__dates span[aria-hidden="true"]"#,
    r#".t-black--light.t-12 span[aria-hidden="true"]"#,
];

const DESCRIPTION: &[&str] = &[
    r#".inline-show-more-text--is-expanded span[aria-hidden="true"]"#,
    r#".pv-shared-text-with-see-more span[aria-hidden="true"]"#,
    r#".break-words span[aria-hidden="true"]:not(.t-14):not(.t-12)"#,
];

pub fn extract(doc: &Snapshot) -> Vec<ExperienceCandidate> {
    resolve_nodes(doc, Field::Experience)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let parsed = parse_entry(entry);
            if parsed.is_none() {
                debug!(entry = idx, "Experience entry without a title skipped");
            }
            parsed
        })
        .collect()
}

fn parse_entry(entry: Scope<'_>) -> Option<ExperienceCandidate> {
    let title = pick_within(entry, TITLE, Accept::Entity)?;
    let company = pick_within(entry, COMPANY, Accept::Entity)
        .map(|c| strip_employment_type(&c))
        .and_then(|c| clean(Some(c)));

    Some(ExperienceCandidate {
        title,
        company,
        duration: pick_within(entry, DURATION, Accept::Duration),
        description: pick_within(entry, DESCRIPTION, Accept::Description),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(inner: &str) -> String {
        format!(
            r#"<html><body><section><div id="experience"></div><ul class="pvs-list">
               <li class="pvs-list__paged-list-item">{inner}</li></ul></section></body></html>"#
        )
    }

    #[test]
    fn company_skips_dates_and_places() {
        let html = item(
            r#"<div class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Staff Engineer</span></div>
               <span class="t-14 t-normal"><span aria-hidden="true">Jan 2020 - Present · 4 yrs</span></span>
               <span class="t-14 t-normal"><span aria-hidden="true">Seattle, WA</span></span>
               <span class="t-14 t-normal"><span aria-hidden="true">Globex · Full-time</span></span>
               <span class="t-12 t-black--light"><span aria-hidden="true">Jan 2020 - Present · 4 yrs</span></span>"#,
        );
        let doc = Snapshot::parse(&html);
        let entries = extract(&doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Staff Engineer");
        assert_eq!(entries[0].company.as_deref(), Some("Globex"));
        assert_eq!(entries[0].duration.as_deref(), Some("Jan 2020 - Present · 4 yrs"));
        assert_eq!(entries[0].description, None);
    }

    #[test]
    fn title_skips_a_date_in_the_first_slot() {
        let html = item(
            r#"<div class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Jan 2020 - Present</span></div>
               <h3><span class="visually-hidden">Staff Engineer</span></h3>"#,
        );
        let doc = Snapshot::parse(&html);
        let entries = extract(&doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Staff Engineer");
    }

    #[test]
    fn duration_must_look_like_a_duration() {
        let html = item(
            r#"<div class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Analyst</span></div>
               <span class="t-12 t-black--light"><span aria-hidden="true">Remote</span></span>"#,
        );
        let doc = Snapshot::parse(&html);
        let entries = extract(&doc);
        assert_eq!(entries[0].duration, None);
        assert_eq!(entries[0].company, None);
    }

    #[test]
    fn untitled_entries_are_skipped() {
        let html = item(r#"<span class="t-14 t-normal"><span aria-hidden="true">Acme</span></span>"#);
        let doc = Snapshot::parse(&html);
        assert!(extract(&doc).is_empty());
    }

    #[test]
    fn description_needs_prose() {
        let long = "Built the internal developer platform used by forty product teams across the company.";
        let html = item(&format!(
            r#"<div class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Lead</span></div>
               <div class="inline-show-more-text--is-expanded"><span aria-hidden="true">Short note</span></div>
               <div class="pv-shared-text-with-see-more"><span aria-hidden="true">{long}</span></div>"#
        ));
        let doc = Snapshot::parse(&html);
        assert_eq!(extract(&doc)[0].description.as_deref(), Some(long));
    }
}
