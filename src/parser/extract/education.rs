use crate::parser::cascade::{pick_within, resolve_nodes, Accept, Field};
use crate::parser::document::{Scope, Snapshot};
use crate::profile::EducationCandidate;

const SCHOOL: &[&str] = &[
    r#".mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
    r#".display-flex.align-items-center .mr1.t-bold span[aria-hidden="true"]"#,
    r#".pv-entity__school-name span[aria-hidden="true"]"#,
    "h3 .visually-hidden",
];

const DEGREE: &[&str] = &[
    r#".t-14.t-normal span[aria-hidden="true"]"#,
    r#".pv-entity__degree-name span[aria-hidden="true"]"#,
    r#".pv-entity__fos span[aria-hidden="true"]"#,
    r#".t-14.t-normal.break-words span[aria-hidden="true"]"#,
];

const YEAR: &[&str] = &[
    r#".pvs-entity__caption-wrapper span[aria-hidden="true"]"#,
    r#".t-12.t-black--light span[aria-hidden="true"]"#,
    r#".pv-entity__dates span[aria-hidden="true"]"#,
];

pub fn extract(doc: &Snapshot) -> Vec<EducationCandidate> {
    resolve_nodes(doc, Field::Education)
        .into_iter()
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: Scope<'_>) -> Option<EducationCandidate> {
    Some(EducationCandidate {
        school: pick_within(entry, SCHOOL, Accept::Entity)?,
        degree: pick_within(entry, DEGREE, Accept::Entity),
        year: pick_within(entry, YEAR, Accept::Year),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_degree_year() {
        let html = r#"<html><body><section><div id="education"></div>
            <div class="pvs-list__outer-container"><ul>
              <li class="pvs-list__paged-list-item">
                <div class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Carnegie Mellon University</span></div>
                <span class="t-14 t-normal"><span aria-hidden="true">2012 - 2016</span></span>
                <span class="t-14 t-normal"><span aria-hidden="true">BS, Computer Science</span></span>
                <span class="t-12 t-black--light"><span aria-hidden="true">2012 - 2016</span></span>
              </li>
              <li class="pvs-list__paged-list-item"><span class="t-14 t-normal"><span aria-hidden="true">No school here</span></span></li>
            </ul></div></section></body></html>"#;
        let doc = Snapshot::parse(html);
        let entries = extract(&doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].school, "Carnegie Mellon University");
        assert_eq!(entries[0].degree.as_deref(), Some("BS, Computer Science"));
        assert_eq!(entries[0].year.as_deref(), Some("2012 - 2016"));
    }

    #[test]
    fn school_skips_a_place_in_the_first_slot() {
        let html = r#"<html><body><section><div id="education"></div>
            <ul class="pvs-list">
              <li class="pvs-list__paged-list-item">
                <div class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Austin, TX</span></div>
                <h3><span class="visually-hidden">University of Texas</span></h3>
              </li>
            </ul></section></body></html>"#;
        let doc = Snapshot::parse(html);
        let entries = extract(&doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].school, "University of Texas");
    }
}
