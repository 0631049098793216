use crate::parser::cascade::{resolve_text, Field};
use crate::parser::document::Snapshot;
use crate::parser::patterns::strip_employment_type;
use crate::profile::clean;

pub struct TopCard {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
}

pub fn extract(doc: &Snapshot) -> TopCard {
    let text = |field| resolve_text(doc, field).map(|hit| hit.text);

    TopCard {
        name: text(Field::Name),
        headline: text(Field::Headline),
        location: text(Field::Location),
        company: clean(text(Field::Company).map(|c| strip_employment_type(&c))),
    }
}
