use crate::parser::cascade::{resolve_nodes, Field};
use crate::parser::document::Snapshot;

pub fn extract(doc: &Snapshot) -> Vec<String> {
    let mut skills: Vec<String> = Vec::new();
    for node in resolve_nodes(doc, Field::Skills) {
        let skill = node.text();
        if !skill.is_empty() && !skills.contains(&skill) {
            skills.push(skill);
        }
    }
    skills
}
