use std::collections::BTreeMap;

use drydock_core::Project;
use serde_derive::Serialize;

use super::Formatter;

#[derive(Serialize)]
struct ResourceView {
    kind: String,
    name: String,
}

#[derive(Serialize)]
struct GroupView {
    depend: Vec<String>,
    wait: Vec<String>,
    resources: Vec<ResourceView>,
}

/// Machine-readable dump of the resolved graph, one YAML map keyed by group
/// name.
pub struct YamlFormatter;

impl YamlFormatter {
    pub fn new() -> YamlFormatter {
        YamlFormatter
    }
}

impl Formatter for YamlFormatter {
    fn format(&self, project: &Project) -> String {
        let mut view: BTreeMap<String, GroupView> = BTreeMap::new();
        for (name, group) in &project.resource_graph.resource_groups {
            if !project.group_is_visible(name) {
                continue;
            }
            let resources = group
                .all_resources()
                .iter()
                .map(|r| ResourceView { kind: r.kind.clone(), name: r.name.clone() })
                .collect();
            let wait = group.wait.iter().map(|w| format!("{} {}", w.kind, w.name)).collect();
            view.insert(name.clone(), GroupView { depend: group.depend.clone(), wait, resources });
        }
        serde_yaml::to_string(&view).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn renders_valid_yaml() {
        let project = crate::formatters::tests::fixture_project(&[("a", &[])]);
        let rendered = YamlFormatter::new().format(&project);
        let parsed: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&rendered).unwrap();
        assert!(parsed.contains_key("a"));
    }
}
