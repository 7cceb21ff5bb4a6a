use std::fmt::Write as _;

use drydock_core::Project;

use super::Formatter;

/// Flat, human-oriented listing: one block per matching group, depend/wait
/// lines, then one line per resource.
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    pub fn new() -> ConsoleFormatter {
        ConsoleFormatter
    }
}

impl Formatter for ConsoleFormatter {
    fn format(&self, project: &Project) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "namespace: {}", project.namespace);
        for (name, group) in &project.resource_graph.resource_groups {
            if !project.group_is_visible(name) {
                continue;
            }
            let _ = writeln!(out, "Group: {}", name);
            if !group.depend.is_empty() {
                let _ = writeln!(out, "  depend: {}", group.depend.join(", "));
            }
            for w in &group.wait {
                let _ = writeln!(out, "  wait: {} {} (timeout {}s)", w.kind, w.name, w.timeout_secs());
            }
            for resource in group.all_resources() {
                let _ = writeln!(out, "  - {} {}", resource.kind, resource.name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_depend_and_filters_by_name() {
        let mut project = crate::formatters::tests::fixture_project(&[("a", &[]), ("b", &["a"])]);

        project.set_filter(crate::filters::build_group_filter("b", true).unwrap());
        let rendered = ConsoleFormatter::new().format(&project);
        assert!(rendered.contains("Group: b"));
        assert!(rendered.contains("depend: a"));
        assert!(!rendered.contains("Group: a"));
    }
}
