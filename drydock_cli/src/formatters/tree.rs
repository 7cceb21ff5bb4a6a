use std::collections::BTreeSet;
use std::fmt::Write as _;

use drydock_core::Project;

use super::Formatter;

/// Indented depth-first rendering from the root groups down through
/// `children`. `print_resource` additionally lists each group's resources.
pub struct TreeFormatter {
    print_resource: bool,
}

impl TreeFormatter {
    pub fn new(print_resource: bool) -> TreeFormatter {
        TreeFormatter { print_resource }
    }

    fn render_node(&self, project: &Project, name: &str, depth: usize, visited: &mut BTreeSet<String>, out: &mut String) {
        if visited.contains(name) {
            return;
        }
        visited.insert(name.to_string());
        let group = &project.resource_graph.resource_groups[name];
        let indent = "  ".repeat(depth);
        if project.group_is_visible(name) {
            let _ = writeln!(out, "{}{}", indent, name);
            if self.print_resource {
                for r in group.all_resources() {
                    let _ = writeln!(out, "{}  - {} {}", indent, r.kind, r.name);
                }
            }
        }
        for child in &group.children {
            self.render_node(project, child, depth + 1, visited, out);
        }
    }
}

impl Formatter for TreeFormatter {
    fn format(&self, project: &Project) -> String {
        let mut out = String::new();
        let mut visited = BTreeSet::new();
        for root in &project.resource_graph.root_nodes {
            self.render_node(project, root, 0, &mut visited, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents_children_under_their_parent() {
        let project = crate::formatters::tests::fixture_project(&[("a", &[]), ("b", &["a"])]);

        let rendered = TreeFormatter::new(false).format(&project);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "a");
        assert_eq!(lines[1], "  b");
    }
}
