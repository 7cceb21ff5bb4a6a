use std::fmt::Write as _;

use drydock_core::Project;
use serde_derive::Serialize;

use super::Formatter;

#[derive(Serialize)]
struct GroupConfigView {
    name: String,
    resources: Vec<String>,
    depend: Vec<String>,
    wait: Vec<String>,
}

/// Prints the project's common info (namespace/context/kubeconfig/root dir,
/// merged variables, docker credentials) the way `PrintCommonInfo` does in
/// the original, followed by a descriptor-shaped view of the resolved graph
/// (`PrintConfig`): group name, the resource-file sources it was built from,
/// its `depend` and `wait` entries. Not a byte-for-byte echo of the original
/// descriptor -- excludes and the raw glob text are already baked into the
/// resolved file list by this point -- but close enough to sanity-check what
/// the project resolved to.
pub struct ConfigFormatter;

impl ConfigFormatter {
    pub fn new() -> ConfigFormatter {
        ConfigFormatter
    }
}

impl Formatter for ConfigFormatter {
    fn format(&self, project: &Project) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "root_dir: {}", project.root_dir.display());
        let _ = writeln!(out, "namespace: {}", project.namespace);
        let _ = writeln!(out, "context: {}", project.context);
        let _ = writeln!(out, "kube_config: {}", project.kube_config);
        for (k, v) in &project.variables {
            let _ = writeln!(out, "variable {}: {}", k, v);
        }
        for cred in &project.credentials {
            let _ = writeln!(out, "credential: {}@{}", cred.username, cred.host);
        }
        out.push('\n');

        let mut groups = Vec::new();
        for (name, group) in &project.resource_graph.resource_groups {
            if !project.group_is_visible(name) {
                continue;
            }
            let resources = group.resource_files.iter().map(|rf| rf.source.clone()).collect();
            let wait = group.wait.iter().map(|w| format!("{} {}", w.kind, w.name)).collect();
            groups.push(GroupConfigView { name: name.clone(), resources, depend: group.depend.clone(), wait });
        }
        out.push_str(&serde_yaml::to_string(&groups).unwrap_or_default());
        out
    }
}

#[cfg(test)]
mod tests {
    use drydock_core::resource_file::ResourceFile;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn lists_resource_file_sources() {
        let mut project = crate::formatters::tests::fixture_project(&[("a", &[])]);
        project.resource_graph.resource_groups.get_mut("a").unwrap().resource_files = vec![ResourceFile {
            source: "resources/*.yaml".to_string(),
            context_dir: PathBuf::from("."),
            raw_content: String::new(),
            expanded_content: String::new(),
            resources: Vec::new(),
        }];
        let rendered = ConfigFormatter::new().format(&project);
        assert!(rendered.contains("resources/*.yaml"));
    }
}
