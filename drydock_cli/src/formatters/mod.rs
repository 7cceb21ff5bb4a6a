//! Renderers for the `debug` verb: the same `ResourceGraph` dressed up four
//! ways, picked by `-o console|yaml|tree|config`.

pub mod config;
pub mod console;
pub mod tree;
pub mod yaml;

pub use config::ConfigFormatter;
pub use console::ConsoleFormatter;
pub use tree::TreeFormatter;
pub use yaml::YamlFormatter;

use drydock_core::Project;

pub trait Formatter {
    fn format(&self, project: &Project) -> String;
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use drydock_core::graph::{ResourceGraph, ResourceGroup};
    use drydock_core::Project;

    /// Builds a minimal `Project` around a graph described as
    /// `(name, depend)` pairs, for formatter tests that only care about
    /// group wiring, not resolved resource files.
    pub(crate) fn fixture_project(pairs: &[(&str, &[&str])]) -> Project {
        let mut resource_groups = BTreeMap::new();
        let mut root_nodes = Vec::new();
        for (name, depend) in pairs {
            if depend.is_empty() {
                root_nodes.push((*name).to_string());
            }
            resource_groups.insert(
                (*name).to_string(),
                ResourceGroup {
                    name: (*name).to_string(),
                    resource_files: Vec::new(),
                    depend: depend.iter().map(|s| s.to_string()).collect(),
                    wait: Vec::new(),
                    children: Vec::new(),
                },
            );
        }
        for name in resource_groups.keys().cloned().collect::<Vec<_>>() {
            let depend = resource_groups[&name].depend.clone();
            for dep in depend {
                resource_groups.get_mut(&dep).unwrap().children.push(name.clone());
            }
        }
        for group in resource_groups.values_mut() {
            group.children.sort();
        }
        root_nodes.sort();
        let leaf_nodes = resource_groups.values().filter(|g| g.children.is_empty()).map(|g| g.name.clone()).collect();
        let resource_graph = ResourceGraph { resource_groups, root_nodes, leaf_nodes };
        Project {
            root_dir: PathBuf::from("."),
            namespace: "demo".to_string(),
            context: String::new(),
            kube_config: String::new(),
            variables: BTreeMap::new(),
            credentials: Vec::new(),
            resource_graph,
            filter: None,
        }
    }
}
