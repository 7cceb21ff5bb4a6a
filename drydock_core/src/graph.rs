//! The dependency graph between resource groups, and the two BFS walkers used
//! to apply or tear down a project in dependency order.
//!
//! Groups are kept in a `BTreeMap` keyed by name rather than linked through
//! pointers or a graph-library arena: group names are already the stable
//! identity the rest of the system (CLI `--variable`, wait configs, debug
//! formatters) refers to, so indirection through a second id space buys
//! nothing.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use failure::{Backtrace, Context, Fail};
use serde_derive::{Deserialize, Serialize};

use crate::resource_file::{self, Resource, ResourceFile};
use crate::template::Variables;

#[derive(Debug)]
pub struct GraphError {
    inner: Context<GErrKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum GErrKind {
    #[fail(display = "group {:?} depends on undeclared group {:?}", _0, _1)]
    MissingDependency(String, String),
    #[fail(display = "cyclic dependency detected at group {:?}", _0)]
    CyclicDependency(String),
}

impl Fail for GraphError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}
impl From<GErrKind> for GraphError {
    fn from(kind: GErrKind) -> GraphError {
        GraphError { inner: Context::new(kind) }
    }
}

pub type Result<T> = std::result::Result<T, failure::Error>;

const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitConfig {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub timeout: u64,
}

impl WaitConfig {
    pub fn timeout_secs(&self) -> u64 {
        if self.timeout == 0 {
            DEFAULT_WAIT_TIMEOUT_SECS
        } else {
            self.timeout
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceGroupConfig {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub depend: Vec<String>,
    #[serde(default)]
    pub wait: Vec<WaitConfig>,
}

#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub name: String,
    pub resource_files: Vec<ResourceFile>,
    pub depend: Vec<String>,
    pub wait: Vec<WaitConfig>,
    pub children: Vec<String>,
}

impl ResourceGroup {
    pub fn all_resources(&self) -> Vec<&Resource> {
        self.resource_files.iter().flat_map(|rf| rf.resources.iter()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceGraph {
    pub resource_groups: BTreeMap<String, ResourceGroup>,
    pub root_nodes: Vec<String>,
    pub leaf_nodes: Vec<String>,
}

/// Build the full graph: resolve each group's resource files, expand and
/// split them, then wire up children from `depend` and run a cycle check.
pub fn read_resource_graph(
    root_dir: &Path,
    group_configs: &[ResourceGroupConfig],
    variables: &Variables,
    include_resources: &[String],
    exclude_resources: &[String],
) -> Result<ResourceGraph> {
    let mut resource_groups = BTreeMap::new();
    let mut root_nodes = Vec::new();

    for gc in group_configs {
        let mut files = resource_file::resolve_resource_files(
            root_dir,
            &gc.resources,
            &gc.excludes,
            include_resources,
            exclude_resources,
        )?;
        for rf in &mut files {
            resource_file::process_resource_file(rf, variables)?;
        }

        if gc.depend.is_empty() {
            root_nodes.push(gc.name.clone());
        }

        resource_groups.insert(
            gc.name.clone(),
            ResourceGroup {
                name: gc.name.clone(),
                resource_files: files,
                depend: gc.depend.clone(),
                wait: gc.wait.clone(),
                children: Vec::new(),
            },
        );
    }

    root_nodes.sort();
    let mut graph = ResourceGraph { resource_groups, root_nodes, leaf_nodes: Vec::new() };
    resolve_children(&mut graph)?;
    cyclic_check(&graph)?;
    Ok(graph)
}

fn resolve_children(graph: &mut ResourceGraph) -> Result<()> {
    let names: Vec<String> = graph.resource_groups.keys().cloned().collect();
    for name in &names {
        let depend = graph.resource_groups[name].depend.clone();
        for dep in &depend {
            if !graph.resource_groups.contains_key(dep) {
                return Err(GraphError::from(GErrKind::MissingDependency(name.clone(), dep.clone())).into());
            }
            graph.resource_groups.get_mut(dep).unwrap().children.push(name.clone());
        }
    }
    for group in graph.resource_groups.values_mut() {
        group.children.sort();
    }
    graph.leaf_nodes = graph
        .resource_groups
        .values()
        .filter(|g| g.children.is_empty())
        .map(|g| g.name.clone())
        .collect();
    graph.leaf_nodes.sort();
    Ok(())
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Color {
    White,
    Gray,
    Black,
}

fn cyclic_check(graph: &ResourceGraph) -> Result<()> {
    let mut colors: BTreeMap<&str, Color> =
        graph.resource_groups.keys().map(|n| (n.as_str(), Color::White)).collect();
    let names: Vec<&str> = graph.resource_groups.keys().map(|s| s.as_str()).collect();
    for name in names {
        if colors[name] == Color::White {
            cyclic_dfs(graph, name, &mut colors)?;
        }
    }
    Ok(())
}

fn cyclic_dfs<'a>(graph: &'a ResourceGraph, current: &'a str, colors: &mut BTreeMap<&'a str, Color>) -> Result<()> {
    colors.insert(current, Color::Gray);
    for neighbor in &graph.resource_groups[current].children {
        match colors.get(neighbor.as_str()) {
            Some(Color::Black) => continue,
            Some(Color::Gray) => return Err(GraphError::from(GErrKind::CyclicDependency(neighbor.clone())).into()),
            _ => cyclic_dfs(graph, neighbor.as_str(), colors)?,
        }
    }
    colors.insert(current, Color::Black);
    Ok(())
}

/// BFS from the root nodes, visiting a group only once all its dependencies
/// have been visited.
pub fn walk_forward<F>(graph: &ResourceGraph, mut f: F) -> Result<()>
where
    F: FnMut(&ResourceGroup) -> Result<()>,
{
    let mut candidates: VecDeque<String> = graph.root_nodes.iter().cloned().collect();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    while let Some(current) = candidates.pop_front() {
        if !visited.contains(&current) {
            let group = &graph.resource_groups[&current];
            let deps_visited = group.depend.iter().all(|d| visited.contains(d));
            if deps_visited {
                f(group)?;
                visited.insert(current.clone());
            } else {
                candidates.push_back(current.clone());
                continue;
            }
        }
        for child in &graph.resource_groups[&current].children {
            candidates.push_back(child.clone());
        }
    }
    Ok(())
}

/// BFS from the leaf nodes, visiting a group only once all its children have
/// been visited. Used for teardown.
pub fn walk_backward<F>(graph: &ResourceGraph, mut f: F) -> Result<()>
where
    F: FnMut(&ResourceGroup) -> Result<()>,
{
    let mut candidates: VecDeque<String> = graph.leaf_nodes.iter().cloned().collect();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    while let Some(current) = candidates.pop_front() {
        if !visited.contains(&current) {
            let group = &graph.resource_groups[&current];
            let children_visited = group.children.iter().all(|d| visited.contains(d));
            if children_visited {
                f(group)?;
                visited.insert(current.clone());
            } else {
                candidates.push_back(current.clone());
                continue;
            }
        }
        for dep in &graph.resource_groups[&current].depend {
            candidates.push_back(dep.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, depend: &[&str]) -> ResourceGroup {
        ResourceGroup {
            name: name.to_string(),
            resource_files: Vec::new(),
            depend: depend.iter().map(|s| s.to_string()).collect(),
            wait: Vec::new(),
            children: Vec::new(),
        }
    }

    fn build(pairs: &[(&str, &[&str])]) -> ResourceGraph {
        let mut resource_groups = BTreeMap::new();
        let mut root_nodes = Vec::new();
        for (name, depend) in pairs {
            if depend.is_empty() {
                root_nodes.push(name.to_string());
            }
            resource_groups.insert(name.to_string(), group(name, depend));
        }
        root_nodes.sort();
        let mut graph = ResourceGraph { resource_groups, root_nodes, leaf_nodes: Vec::new() };
        resolve_children(&mut graph).unwrap();
        graph
    }

    #[test]
    fn missing_dependency_is_an_error() {
        let mut resource_groups = BTreeMap::new();
        resource_groups.insert("a".to_string(), group("a", &["b"]));
        let mut graph = ResourceGraph { resource_groups, root_nodes: Vec::new(), leaf_nodes: Vec::new() };
        assert!(resolve_children(&mut graph).is_err());
    }

    #[test]
    fn linear_chain_walks_in_order() {
        let graph = build(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        cyclic_check(&graph).unwrap();
        let mut order = Vec::new();
        walk_forward(&graph, |g| {
            order.push(g.name.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_detected() {
        let graph = build(&[("a", &["b"]), ("b", &["a"])]);
        assert!(cyclic_check(&graph).is_err());
    }

    #[test]
    fn backward_walk_tears_down_leaves_first() {
        let graph = build(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let mut order = Vec::new();
        walk_backward(&graph, |g| {
            order.push(g.name.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(order, vec!["c", "b", "a"]);
    }
}
