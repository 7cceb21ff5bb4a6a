//! Resolves a resource group's `resources`/`excludes` patterns into concrete
//! [`ResourceFile`]s, then runs each one through the fixed three-stage
//! pipeline: template-expand, strip namespace lines, split into documents.

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use failure::{Backtrace, Context, Fail};
use serde_derive::Deserialize;

use crate::template::{self, Variables};

#[derive(Debug)]
pub struct ResourceFileError {
    inner: Context<RErrKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum RErrKind {
    #[fail(display = "cannot glob pattern {:?}: {}", _0, _1)]
    BadGlob(String, String),
    #[fail(display = "cannot read resource file {:?}", _0)]
    UnreadableFile(PathBuf),
    #[fail(display = "cannot fetch resource url {:?}", _0)]
    UnreachableUrl(String),
    #[fail(display = "cannot parse yaml document in {:?}", _0)]
    BadYaml(String),
}

impl Fail for ResourceFileError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl std::fmt::Display for ResourceFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}
impl From<RErrKind> for ResourceFileError {
    fn from(kind: RErrKind) -> ResourceFileError {
        ResourceFileError { inner: Context::new(kind) }
    }
}

pub type Result<T> = std::result::Result<T, failure::Error>;

/// A single Kubernetes object found inside a [`ResourceFile`]'s expanded,
/// namespace-stripped content after splitting on document separators.
#[derive(Debug, Clone)]
pub struct Resource {
    pub filepath: String,
    pub name: String,
    pub kind: String,
    pub raw_content: String,
}

/// One source (a glob match or a fetched URL), carrying it through the
/// expand/strip/split pipeline.
#[derive(Debug, Clone)]
pub struct ResourceFile {
    pub source: String,
    pub context_dir: PathBuf,
    pub raw_content: String,
    pub expanded_content: String,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Deserialize, Default)]
struct ResourceYaml {
    #[serde(default)]
    kind: String,
    metadata: Option<ResourceMetadataYaml>,
}

#[derive(Debug, Deserialize, Default)]
struct ResourceMetadataYaml {
    #[serde(default)]
    name: String,
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn prepend_root(root_dir: &Path, patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| {
            if Path::new(p).is_absolute() || is_url(p) {
                p.clone()
            } else {
                root_dir.join(p).to_string_lossy().into_owned()
            }
        })
        .collect()
}

fn glob_files(patterns: &[String]) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .map_err(|e| ResourceFileError::from(RErrKind::BadGlob(pattern.clone(), e.to_string())))?;
        for entry in matches {
            let path = entry.map_err(|e| ResourceFileError::from(RErrKind::BadGlob(pattern.clone(), e.to_string())))?;
            out.insert(path.to_string_lossy().into_owned());
        }
    }
    Ok(out)
}

/// Resolve one group's `resources` (mixing glob patterns and URLs) against
/// `root_dir`, the group's own excludes, and the project-wide include/exclude
/// filters. `global_include`, when non-empty, narrows the glob matches down
/// to their intersection with the include patterns (a resource must satisfy
/// both the group pattern and the global one).
pub fn resolve_resource_files(
    root_dir: &Path,
    group_resources: &[String],
    group_excludes: &[String],
    global_include: &[String],
    global_exclude: &[String],
) -> Result<Vec<ResourceFile>> {
    let url_patterns: Vec<String> = group_resources.iter().filter(|s| is_url(s)).cloned().collect();
    let glob_patterns: Vec<String> = group_resources.iter().filter(|s| !is_url(s)).cloned().collect();

    let glob_patterns = prepend_root(root_dir, &glob_patterns);
    let global_include = prepend_root(root_dir, global_include);
    let mut all_excludes = group_excludes.to_vec();
    all_excludes.extend(global_exclude.iter().cloned());
    let all_excludes = prepend_root(root_dir, &all_excludes);

    let mut glob_files_out = resolve_by_glob(&glob_patterns, &all_excludes, &global_include)?;
    let url_files = resolve_by_url(root_dir, &url_patterns)?;
    glob_files_out.extend(url_files);
    Ok(glob_files_out)
}

fn resolve_by_glob(include: &[String], exclude: &[String], join: &[String]) -> Result<Vec<ResourceFile>> {
    let included = glob_files(include)?;
    let excluded = glob_files(exclude)?;
    let mut paths: BTreeSet<String> = included.difference(&excluded).cloned().collect();

    if !join.is_empty() {
        let join_set = glob_files(join)?;
        paths = paths.intersection(&join_set).cloned().collect();
    }

    let mut ret = Vec::new();
    for p in paths {
        let path = Path::new(&p);
        let metadata = fs::metadata(path).map_err(|_| ResourceFileError::from(RErrKind::UnreadableFile(path.to_path_buf())))?;
        if metadata.is_dir() {
            continue;
        }
        let content = fs::read_to_string(path).map_err(|_| ResourceFileError::from(RErrKind::UnreadableFile(path.to_path_buf())))?;
        ret.push(ResourceFile {
            source: p.clone(),
            context_dir: path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
            raw_content: content,
            expanded_content: String::new(),
            resources: Vec::new(),
        });
    }
    Ok(ret)
}

fn resolve_by_url(root_dir: &Path, patterns: &[String]) -> Result<Vec<ResourceFile>> {
    let mut ret = Vec::new();
    for url in patterns {
        let mut resp = reqwest::get(url.as_str()).map_err(|_| ResourceFileError::from(RErrKind::UnreachableUrl(url.clone())))?;
        let mut content = String::new();
        resp.read_to_string(&mut content).map_err(|_| ResourceFileError::from(RErrKind::UnreachableUrl(url.clone())))?;
        ret.push(ResourceFile {
            source: url.clone(),
            context_dir: root_dir.to_path_buf(),
            raw_content: content,
            expanded_content: String::new(),
            resources: Vec::new(),
        });
    }
    Ok(ret)
}

/// Run the three-stage pipeline over `rf` in place: expand against `vars`,
/// strip literal `"  namespace:"` lines, then split into [`Resource`]s.
pub fn process_resource_file(rf: &mut ResourceFile, vars: &Variables) -> Result<()> {
    let name = rf.source.clone();
    rf.expanded_content = template::execute_template_content(&rf.context_dir, &name, &rf.raw_content, vars)?;
    strip_namespace(rf);
    split_resources(rf)?;
    Ok(())
}

fn strip_namespace(rf: &mut ResourceFile) {
    let mut stripped = String::new();
    for line in rf.expanded_content.lines() {
        if !line.starts_with("  namespace:") {
            stripped.push_str(line);
            stripped.push('\n');
        }
    }
    rf.expanded_content = stripped;
}

fn split_resources(rf: &mut ResourceFile) -> Result<()> {
    for part in rf.expanded_content.split("---\n") {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let parsed: ResourceYaml = serde_yaml::from_str(part)
            .map_err(|_| ResourceFileError::from(RErrKind::BadYaml(rf.source.clone())))?;
        let name = parsed.metadata.map(|m| m.name).unwrap_or_default();
        rf.resources.push(Resource {
            filepath: rf.source.clone(),
            name,
            kind: parsed.kind,
            raw_content: part.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn strips_only_literal_two_space_namespace_lines() {
        let mut rf = ResourceFile {
            source: "x.yaml".to_string(),
            context_dir: PathBuf::from("."),
            raw_content: String::new(),
            expanded_content: "metadata:\n  namespace: foo\n  name: bar\n".to_string(),
            resources: Vec::new(),
        };
        strip_namespace(&mut rf);
        assert_eq!(rf.expanded_content, "metadata:\nname: bar\n");
    }

    #[test]
    fn splits_multi_document_yaml() {
        let mut rf = ResourceFile {
            source: "x.yaml".to_string(),
            context_dir: PathBuf::from("."),
            raw_content: String::new(),
            expanded_content: "kind: ConfigMap\nmetadata:\nname: a\n---\nkind: Secret\nmetadata:\nname: b\n".to_string(),
            resources: Vec::new(),
        };
        split_resources(&mut rf).unwrap();
        assert_eq!(rf.resources.len(), 2);
        assert_eq!(rf.resources[0].kind, "ConfigMap");
        assert_eq!(rf.resources[1].kind, "Secret");
    }

    #[test]
    fn resolves_glob_and_applies_excludes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "kind: ConfigMap\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "kind: Secret\n").unwrap();
        let pattern = dir.path().join("*.yaml").to_string_lossy().into_owned();
        let exclude = dir.path().join("b.yaml").to_string_lossy().into_owned();
        let files = resolve_resource_files(dir.path(), &[pattern], &[exclude], &[], &[]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].source.ends_with("a.yaml"));
    }

    #[test]
    fn global_include_narrows_to_its_intersection_with_group_glob() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "kind: ConfigMap\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "kind: Secret\n").unwrap();
        let group_pattern = dir.path().join("*.yaml").to_string_lossy().into_owned();
        let global_include = dir.path().join("a.yaml").to_string_lossy().into_owned();
        let files = resolve_resource_files(dir.path(), &[group_pattern], &[], &[global_include], &[]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].source.ends_with("a.yaml"));
    }

    #[test]
    fn process_pipeline_expands_strips_and_splits() {
        let dir = tempdir().unwrap();
        let mut rf = ResourceFile {
            source: "x.yaml".to_string(),
            context_dir: dir.path().to_path_buf(),
            raw_content: "kind: ConfigMap\nmetadata:\n  namespace: {{ ns }}\n  name: cfg\n".to_string(),
            expanded_content: String::new(),
            resources: Vec::new(),
        };
        let mut vars: Variables = BTreeMap::new();
        vars.insert("ns".to_string(), "prod".to_string());
        process_resource_file(&mut rf, &vars).unwrap();
        assert_eq!(rf.resources.len(), 1);
        assert_eq!(rf.resources[0].name, "cfg");
    }

    #[test]
    fn url_pattern_is_fetched_and_expanded_against_root_dir() {
        let _m = mockito::mock("GET", "/nginx-deployment.yaml")
            .with_status(200)
            .with_body("kind: Deployment\nmetadata:\n  name: nginx-deployment\n")
            .create();
        let url = format!("{}/nginx-deployment.yaml", mockito::server_url());

        let dir = tempdir().unwrap();
        let files = resolve_resource_files(dir.path(), &[url.clone()], &[], &[], &[]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].source, url);
        assert_eq!(files[0].context_dir, dir.path());

        let vars: Variables = BTreeMap::new();
        let mut rf = files.into_iter().next().unwrap();
        process_resource_file(&mut rf, &vars).unwrap();
        assert_eq!(rf.resources.len(), 1);
        assert_eq!(rf.resources[0].kind, "Deployment");
        assert_eq!(rf.resources[0].name, "nginx-deployment");
    }
}
