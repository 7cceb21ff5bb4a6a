//! The project descriptor (`drydock.yaml`-equivalent) and the variable
//! precedence chain that feeds both it and every resource file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use failure::{Backtrace, Context, Fail, ResultExt};
use serde_derive::{Deserialize, Serialize};

use crate::graph::{self, ResourceGraph, ResourceGroupConfig};
use crate::template::{self, Variables};

#[derive(Debug)]
pub struct ProjectError {
    inner: Context<PErrKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum PErrKind {
    #[fail(display = "cannot read project file {:?}", _0)]
    UnreadableProjectFile(PathBuf),
    #[fail(display = "cannot parse project configuration: {}", _0)]
    BadConfig(String),
    #[fail(display = "cannot read docker credential password file {:?}", _0)]
    UnreadablePasswordFile(PathBuf),
    #[fail(display = "docker credential requires a non-empty username and host")]
    InvalidCredential,
}

impl Fail for ProjectError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}
impl From<PErrKind> for ProjectError {
    fn from(kind: PErrKind) -> ProjectError {
        ProjectError { inner: Context::new(kind) }
    }
}

pub type Result<T> = std::result::Result<T, failure::Error>;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfig {
    pub username: String,
    pub host: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_file: String,
}

#[derive(Debug, Clone)]
pub struct DockerCredential {
    pub username: String,
    pub host: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroupConfig>,
    #[serde(default)]
    pub delete_namespace: bool,
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
}

fn default_root_dir() -> String {
    ".".to_string()
}

impl Config {
    /// A minimal, commented-free skeleton used by the `generate` verb: two
    /// example groups, the second depending on and waiting for the first.
    pub fn skeleton(namespace: &str) -> Config {
        let mut variables = BTreeMap::new();
        variables.insert("key".to_string(), "value".to_string());
        variables.insert("envKey".to_string(), "$(ENV_VAR)".to_string());
        variables.insert("dynamicVar".to_string(), "{{ dynamicVar }}".to_string());
        Config {
            root_dir: ".".to_string(),
            namespace: namespace.to_string(),
            variables,
            resource_groups: vec![
                ResourceGroupConfig {
                    name: "group1".to_string(),
                    resources: vec!["path/to/group1/*.yml".to_string()],
                    excludes: vec!["path/to/group1/exclude*".to_string()],
                    depend: Vec::new(),
                    wait: Vec::new(),
                },
                ResourceGroupConfig {
                    name: "group2".to_string(),
                    resources: vec!["path/to/group2/*.yml".to_string()],
                    excludes: vec!["**/exclude*".to_string()],
                    depend: vec!["group1".to_string()],
                    wait: vec![crate::graph::WaitConfig { name: "job1".to_string(), kind: "job".to_string(), timeout: 0 }],
                },
            ],
            delete_namespace: false,
            credentials: Vec::new(),
        }
    }

    pub fn write_skeleton(&self, w: &mut dyn std::io::Write) -> Result<()> {
        let out = serde_yaml::to_string(self).context(PErrKind::BadConfig("cannot encode config".to_string()))?;
        w.write_all(out.as_bytes()).context(PErrKind::BadConfig("cannot write config".to_string()))?;
        Ok(())
    }
}

/// Read and template-expand the descriptor itself, using only the
/// externally-supplied `variables` (the descriptor's own `variables:` block
/// and the system variables are not available yet at this point).
pub fn read_project_config(project_file: &Path, variables: &Variables) -> Result<Config> {
    let content = fs::read_to_string(project_file)
        .map_err(|_| ProjectError::from(PErrKind::UnreadableProjectFile(project_file.to_path_buf())))?;
    let context_dir = project_file.parent().unwrap_or_else(|| Path::new("."));
    let name = project_file.to_string_lossy().into_owned();
    let expanded = template::execute_template_content(context_dir, &name, &content, variables)?;
    let config: Config = serde_yaml::from_str(&expanded)
        .map_err(|e| ProjectError::from(PErrKind::BadConfig(e.to_string())))?;
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct Project {
    pub root_dir: PathBuf,
    pub namespace: String,
    pub context: String,
    pub kube_config: String,
    pub variables: Variables,
    pub credentials: Vec<DockerCredential>,
    pub resource_graph: ResourceGraph,
    /// Optional predicate on `ResourceGroup` used by debug printers. Unset
    /// at construction time; the only field `ReadProject` leaves mutable
    /// afterward, set by debug callers via `set_filter`.
    pub filter: Option<crate::filter::GroupFilter>,
}

impl Project {
    pub fn set_filter(&mut self, filter: crate::filter::GroupFilter) {
        self.filter = Some(filter);
    }

    /// Whether the resource group named `name` should be shown, per the
    /// current filter (unset means everything is shown).
    pub fn group_is_visible(&self, name: &str) -> bool {
        self.filter.as_ref().map(|f| f.matches(name)).unwrap_or(true)
    }
}

fn merge_maps(layers: &[&Variables]) -> Variables {
    let mut out = Variables::new();
    for layer in layers {
        for (k, v) in layer.iter() {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

/// Load an optional `.env`-style file at `root_dir/.env`; absent files are
/// not an error, they simply contribute nothing.
fn load_dotenv(root_dir: &Path) -> Variables {
    let mut vars = Variables::new();
    let dotenv_path = root_dir.join(".env");
    if let Ok(iter) = dotenvy::from_path_iter(&dotenv_path) {
        for item in iter {
            if let Ok((k, v)) = item {
                vars.insert(k, v);
            }
        }
    }
    vars
}

/// Read a full project: descriptor, variable precedence chain, docker
/// credentials, and the resource graph they all feed into.
///
/// Precedence, lowest to highest: `.env` file, CLI `--variable` flags,
/// descriptor `variables:`, then the `rivendellVar*` system variables, which
/// always win.
pub fn read_project(
    project_file: &Path,
    namespace: &str,
    context: &str,
    kube_config: &str,
    cli_variables: &Variables,
    include_resources: &[String],
    exclude_resources: &[String],
) -> Result<Project> {
    let config = read_project_config(project_file, cli_variables)?;

    let project_file_dir = project_file.parent().unwrap_or_else(|| Path::new("."));
    let root_dir = project_file_dir.join(&config.root_dir);

    let resolved_namespace = if !namespace.is_empty() { namespace.to_string() } else { config.namespace.clone() };

    let dotenv_vars = load_dotenv(&root_dir);
    let mut system_vars = Variables::new();
    system_vars.insert("rivendellVarNamespace".to_string(), resolved_namespace.clone());
    system_vars.insert("rivendellVarContext".to_string(), context.to_string());
    system_vars.insert("rivendellVarKubeConfig".to_string(), kube_config.to_string());
    system_vars.insert("rivendellVarRootDir".to_string(), root_dir.to_string_lossy().into_owned());

    let variables = merge_maps(&[&dotenv_vars, cli_variables, &config.variables, &system_vars]);

    let mut credentials = Vec::new();
    for cred in &config.credentials {
        if cred.username.is_empty() || cred.host.is_empty() {
            return Err(ProjectError::from(PErrKind::InvalidCredential).into());
        }
        let password = if cred.password_file.is_empty() {
            cred.password.clone()
        } else {
            let password_file = root_dir.join(&cred.password_file);
            fs::read_to_string(&password_file)
                .map_err(|_| ProjectError::from(PErrKind::UnreadablePasswordFile(password_file.clone())))?
                .trim()
                .to_string()
        };
        credentials.push(DockerCredential { username: cred.username.clone(), host: cred.host.clone(), password });
    }

    let resource_graph =
        graph::read_resource_graph(&root_dir, &config.resource_groups, &variables, include_resources, exclude_resources)?;

    Ok(Project {
        root_dir,
        namespace: resolved_namespace,
        context: context.to_string(),
        kube_config: kube_config.to_string(),
        variables,
        credentials,
        resource_graph,
        filter: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn merge_maps_respects_precedence() {
        let mut low: Variables = Variables::new();
        low.insert("a".to_string(), "low".to_string());
        let mut high: Variables = Variables::new();
        high.insert("a".to_string(), "high".to_string());
        let merged = merge_maps(&[&low, &high]);
        assert_eq!(merged.get("a").unwrap(), "high");
    }

    #[test]
    fn read_project_resolves_variables_and_graph() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("resources")).unwrap();
        fs::write(
            dir.path().join("resources/cfg.yaml"),
            "kind: ConfigMap\nmetadata:\n  name: cfg\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("drydock.yaml"),
            "root_dir: .\nnamespace: demo\nresource_groups:\n- name: default\n  resources:\n  - resources/*.yaml\n",
        )
        .unwrap();
        let project_file = dir.path().join("drydock.yaml");
        let cli_vars = Variables::new();
        let project = read_project(&project_file, "", "minikube", "", &cli_vars, &[], &[]).unwrap();
        assert_eq!(project.namespace, "demo");
        assert_eq!(project.variables.get("rivendellVarNamespace").unwrap(), "demo");
        assert_eq!(project.resource_graph.resource_groups.len(), 1);
    }

    #[test]
    fn credential_with_empty_username_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("drydock.yaml"),
            "root_dir: .\nnamespace: demo\nresource_groups: []\ncredentials:\n- username: \"\"\n  host: registry.example.com\n  password: secret\n",
        )
        .unwrap();
        let project_file = dir.path().join("drydock.yaml");
        let cli_vars = Variables::new();
        let err = read_project(&project_file, "", "", "", &cli_vars, &[], &[]).unwrap_err();
        assert!(err.to_string().contains("non-empty username and host"));
    }

    #[test]
    fn descriptor_variables_override_cli_variables() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("drydock.yaml"),
            "root_dir: .\nnamespace: demo\nresource_groups: []\nvariables:\n  key: fromconfig\n",
        )
        .unwrap();
        let project_file = dir.path().join("drydock.yaml");
        let mut cli_vars = Variables::new();
        cli_vars.insert("key".to_string(), "fromcli".to_string());
        let project = read_project(&project_file, "", "", "", &cli_vars, &[], &[]).unwrap();
        assert_eq!(project.variables.get("key").unwrap(), "fromconfig");
    }

    #[test]
    fn command_line_namespace_overrides_descriptor() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("drydock.yaml"),
            "root_dir: .\nnamespace: fromconfig\nresource_groups: []\n",
        )
        .unwrap();
        let project_file = dir.path().join("drydock.yaml");
        let cli_vars = Variables::new();
        let project = read_project(&project_file, "fromcli", "", "", &cli_vars, &[], &[]).unwrap();
        assert_eq!(project.namespace, "fromcli");
    }
}
