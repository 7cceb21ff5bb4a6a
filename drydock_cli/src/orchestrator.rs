//! Glue: binds walker strategies to controller actions for each verb.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::Duration;

use log::warn;
use serde_derive::Deserialize;

use drydock_core::Project;

use crate::backend::{Backend, GetOutcome};
use crate::controllers::{self, namespace, resource};
use crate::walker::{self, WalkerError};

pub type Result<T> = std::result::Result<T, failure::Error>;

pub struct Orchestrator {
    backend: Backend,
    pub project: Project,
}

impl Orchestrator {
    pub fn new(project: Project) -> Result<Orchestrator> {
        let backend = Backend::new(&project.namespace, &project.context, &project.kube_config)?;
        Ok(Orchestrator { backend, project })
    }

    pub fn up(&self) -> Result<()> {
        if !self.project.namespace.is_empty() {
            namespace::create(&self.backend, &self.project.namespace)?;
        }
        walker::walk_forward_with_wait(
            &self.project.resource_graph,
            |g| {
                for rf in &g.resource_files {
                    for r in &rf.resources {
                        resource::create(&self.backend, r)?;
                    }
                }
                Ok(())
            },
            |r, _g| controllers::wait_for_readiness(&self.backend, r, true),
            |w| {
                let backend = self.backend.clone();
                let kind = w.kind.clone();
                let name = w.name.clone();
                walker::wait_gate(Duration::from_secs(w.timeout_secs()), name.clone(), kind.clone(), move || {
                    run_wait(&backend, &kind, &name)
                })
            },
        )
    }

    pub fn down(&self, remove_namespace: bool, remove_pvc: bool) -> Result<()> {
        walker::walk_backward_with_wait(
            &self.project.resource_graph,
            |g| {
                for rf in &g.resource_files {
                    for r in &rf.resources {
                        let k = r.kind.to_lowercase();
                        if (k == "persistentvolumeclaim" || k == "pvc") && !remove_pvc {
                            continue;
                        }
                        resource::delete(&self.backend, r)?;
                    }
                }
                Ok(())
            },
            |r, _g| controllers::wait_for_readiness(&self.backend, r, false),
        )?;

        if remove_namespace {
            let ns = &self.project.namespace;
            if ns.is_empty() || ns == "default" {
                warn!("refusing to delete namespace {:?}", ns);
            } else if let Err(e) = namespace::delete(&self.backend, ns) {
                warn!("best-effort namespace deletion failed for {:?}: {}", ns, e);
            }
        }
        Ok(())
    }

    pub fn update(&self) -> Result<()> {
        walker::walk_forward_with_wait(
            &self.project.resource_graph,
            |g| {
                for rf in &g.resource_files {
                    for r in &rf.resources {
                        resource::update(&self.backend, r)?;
                    }
                }
                Ok(())
            },
            |_r, _g| Ok(()),
            |w| {
                let backend = self.backend.clone();
                let kind = w.kind.clone();
                let name = w.name.clone();
                walker::wait_gate(Duration::from_secs(w.timeout_secs()), name.clone(), kind.clone(), move || {
                    run_wait(&backend, &kind, &name)
                })
            },
        )
    }

    pub fn upgrade(&self) -> Result<()> {
        walker::walk_forward_with_wait(
            &self.project.resource_graph,
            |g| {
                for rf in &g.resource_files {
                    for r in &rf.resources {
                        resource::upgrade(&self.backend, r)?;
                    }
                }
                Ok(())
            },
            |_r, _g| Ok(()),
            |w| {
                let backend = self.backend.clone();
                let kind = w.kind.clone();
                let name = w.name.clone();
                walker::wait_gate(Duration::from_secs(w.timeout_secs()), name.clone(), kind.clone(), move || {
                    run_wait(&backend, &kind, &name)
                })
            },
        )
    }

    /// Enumerate `service` objects in the graph, query the live selector
    /// from the backend, collect matching pods, dedupe, and delete them so
    /// the replication controller respawns them.
    pub fn restart(&self) -> Result<()> {
        let pods = self.get_service_pods()?;
        for pod in pods {
            self.backend.delete("pod", &pod)?;
        }
        Ok(())
    }

    /// Walk forward, collecting selector-matched pod names for every
    /// `service` object reachable in the graph.
    pub fn get_service_pods(&self) -> Result<BTreeSet<String>> {
        let mut pods = BTreeSet::new();
        drydock_core::graph::walk_forward(&self.project.resource_graph, |g| {
            for rf in &g.resource_files {
                for r in &rf.resources {
                    if !r.kind.eq_ignore_ascii_case("service") {
                        continue;
                    }
                    if let Some(selector) = self.fetch_service_selector(&r.name)? {
                        for pod in self.backend.list_pod_names(&selector)? {
                            pods.insert(pod);
                        }
                    }
                }
            }
            Ok(())
        })?;
        Ok(pods)
    }

    fn fetch_service_selector(&self, name: &str) -> Result<Option<String>> {
        let outcome = self.backend.get_yaml("service", name)?;
        let yaml = match outcome {
            GetOutcome::NotExist => return Ok(None),
            GetOutcome::Found(y) => y,
        };
        let info: ServiceInfo = serde_yaml::from_str(&yaml).unwrap_or_default();
        let selector = match info.spec.and_then(|s| s.selector) {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(None),
        };
        let joined = selector.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(",");
        Ok(Some(joined))
    }
}

#[derive(Debug, Deserialize, Default)]
struct ServiceInfo {
    spec: Option<ServiceSpec>,
}

#[derive(Debug, Deserialize, Default)]
struct ServiceSpec {
    selector: Option<BTreeMap<String, String>>,
}

/// Runs inside the wait gate's background thread: converts a resolved
/// `WaitOutcome` into the typed errors `§7` calls for.
fn run_wait(backend: &Backend, kind: &str, name: &str) -> Result<()> {
    use crate::controllers::resource::WaitOutcome;
    match resource::wait(backend, kind, name)? {
        WaitOutcome::Succeeded => Ok(()),
        WaitOutcome::Failed => Err(WalkerError::wait_failed(name.to_string(), kind.to_string()).into()),
        WaitOutcome::NotExist => Err(WalkerError::wait_failed(name.to_string(), kind.to_string()).into()),
    }
}
