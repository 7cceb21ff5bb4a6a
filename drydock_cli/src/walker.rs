//! Forward/backward BFS over a `drydock_core::ResourceGraph`, with
//! readiness callbacks and the wait gate: a one-shot race between a
//! background poll and a timer.

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use failure::{Backtrace, Context, Fail};

use drydock_core::graph::{self, ResourceGraph, ResourceGroup};
use drydock_core::{Resource, WaitConfig};

#[derive(Debug)]
pub struct WalkerError {
    inner: Context<WErrKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum WErrKind {
    #[fail(display = "wait timeout for {} {:?}", _0, _1)]
    WaitTimeout(String, String),
    #[fail(display = "wait failed for {} {:?}", _0, _1)]
    WaitFailed(String, String),
}

impl Fail for WalkerError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl std::fmt::Display for WalkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}
impl From<WErrKind> for WalkerError {
    fn from(kind: WErrKind) -> WalkerError {
        WalkerError { inner: Context::new(kind) }
    }
}

impl WalkerError {
    pub fn wait_timeout(name: String, kind: String) -> WalkerError {
        WalkerError::from(WErrKind::WaitTimeout(name, kind))
    }
    pub fn wait_failed(name: String, kind: String) -> WalkerError {
        WalkerError::from(WErrKind::WaitFailed(name, kind))
    }
}

pub type Result<T> = std::result::Result<T, failure::Error>;

/// Race `task` (run on a background thread, never cancelled) against a
/// `timeout` timer. Whichever resolves first wins; the thread that loses
/// the race keeps running to completion with its result discarded.
pub fn wait_gate<F>(timeout: Duration, name: String, kind: String, task: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(task());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(WalkerError::wait_timeout(name, kind).into()),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(WalkerError::wait_timeout(name, kind).into()),
    }
}

/// Forward BFS with readiness gating: before visiting group `g`, every
/// not-yet-ready predecessor's resources are reported via `ready` exactly
/// once, then every `WaitConfig` on `g` is raced through `wait`.
pub fn walk_forward_with_wait<V, R, W>(
    graph: &ResourceGraph,
    mut visit: V,
    mut ready: R,
    mut wait: W,
) -> Result<()>
where
    V: FnMut(&ResourceGroup) -> Result<()>,
    R: FnMut(&Resource, &ResourceGroup) -> Result<()>,
    W: FnMut(&WaitConfig) -> Result<()>,
{
    let mut ready_groups: BTreeSet<String> = BTreeSet::new();
    let mut ready_resources: BTreeSet<(String, usize)> = BTreeSet::new();

    graph::walk_forward(graph, |g| {
        for dep_name in &g.depend {
            let dep_group = &graph.resource_groups[dep_name];
            if !ready_groups.contains(dep_name) {
                for (idx, r) in dep_group.all_resources().into_iter().enumerate() {
                    let key = (dep_name.clone(), idx);
                    if !ready_resources.contains(&key) {
                        ready(r, dep_group)?;
                        ready_resources.insert(key);
                    }
                }
                ready_groups.insert(dep_name.clone());
            }
        }
        for w in &g.wait {
            wait(w)?;
        }
        visit(g)
    })
}

/// Backward BFS with readiness gating, same shape without waits.
pub fn walk_backward_with_wait<V, R>(graph: &ResourceGraph, mut visit: V, mut ready: R) -> Result<()>
where
    V: FnMut(&ResourceGroup) -> Result<()>,
    R: FnMut(&Resource, &ResourceGroup) -> Result<()>,
{
    let mut ready_groups: BTreeSet<String> = BTreeSet::new();
    let mut ready_resources: BTreeSet<(String, usize)> = BTreeSet::new();

    graph::walk_backward(graph, |g| {
        for child_name in &g.children {
            let child_group = &graph.resource_groups[child_name];
            if !ready_groups.contains(child_name) {
                for (idx, r) in child_group.all_resources().into_iter().enumerate() {
                    let key = (child_name.clone(), idx);
                    if !ready_resources.contains(&key) {
                        ready(r, child_group)?;
                        ready_resources.insert(key);
                    }
                }
                ready_groups.insert(child_name.clone());
            }
        }
        visit(g)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[test]
    fn wait_gate_returns_task_result_when_fast() {
        let result = wait_gate(Duration::from_secs(5), "n".to_string(), "k".to_string(), || Ok(()));
        assert!(result.is_ok());
    }

    #[test]
    fn wait_gate_times_out_when_task_is_slow() {
        let result = wait_gate(Duration::from_millis(20), "n".to_string(), "k".to_string(), || {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        });
        assert!(result.is_err());
    }

    fn group(name: &str, depend: &[&str], wait: Vec<WaitConfig>) -> ResourceGroup {
        ResourceGroup {
            name: name.to_string(),
            resource_files: Vec::new(),
            depend: depend.iter().map(|s| s.to_string()).collect(),
            wait,
            children: Vec::new(),
        }
    }

    /// Diamond: `base` is depended on by both `left` and `right`, which are
    /// both depended on by `top`; `top` additionally waits on a job.
    fn diamond_with_wait() -> ResourceGraph {
        let mut resource_groups = BTreeMap::new();
        resource_groups.insert("base".to_string(), group("base", &[], Vec::new()));
        resource_groups.insert("left".to_string(), group("left", &["base"], Vec::new()));
        resource_groups.insert("right".to_string(), group("right", &["base"], Vec::new()));
        resource_groups.insert(
            "top".to_string(),
            group("top", &["left", "right"], vec![WaitConfig { name: "job1".to_string(), kind: "job".to_string(), timeout: 5 }]),
        );
        let mut graph = ResourceGraph { resource_groups, root_nodes: vec!["base".to_string()], leaf_nodes: Vec::new() };
        graph.resource_groups.get_mut("base").unwrap().children = vec!["left".to_string(), "right".to_string()];
        graph.resource_groups.get_mut("left").unwrap().children = vec!["top".to_string()];
        graph.resource_groups.get_mut("right").unwrap().children = vec!["top".to_string()];
        graph.leaf_nodes = vec!["top".to_string()];
        graph
    }

    #[test]
    fn forward_walk_reports_each_dependency_ready_once_and_waits_before_visiting() {
        let graph = diamond_with_wait();
        let mut ready_calls: Vec<String> = Vec::new();
        let mut wait_calls: Vec<String> = Vec::new();
        let mut visited: Vec<String> = Vec::new();

        walk_forward_with_wait(
            &graph,
            |g| {
                visited.push(g.name.clone());
                Ok(())
            },
            |_r, g| {
                ready_calls.push(g.name.clone());
                Ok(())
            },
            |w| {
                wait_calls.push(w.name.clone());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(visited, vec!["base", "left", "right", "top"]);
        assert_eq!(wait_calls, vec!["job1"]);
        // No resources attached to any group in this fixture, so `ready` never
        // actually fires -- this asserts it simply never double-fires either.
        assert!(ready_calls.is_empty());
    }

    #[test]
    fn forward_walk_propagates_wait_failure() {
        let graph = diamond_with_wait();
        let result = walk_forward_with_wait(
            &graph,
            |_g| Ok(()),
            |_r, _g| Ok(()),
            |w| Err(WalkerError::wait_failed(w.name.clone(), w.kind.clone()).into()),
        );
        assert!(result.is_err());
    }
}
