//! A thin wrapper around the `kubectl` binary. No Kubernetes client library
//! is linked in: every verb ends up here as an argv vector and an exit code.

use std::env;
use std::process::{Command, Stdio};

use failure::{Backtrace, Context, Fail};

#[derive(Debug)]
pub struct BackendError {
    inner: Context<BErrKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum BErrKind {
    #[fail(display = "missing command {:?}", _0)]
    MissingCommand(String),
    #[fail(display = "command execution failed, exit code {}: {}", _0, _1)]
    CommandExecute(i32, String),
    #[fail(display = "cannot spawn kubectl")]
    SpawnFailure,
}

impl Fail for BackendError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}
impl From<BErrKind> for BackendError {
    fn from(kind: BErrKind) -> BackendError {
        BackendError { inner: Context::new(kind) }
    }
}

pub type Result<T> = std::result::Result<T, failure::Error>;

/// Outcome of a captured, non-interactive `kubectl get ... -o yaml`.
pub enum GetOutcome {
    NotExist,
    Found(String),
}

/// Holds the `--context`/`--kubeconfig`/`-n` triple every `kubectl`
/// invocation is completed with.
#[derive(Debug, Clone)]
pub struct Backend {
    namespace: String,
    context: String,
    kube_config: String,
}

impl Backend {
    pub fn new(namespace: &str, context: &str, kube_config: &str) -> Result<Backend> {
        let backend = Backend {
            namespace: namespace.to_string(),
            context: context.to_string(),
            kube_config: kube_config.to_string(),
        };
        backend.check_deps()?;
        Ok(backend)
    }

    fn check_deps(&self) -> Result<()> {
        let status = Command::new("which")
            .arg("kubectl")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => Ok(()),
            _ => Err(BackendError::from(BErrKind::MissingCommand("kubectl".to_string())).into()),
        }
    }

    fn complete_args_without_namespace(&self, mut args: Vec<String>) -> Vec<String> {
        if !self.context.is_empty() {
            args.push("--context".to_string());
            args.push(self.context.clone());
        }
        if !self.kube_config.is_empty() {
            args.push("--kubeconfig".to_string());
            args.push(self.kube_config.clone());
        }
        args
    }

    fn complete_args(&self, mut args: Vec<String>) -> Vec<String> {
        if !self.namespace.is_empty() {
            args.push("-n".to_string());
            args.push(self.namespace.clone());
        }
        self.complete_args_without_namespace(args)
    }

    /// Run `kubectl` with output captured in memory, never shown to the
    /// user. Used for internal status queries and polling.
    fn run_captured(&self, args: Vec<String>) -> Result<(i32, String, String)> {
        let output = Command::new("kubectl")
            .args(&args)
            .output()
            .map_err(|_| BackendError::from(BErrKind::SpawnFailure))?;
        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Ok((code, stdout, stderr))
    }

    /// Run `kubectl` for a user-facing verb (apply, delete, logs, ...). Output
    /// is streamed straight to the terminal unless `SILENCE_OUTPUT` is set to
    /// `true`/`1`, matching the teacher's all-or-nothing redirect.
    fn run_visible(&self, args: Vec<String>) -> Result<i32> {
        let silent = env::var("SILENCE_OUTPUT").map(|v| v == "true" || v == "1").unwrap_or(false);
        let mut cmd = Command::new("kubectl");
        cmd.args(&args);
        if silent {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        let status = cmd.status().map_err(|_| BackendError::from(BErrKind::SpawnFailure))?;
        Ok(status.code().unwrap_or(-1))
    }

    /// `kubectl get <kind> <name> -o yaml`, captured. `namespace` scoping is
    /// skipped for cluster-scoped kinds like `namespace` itself.
    pub fn get_yaml(&self, kind: &str, name: &str) -> Result<GetOutcome> {
        let base = vec!["get".to_string(), kind.to_string(), name.to_string(), "-o".to_string(), "yaml".to_string()];
        let args = if kind.eq_ignore_ascii_case("namespace") {
            self.complete_args_without_namespace(base)
        } else {
            self.complete_args(base)
        };
        let (code, stdout, stderr) = self.run_captured(args)?;
        if code != 0 {
            if stderr.contains("(NotFound)") {
                return Ok(GetOutcome::NotExist);
            }
            return Err(BackendError::from(BErrKind::CommandExecute(code, stderr)).into());
        }
        Ok(GetOutcome::Found(stdout))
    }

    /// `kubectl apply -f -`, piping `manifest` on stdin, streamed to the
    /// terminal.
    pub fn apply(&self, manifest: &str) -> Result<()> {
        use std::io::Write;
        let args = self.complete_args(vec!["apply".to_string(), "-f".to_string(), "-".to_string()]);
        let silent = env::var("SILENCE_OUTPUT").map(|v| v == "true" || v == "1").unwrap_or(false);
        let mut cmd = Command::new("kubectl");
        cmd.args(&args).stdin(Stdio::piped());
        if silent {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        let mut child = cmd.spawn().map_err(|_| BackendError::from(BErrKind::SpawnFailure))?;
        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(manifest.as_bytes())
            .map_err(|_| BackendError::from(BErrKind::SpawnFailure))?;
        let status = child.wait().map_err(|_| BackendError::from(BErrKind::SpawnFailure))?;
        let code = status.code().unwrap_or(-1);
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, String::new())).into());
        }
        Ok(())
    }

    /// `kubectl rollout status <kind> <name>`, a single blocking streamed call.
    pub fn rollout_status(&self, kind: &str, name: &str) -> Result<()> {
        let args = self.complete_args(vec!["rollout".to_string(), "status".to_string(), kind.to_string(), name.to_string()]);
        let code = self.run_visible(args)?;
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, String::new())).into());
        }
        Ok(())
    }

    /// `kubectl get pod <name> -o jsonpath={.spec.containers[0].name}`.
    pub fn first_container_name(&self, pod: &str) -> Result<String> {
        let args = self.complete_args(vec![
            "get".to_string(),
            "pod".to_string(),
            pod.to_string(),
            "-o".to_string(),
            "jsonpath={.spec.containers[0].name}".to_string(),
        ]);
        let (code, stdout, stderr) = self.run_captured(args)?;
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, stderr)).into());
        }
        Ok(stdout.trim().to_string())
    }

    /// `kubectl delete <kind> <name>`, streamed.
    pub fn delete(&self, kind: &str, name: &str) -> Result<()> {
        let args = self.complete_args(vec!["delete".to_string(), kind.to_string(), name.to_string()]);
        let code = self.run_visible(args)?;
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, String::new())).into());
        }
        Ok(())
    }

    /// `kubectl logs <pod> -c <container> -f [--tail <n>]`, streamed.
    pub fn logs(&self, pod: &str, container: &str, tail: Option<u32>) -> Result<()> {
        let mut base = vec!["logs".to_string(), pod.to_string(), "-c".to_string(), container.to_string(), "-f".to_string()];
        if let Some(n) = tail {
            base.push("--tail".to_string());
            base.push(n.to_string());
        }
        let args = self.complete_args(base);
        let code = self.run_visible(args)?;
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, String::new())).into());
        }
        Ok(())
    }

    /// `kubectl get pod -l <selector> -o name`, captured, returning bare pod
    /// names with the `pod/` prefix stripped.
    pub fn list_pod_names(&self, selector: &str) -> Result<Vec<String>> {
        let args = self.complete_args(vec![
            "get".to_string(),
            "pod".to_string(),
            "-l".to_string(),
            selector.to_string(),
            "-o".to_string(),
            "name".to_string(),
        ]);
        let (code, stdout, stderr) = self.run_captured(args)?;
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, stderr)).into());
        }
        Ok(stdout
            .lines()
            .map(|l| l.trim_start_matches("pod/").to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// `kubectl create ns <name>`, streamed.
    pub fn create_namespace(&self, name: &str) -> Result<()> {
        let args = self.complete_args_without_namespace(vec!["create".to_string(), "ns".to_string(), name.to_string()]);
        let code = self.run_visible(args)?;
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, String::new())).into());
        }
        Ok(())
    }

    /// `kubectl delete ns <name>`, streamed.
    pub fn delete_namespace(&self, name: &str) -> Result<()> {
        let args = self.complete_args_without_namespace(vec!["delete".to_string(), "ns".to_string(), name.to_string()]);
        let code = self.run_visible(args)?;
        if code != 0 {
            return Err(BackendError::from(BErrKind::CommandExecute(code, String::new())).into());
        }
        Ok(())
    }
}
