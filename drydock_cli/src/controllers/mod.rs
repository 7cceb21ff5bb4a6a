//! Controllers drive the backend through the status lattice to make the
//! create/skip/wait/apply/delete decisions described for each verb.

pub mod namespace;
pub mod resource;

use std::thread;
use std::time::Duration;

use failure::{Backtrace, Context, Fail};

use crate::backend::Backend;
use drydock_core::status::{self, Status};
use drydock_core::Resource;

#[derive(Debug)]
pub struct ControllerError {
    inner: Context<CErrKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum CErrKind {
    #[fail(display = "unknown status for {} {:?}", _0, _1)]
    UnknownStatus(String, String),
    #[fail(display = "timeout reached waiting on {} {:?}", _0, _1)]
    Timeout(String, String),
    #[fail(display = "unsupported kind: {}", _0)]
    UnsupportedKind(String),
}

impl Fail for ControllerError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}
impl From<CErrKind> for ControllerError {
    fn from(kind: CErrKind) -> ControllerError {
        ControllerError { inner: Context::new(kind) }
    }
}

pub type Result<T> = std::result::Result<T, failure::Error>;

pub(crate) const TERMINATE_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub(crate) const TERMINATE_POLL_LIMIT: u32 = 40;
pub(crate) const EXISTENCE_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub(crate) const EXISTENCE_POLL_LIMIT: u32 = 10;
pub(crate) const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A thin, read-only status query over the backend, used internally by
/// `wait`/`logs`/`debug` and exposed for callers that just want a classified
/// status for a resource without driving a create/delete/update decision.
pub fn status_lookup(backend: &Backend, kind: &str, name: &str) -> Result<Status> {
    get_status(backend, kind, name)
}

pub(crate) fn get_status(backend: &Backend, kind: &str, name: &str) -> Result<Status> {
    use crate::backend::GetOutcome;
    match backend.get_yaml(kind, name)? {
        GetOutcome::NotExist => Ok(Status::NotExist),
        GetOutcome::Found(yaml) => Ok(status::classify(kind, &yaml)),
    }
}

/// Poll until `status` transitions away from `Terminating`, at most
/// `TERMINATE_POLL_LIMIT` attempts.
pub(crate) fn wait_out_of_terminating(backend: &Backend, kind: &str, name: &str) -> Result<Status> {
    let mut status = get_status(backend, kind, name)?;
    let mut attempts = 0;
    while status == Status::Terminating {
        if attempts >= TERMINATE_POLL_LIMIT {
            return Err(ControllerError::from(CErrKind::Timeout(kind.to_string(), name.to_string())).into());
        }
        thread::sleep(TERMINATE_POLL_INTERVAL);
        attempts += 1;
        status = get_status(backend, kind, name)?;
    }
    Ok(status)
}

/// Resolve a status, waiting out any `Terminating` phase first.
pub(crate) fn resolve_status(backend: &Backend, kind: &str, name: &str) -> Result<Status> {
    let status = get_status(backend, kind, name)?;
    if status == Status::Terminating {
        wait_out_of_terminating(backend, kind, name)
    } else {
        Ok(status)
    }
}

/// The "ready" readiness callback used by `Up`/`Down`: poll until the
/// resource reaches (or leaves) existence, every 3s, 10 attempts.
pub fn wait_for_readiness(backend: &Backend, resource: &Resource, want_exists: bool) -> Result<()> {
    let mut attempts = 0;
    loop {
        let status = get_status(backend, &resource.kind, &resource.name)?;
        let exists = status != Status::NotExist;
        if exists == want_exists {
            return Ok(());
        }
        if attempts >= EXISTENCE_POLL_LIMIT {
            return Err(crate::walker::WalkerError::wait_timeout(resource.name.clone(), resource.kind.clone()).into());
        }
        thread::sleep(EXISTENCE_POLL_INTERVAL);
        attempts += 1;
    }
}
