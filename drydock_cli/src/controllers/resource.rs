//! Create/Delete/Update/Upgrade/Wait/Logs for a single named resource.

use std::thread;

use drydock_core::status::Status;
use drydock_core::Resource;

use super::{get_status, resolve_status, CErrKind, ControllerError, Result, TERMINATE_POLL_INTERVAL, TERMINATE_POLL_LIMIT, WAIT_POLL_INTERVAL};
use crate::backend::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Exists,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Existed,
    NotExisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Skipped,
    NotExist,
    Existed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Succeeded,
    Failed,
    NotExist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsOutcome {
    Streamed,
    NotExist,
}

const PENDING_POLL_LIMIT: u32 = TERMINATE_POLL_LIMIT;

fn is_pod_or_job(kind: &str) -> bool {
    let k = kind.to_lowercase();
    k == "pod" || k == "job"
}

pub fn create(backend: &Backend, resource: &Resource) -> Result<CreateOutcome> {
    let status = resolve_status(backend, &resource.kind, &resource.name)?;
    match status {
        Status::Unknown => {
            Err(ControllerError::from(CErrKind::UnknownStatus(resource.kind.clone(), resource.name.clone())).into())
        }
        Status::NotExist => {
            backend.apply(&resource.raw_content)?;
            Ok(CreateOutcome::Created)
        }
        _ => Ok(CreateOutcome::Exists),
    }
}

pub fn delete(backend: &Backend, resource: &Resource) -> Result<DeleteOutcome> {
    let status = get_status(backend, &resource.kind, &resource.name)?;
    match status {
        Status::Unknown => {
            Err(ControllerError::from(CErrKind::UnknownStatus(resource.kind.clone(), resource.name.clone())).into())
        }
        Status::NotExist | Status::Terminating => Ok(DeleteOutcome::NotExisted),
        _ => {
            backend.delete(&resource.kind, &resource.name)?;
            Ok(DeleteOutcome::Existed)
        }
    }
}

pub fn update(backend: &Backend, resource: &Resource) -> Result<UpdateOutcome> {
    if is_pod_or_job(&resource.kind) {
        return Ok(UpdateOutcome::Skipped);
    }
    let status = get_status(backend, &resource.kind, &resource.name)?;
    match status {
        Status::Unknown => {
            Err(ControllerError::from(CErrKind::UnknownStatus(resource.kind.clone(), resource.name.clone())).into())
        }
        Status::NotExist | Status::Terminating => Ok(UpdateOutcome::NotExist),
        _ => {
            backend.apply(&resource.raw_content)?;
            Ok(UpdateOutcome::Existed)
        }
    }
}

/// Pod/job upgrades delete the existing object first (if present) and
/// re-apply unconditionally; every other kind behaves like `update` except
/// a missing object is created rather than skipped.
pub fn upgrade(backend: &Backend, resource: &Resource) -> Result<UpdateOutcome> {
    if is_pod_or_job(&resource.kind) {
        let status = get_status(backend, &resource.kind, &resource.name)?;
        if status == Status::Unknown {
            return Err(ControllerError::from(CErrKind::UnknownStatus(resource.kind.clone(), resource.name.clone())).into());
        }
        let existed = status != Status::NotExist && status != Status::Terminating;
        if existed {
            backend.delete(&resource.kind, &resource.name)?;
        }
        backend.apply(&resource.raw_content)?;
        return Ok(if existed { UpdateOutcome::Existed } else { UpdateOutcome::NotExist });
    }

    let status = get_status(backend, &resource.kind, &resource.name)?;
    match status {
        Status::Unknown => {
            Err(ControllerError::from(CErrKind::UnknownStatus(resource.kind.clone(), resource.name.clone())).into())
        }
        Status::NotExist | Status::Terminating => {
            backend.apply(&resource.raw_content)?;
            Ok(UpdateOutcome::NotExist)
        }
        _ => {
            backend.apply(&resource.raw_content)?;
            Ok(UpdateOutcome::Existed)
        }
    }
}

/// Poll `pod`/`job` status every 5s until terminal; for `deployment`, defer
/// to a single blocking `rollout status` call.
pub fn wait(backend: &Backend, kind: &str, name: &str) -> Result<WaitOutcome> {
    if kind.eq_ignore_ascii_case("deployment") {
        backend.rollout_status(kind, name)?;
        return Ok(WaitOutcome::Succeeded);
    }
    loop {
        let status = get_status(backend, kind, name)?;
        match status {
            Status::Succeeded => return Ok(WaitOutcome::Succeeded),
            Status::Failed => return Ok(WaitOutcome::Failed),
            Status::NotExist => return Ok(WaitOutcome::NotExist),
            Status::Unknown => return Err(ControllerError::from(CErrKind::UnknownStatus(kind.to_string(), name.to_string())).into()),
            _ => thread::sleep(WAIT_POLL_INTERVAL),
        }
    }
}

/// Stream logs for `pod`, waiting out a `Pending` phase first. Reconnects
/// with `--tail 10` after any non-zero exit from the log stream until one
/// ends cleanly.
pub fn logs(backend: &Backend, pod: &str, container: Option<&str>) -> Result<LogsOutcome> {
    let mut status = get_status(backend, "pod", pod)?;
    match status {
        Status::NotExist | Status::Terminating => return Ok(LogsOutcome::NotExist),
        Status::Unknown => return Err(ControllerError::from(CErrKind::UnknownStatus("pod".to_string(), pod.to_string())).into()),
        _ => {}
    }
    if status == Status::Pending {
        let mut attempts = 0;
        while status == Status::Pending {
            if attempts >= PENDING_POLL_LIMIT {
                return Err(ControllerError::from(CErrKind::Timeout("pod".to_string(), pod.to_string())).into());
            }
            thread::sleep(TERMINATE_POLL_INTERVAL);
            attempts += 1;
            status = get_status(backend, "pod", pod)?;
        }
    }

    let container_name = match container {
        Some(c) => c.to_string(),
        None => backend.first_container_name(pod)?,
    };

    if backend.logs(pod, &container_name, None).is_err() {
        loop {
            if backend.logs(pod, &container_name, Some(10)).is_ok() {
                break;
            }
        }
    }
    Ok(LogsOutcome::Streamed)
}
