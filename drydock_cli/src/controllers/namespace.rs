//! Create/Exists/Delete over the `namespace` kind. `-n` is never appended —
//! the namespace itself is the subject — which `Backend` already handles by
//! routing these calls through its without-namespace argument builder.

use drydock_core::status::Status;

use super::{get_status, resolve_status, CErrKind, ControllerError, Result};
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

pub fn create(backend: &Backend, name: &str) -> Result<CreateOutcome> {
    let status = resolve_status(backend, "namespace", name)?;
    match status {
        Status::Unknown => Err(ControllerError::from(CErrKind::UnknownStatus("namespace".to_string(), name.to_string())).into()),
        Status::NotExist => {
            backend.create_namespace(name)?;
            Ok(CreateOutcome::Created)
        }
        _ => Ok(CreateOutcome::Exists),
    }
}

pub fn exists(backend: &Backend, name: &str) -> Result<bool> {
    let status = get_status(backend, "namespace", name)?;
    match status {
        Status::Unknown => Err(ControllerError::from(CErrKind::UnknownStatus("namespace".to_string(), name.to_string())).into()),
        Status::NotExist => Ok(false),
        _ => Ok(true),
    }
}

pub fn delete(backend: &Backend, name: &str) -> Result<DeleteOutcome> {
    let status = get_status(backend, "namespace", name)?;
    match status {
        Status::Unknown => Err(ControllerError::from(CErrKind::UnknownStatus("namespace".to_string(), name.to_string())).into()),
        Status::NotExist | Status::Terminating => Ok(DeleteOutcome::NotExisted),
        _ => {
            backend.delete_namespace(name)?;
            Ok(DeleteOutcome::Existed)
        }
    }
}
