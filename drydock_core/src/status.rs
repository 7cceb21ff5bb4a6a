//! The status lattice and the classifiers that map raw backend responses
//! (YAML returned by `kubectl get ... -o yaml`) onto it.
//!
//! Classification never talks to the backend directly: it is a pure function
//! of the response text and resource kind, which keeps it trivially testable
//! with fixture YAML.

use serde_derive::Deserialize;

/// The status lattice. `Unknown` is a genuine error signal, not a default —
/// every branch that can't place a resource into one of the other six
/// variants must surface it as an error rather than quietly assume `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unknown,
    NotExist,
    Pending,
    Active,
    Terminating,
    Succeeded,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed)
    }
}

#[derive(Debug, Deserialize, Default)]
struct NonPodInfo {
    status: Option<NonPodStatus>,
}

#[derive(Debug, Deserialize, Default)]
struct NonPodStatus {
    #[serde(default)]
    phase: String,
}

#[derive(Debug, Deserialize, Default)]
struct PodInfo {
    #[serde(default)]
    metadata: PodMetadata,
    status: Option<PodStatus>,
}

#[derive(Debug, Deserialize, Default)]
struct PodMetadata {
    #[serde(default, rename = "deletionTimestamp")]
    deletion_timestamp: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PodStatus {
    #[serde(default)]
    phase: String,
}

#[derive(Debug, Deserialize, Default)]
struct JobInfo {
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize, Default)]
struct JobStatus {
    #[serde(default)]
    conditions: Vec<JobCondition>,
}

#[derive(Debug, Deserialize, Default)]
struct JobCondition {
    #[serde(default)]
    #[serde(rename = "type")]
    type_: String,
}

/// Classify a non-pod, non-job resource (configmaps, services, deployments, ...).
///
/// A resource with no `status` section at all (configmaps) is `Active`.
pub fn classify_non_pod(yaml: &str) -> Status {
    let info: NonPodInfo = match serde_yaml::from_str(yaml) {
        Ok(i) => i,
        Err(_) => return Status::Unknown,
    };
    match info.status {
        None => Status::Active,
        Some(s) => match s.phase.as_str() {
            "Active" | "" => Status::Active,
            "Terminating" => Status::Terminating,
            _ => Status::Unknown,
        },
    }
}

/// Classify a pod from `phase` and `metadata.deletionTimestamp`.
pub fn classify_pod(yaml: &str) -> Status {
    let info: PodInfo = match serde_yaml::from_str(yaml) {
        Ok(i) => i,
        Err(_) => return Status::Unknown,
    };
    let deleting = info.metadata.deletion_timestamp.is_some();
    let phase = info.status.map(|s| s.phase).unwrap_or_default();
    match (phase.as_str(), deleting) {
        ("Pending", false) => Status::Pending,
        ("Pending", true) => Status::Terminating,
        ("Running", false) => Status::Active,
        ("Running", true) => Status::Terminating,
        ("Succeeded", _) => Status::Succeeded,
        ("Failed", _) => Status::Failed,
        _ => Status::Unknown,
    }
}

/// Classify a job from its `status.conditions` (no conditions means still running).
pub fn classify_job(yaml: &str) -> Status {
    let info: JobInfo = match serde_yaml::from_str(yaml) {
        Ok(i) => i,
        Err(_) => return Status::Unknown,
    };
    let conditions = match info.status {
        Some(s) => s.conditions,
        None => return Status::Active,
    };
    match conditions.first() {
        None => Status::Active,
        Some(c) if c.type_ == "Complete" || c.type_ == "SuccessCriteriaMet" => Status::Succeeded,
        Some(c) if c.type_ == "Failed" => Status::Failed,
        Some(_) => Status::Unknown,
    }
}

/// Dispatch to the right classifier for `kind`, given a successful backend
/// response body. Callers are responsible for mapping a `(NotFound)` stderr
/// substring to `Status::NotExist` before reaching here.
pub fn classify(kind: &str, yaml: &str) -> Status {
    match kind.to_lowercase().as_str() {
        "pod" => classify_pod(yaml),
        "job" => classify_job(yaml),
        _ => classify_non_pod(yaml),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configmap_with_no_status_is_active() {
        let yaml = "apiVersion: v1\nkind: ConfigMap\ndata:\n  a: b\n";
        assert_eq!(classify_non_pod(yaml), Status::Active);
    }

    #[test]
    fn deployment_terminating() {
        let yaml = "status:\n  phase: Terminating\n";
        assert_eq!(classify_non_pod(yaml), Status::Terminating);
    }

    #[test]
    fn deployment_unknown_phase() {
        let yaml = "status:\n  phase: Degraded\n";
        assert_eq!(classify_non_pod(yaml), Status::Unknown);
    }

    #[test]
    fn pod_pending_not_deleting() {
        let yaml = "metadata: {}\nstatus:\n  phase: Pending\n";
        assert_eq!(classify_pod(yaml), Status::Pending);
    }

    #[test]
    fn pod_pending_deleting_is_terminating() {
        let yaml = "metadata:\n  deletionTimestamp: \"2020-01-01T00:00:00Z\"\nstatus:\n  phase: Pending\n";
        assert_eq!(classify_pod(yaml), Status::Terminating);
    }

    #[test]
    fn pod_running_deleting_is_terminating() {
        let yaml = "metadata:\n  deletionTimestamp: \"2020-01-01T00:00:00Z\"\nstatus:\n  phase: Running\n";
        assert_eq!(classify_pod(yaml), Status::Terminating);
    }

    #[test]
    fn pod_succeeded() {
        let yaml = "metadata: {}\nstatus:\n  phase: Succeeded\n";
        assert_eq!(classify_pod(yaml), Status::Succeeded);
    }

    #[test]
    fn job_no_conditions_is_active() {
        let yaml = "status: {}\n";
        assert_eq!(classify_job(yaml), Status::Active);
    }

    #[test]
    fn job_complete_condition() {
        let yaml = "status:\n  conditions:\n  - type: Complete\n";
        assert_eq!(classify_job(yaml), Status::Succeeded);
    }

    #[test]
    fn job_success_criteria_met() {
        let yaml = "status:\n  conditions:\n  - type: SuccessCriteriaMet\n";
        assert_eq!(classify_job(yaml), Status::Succeeded);
    }

    #[test]
    fn job_failed_condition() {
        let yaml = "status:\n  conditions:\n  - type: Failed\n";
        assert_eq!(classify_job(yaml), Status::Failed);
    }
}
