use std::collections::BTreeMap;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use thiserror::Error;

/// Change type carried by every watch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
    #[serde(other)]
    Unknown,
}

/// Read-only snapshot of a pod as seen in a watch record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub labels: Option<BTreeMap<String, String>>,
}

impl PodRecord {
    pub fn new(name: impl Into<String>, labels: Option<BTreeMap<String, String>>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    fn from_metadata(metadata: ObjectMeta) -> Self {
        Self {
            name: metadata.name.unwrap_or_else(|| "unknown".to_string()),
            labels: metadata.labels,
        }
    }
}

/// A single decoded record of the pod watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: String,
    pub change_type: ChangeType,
    pub object: PodRecord,
}

#[derive(Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    change_type: ChangeType,
    object: RawObject,
}

#[derive(Deserialize)]
struct RawObject {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<ObjectMeta>,
}

impl WatchEvent {
    /// Decodes one newline-delimited watch record.
    ///
    /// # Errors
    ///
    /// - [`WatchError::MalformedRecord`] if the line is not JSON or lacks `type`/`object`
    pub fn parse(line: &str) -> Result<Self, Report<WatchError>> {
        let raw: RawWatchEvent =
            serde_json::from_str(line).change_context(WatchError::MalformedRecord)?;

        Ok(Self {
            kind: raw.object.kind.unwrap_or_default(),
            change_type: raw.change_type,
            object: PodRecord::from_metadata(raw.object.metadata.unwrap_or_default()),
        })
    }

    /// A pod deletion is the only record that is forwarded to the coordinator.
    pub fn is_pod_deletion(&self) -> bool {
        self.kind == "Pod" && self.change_type == ChangeType::Deleted
    }
}

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, Error)]
pub enum KubernetesError {
    #[error("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
}

/// Errors raised by the pod watch stream.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to subscribe to pod watch: {message}")]
    SubscribeFailed { message: String },
    #[error("Pod watch stream failed: {message}")]
    StreamFailed { message: String },
    #[error("Malformed watch record")]
    MalformedRecord,
}

/// Errors raised while listing sentinel endpoints.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to look up endpoints of service {service}")]
    LookupFailed { service: String },
    #[error("Endpoints of service {service} are invalid: {reason}")]
    InvalidEndpoints { service: String, reason: String },
}
