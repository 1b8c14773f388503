//! Kubernetes integration module.
//!
//! The main components are:
//! - [`WatchStream`]: keeps a filtered pod watch open and forwards deletions
//! - [`LabelMatcher`]: re-checks a deleted pod against the monitored group
//! - [`SentinelDirectory`]: lists the sentinels behind the sentinel service

pub mod endpoints;
pub mod labels;
pub mod pod_watcher;
pub mod types;

pub use endpoints::KubeSentinelDirectory;
pub use endpoints::SentinelDirectory;
pub use endpoints::SentinelEndpoint;
pub use labels::LabelMatcher;
pub use pod_watcher::EventSource;
pub use pod_watcher::KubeEventSource;
pub use pod_watcher::ShutdownHandle;
pub use pod_watcher::WatchStream;
pub use types::DirectoryError;
pub use types::KubernetesError;
pub use types::PodRecord;
pub use types::WatchError;
