//! Label policy shared by the server-side selector and the local re-check.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::error;

use crate::k8s::types::PodRecord;

const ROLE_LABEL: &str = "role";

/// Decides whether a pod belongs to the monitored app/release/role group.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    required: BTreeMap<String, String>,
    roles: BTreeSet<String>,
}

impl LabelMatcher {
    pub fn new(app: &str, release: &str, roles: impl IntoIterator<Item = String>) -> Self {
        let required = BTreeMap::from([
            ("app".to_string(), app.to_string()),
            ("release".to_string(), release.to_string()),
        ]);
        Self {
            required,
            roles: roles.into_iter().collect(),
        }
    }

    /// Renders the selector used to pre-filter the watch on the API server,
    /// e.g. `app=redis-ha,release=r1,role in (sentinel,slave)`.
    ///
    /// Requirements with an empty expected value are left out.
    pub fn label_selector(&self) -> String {
        let mut selectors: Vec<String> = self
            .required
            .iter()
            .filter(|(_, expected)| !expected.is_empty())
            .map(|(key, expected)| format!("{key}={expected}"))
            .collect();

        let roles: Vec<&str> = self.roles.iter().map(String::as_str).collect();
        selectors.push(format!("{ROLE_LABEL} in ({})", roles.join(",")));
        selectors.join(",")
    }

    /// Re-checks a pod against the monitored group.
    ///
    /// A configured label that is absent from the pod does not reject it;
    /// only a conflicting value does. The `role` label is mandatory.
    pub fn matches(&self, pod: &PodRecord) -> bool {
        let labels = match &pod.labels {
            Some(labels) if !labels.is_empty() => labels,
            _ => {
                error!(pod_name = %pod.name, "pod data invalid: no labels");
                return false;
            }
        };

        let conflicting = self.required.iter().any(|(key, expected)| {
            !expected.is_empty() && labels.get(key).is_some_and(|actual| actual != expected)
        });
        if conflicting {
            return false;
        }

        labels
            .get(ROLE_LABEL)
            .is_some_and(|role| self.roles.contains(role))
    }
}
