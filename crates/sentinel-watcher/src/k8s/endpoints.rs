use std::fmt;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Endpoints;
use kube::Api;
use kube::Client;

use crate::k8s::types::DirectoryError;

/// Address of one sentinel process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelEndpoint {
    pub address: String,
    pub port: u16,
}

impl SentinelEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for SentinelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Looks up the sentinels that are currently serving.
#[async_trait]
pub trait SentinelDirectory: Send + Sync {
    async fn list_sentinels(&self) -> Result<Vec<SentinelEndpoint>, Report<DirectoryError>>;
}

/// Reads sentinel addresses from the `Endpoints` object backing the sentinel service.
pub struct KubeSentinelDirectory {
    api: Api<Endpoints>,
    service: String,
    fallback_port: u16,
}

impl KubeSentinelDirectory {
    pub fn new(client: Client, namespace: &str, service: String, fallback_port: u16) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            service,
            fallback_port,
        }
    }
}

#[async_trait]
impl SentinelDirectory for KubeSentinelDirectory {
    async fn list_sentinels(&self) -> Result<Vec<SentinelEndpoint>, Report<DirectoryError>> {
        let endpoints = self
            .api
            .get(&self.service)
            .await
            .change_context_lazy(|| DirectoryError::LookupFailed {
                service: self.service.clone(),
            })?;

        sentinels_from_endpoints(&self.service, &endpoints, self.fallback_port)
    }
}

/// Flattens every address of every subset, in order, pairing each with the
/// first port of its subset. Subsets without ports use `fallback_port`.
///
/// # Errors
///
/// - [`DirectoryError::InvalidEndpoints`] if there are no subsets, a subset
///   has no addresses, or a port is out of range
pub fn sentinels_from_endpoints(
    service: &str,
    endpoints: &Endpoints,
    fallback_port: u16,
) -> Result<Vec<SentinelEndpoint>, Report<DirectoryError>> {
    let invalid = |reason: String| {
        Report::new(DirectoryError::InvalidEndpoints {
            service: service.to_string(),
            reason,
        })
    };

    let subsets = endpoints
        .subsets
        .as_ref()
        .ok_or_else(|| invalid("no subsets".to_string()))?;

    let mut sentinels = Vec::new();
    for (index, subset) in subsets.iter().enumerate() {
        let addresses = subset
            .addresses
            .as_ref()
            .ok_or_else(|| invalid(format!("subset {index} has no addresses")))?;

        let port = match subset.ports.as_ref().and_then(|ports| ports.first()) {
            Some(port) => u16::try_from(port.port)
                .map_err(|_| invalid(format!("subset {index} has invalid port {}", port.port)))?,
            None => fallback_port,
        };

        sentinels.extend(
            addresses
                .iter()
                .map(|address| SentinelEndpoint::new(address.ip.clone(), port)),
        );
    }

    Ok(sentinels)
}
