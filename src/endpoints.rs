//! Typed read-back of live Service state
//!
//! The control plane returns full Service objects; the orchestrator only
//! cares about two slivers of them: assigned NodePort numbers and the
//! LoadBalancer ingress address. Rather than walking raw JSON, those slivers
//! are deserialized into explicit views with optional fields standing in for
//! "not yet assigned" states.

use serde::Deserialize;

use crate::config::{ExposureConfig, ExposureMode};

/// The part of a live Service the resolver reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    /// Declared spec, as assigned by the control plane
    #[serde(default)]
    pub spec: ServiceSpecView,
    /// Status, populated asynchronously for LoadBalancer services
    #[serde(default)]
    pub status: ServiceStatusView,
}

/// Spec view: just the port list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpecView {
    /// Declared ports with any assigned NodePort numbers
    #[serde(default)]
    pub ports: Vec<ServicePortView>,
}

/// One declared service port
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePortView {
    /// Port name (`http` or `ssh` for provisioned services)
    #[serde(default)]
    pub name: Option<String>,
    /// Assigned NodePort, absent until the control plane allocates one
    #[serde(default)]
    pub node_port: Option<u16>,
}

/// Status view: LoadBalancer ingress only
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatusView {
    /// LoadBalancer state
    #[serde(default)]
    pub load_balancer: LoadBalancerView,
}

/// LoadBalancer status
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerView {
    /// Ingress points, empty until the external provider assigns one
    #[serde(default)]
    pub ingress: Vec<IngressView>,
}

/// One LoadBalancer ingress point
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressView {
    /// Assigned IP, if the provider hands out addresses
    #[serde(default)]
    pub ip: Option<String>,
    /// Assigned hostname, if the provider hands out DNS names
    #[serde(default)]
    pub hostname: Option<String>,
}

impl ServiceView {
    /// Parse a view out of a raw object fetched from the control plane.
    ///
    /// Unknown fields are ignored; missing spec/status collapse to empty
    /// views rather than errors.
    pub fn from_object(value: serde_json::Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// The assigned NodePort for a named port, if any.
    pub fn node_port(&self, name: &str) -> Option<u16> {
        self.spec
            .ports
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .and_then(|p| p.node_port)
    }

    /// The external LoadBalancer address, preferring IPs over hostnames.
    /// `None` means the provider has not published one yet.
    pub fn external_address(&self) -> Option<String> {
        let ingress = self.status.load_balancer.ingress.first()?;
        ingress.ip.clone().or_else(|| ingress.hostname.clone())
    }
}

/// Externally reachable endpoints for one provisioned workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoints {
    /// Node-port exposure: the two cluster-wide port numbers to connect to
    NodePorts {
        /// External port routing to the application port
        http: u16,
        /// External port routing to the SSH port
        ssh: u16,
    },
    /// Load-balancer exposure: address is `None` while assignment is pending
    LoadBalancer {
        /// Assigned IP or hostname, once published
        address: Option<String>,
    },
}

/// Resolve the reachable endpoints from the live service state.
///
/// Node-port mode falls back to the pinned values when the read raced the
/// control plane's allocation (or the read failed entirely, `view` =
/// `None`). Load-balancer mode reports whatever address is published so
/// far; a pending assignment is not an error.
pub fn resolve(
    view: Option<&ServiceView>,
    exposure: &ExposureConfig,
    fallback_http: u16,
    fallback_ssh: u16,
) -> Endpoints {
    match exposure.mode {
        ExposureMode::NodePort => Endpoints::NodePorts {
            http: view
                .and_then(|v| v.node_port("http"))
                .unwrap_or(fallback_http),
            ssh: view
                .and_then(|v| v.node_port("ssh"))
                .unwrap_or(fallback_ssh),
        },
        ExposureMode::LoadBalancer => Endpoints::LoadBalancer {
            address: view.and_then(|v| v.external_address()),
        },
    }
}
