//! Process-level configuration for the provisioning API
//!
//! Everything here is read once at startup (CLI flags or environment) and
//! never per-request. Request-scoped data lives in [`crate::provision`].

use serde::Serialize;

use crate::error::Error;
use crate::{Result, NODE_PORT_MAX, NODE_PORT_MIN};

/// How provisioned services are exposed outside the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureMode {
    /// Expose via cluster-wide NodePort numbers on every host
    NodePort,
    /// Expose via an externally provisioned LoadBalancer address
    LoadBalancer,
}

impl ExposureMode {
    /// Parse an exposure mode, coercing anything unrecognized to NodePort.
    ///
    /// Misconfiguration degrades to the default exposure rather than taking
    /// the whole API down; the coercion is logged.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "load-balancer" | "loadbalancer" => Self::LoadBalancer,
            "node-port" | "nodeport" => Self::NodePort,
            other => {
                if !other.is_empty() {
                    tracing::warn!(mode = %other, "unknown exposure mode, using node-port");
                }
                Self::NodePort
            }
        }
    }

    /// The Kubernetes Service `type` this mode maps to
    pub fn service_type(&self) -> &'static str {
        match self {
            Self::NodePort => "NodePort",
            Self::LoadBalancer => "LoadBalancer",
        }
    }

    /// Kebab-case name as it appears in config and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodePort => "node-port",
            Self::LoadBalancer => "load-balancer",
        }
    }
}

impl std::fmt::Display for ExposureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exposure configuration: mode plus optional pinned NodePort numbers
#[derive(Debug, Clone)]
pub struct ExposureConfig {
    /// Exposure mode for every provisioned service
    pub mode: ExposureMode,
    /// Pinned NodePort for the HTTP service port (node-port mode only)
    pub http_node_port: Option<u16>,
    /// Pinned NodePort for the SSH service port (node-port mode only)
    pub ssh_node_port: Option<u16>,
}

impl ExposureConfig {
    /// Validate pinned NodePort numbers against the cluster's allocatable
    /// range. Only enforced in node-port mode; pins are ignored otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.mode != ExposureMode::NodePort {
            return Ok(());
        }
        for (field, value) in [
            ("http_node_port", self.http_node_port),
            ("ssh_node_port", self.ssh_node_port),
        ] {
            if let Some(port) = value {
                if !(NODE_PORT_MIN..=NODE_PORT_MAX).contains(&port) {
                    return Err(Error::validation(format!(
                        "{field} must be within {NODE_PORT_MIN}..{NODE_PORT_MAX}, got {port}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Startup settings shared by the provisioning pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Target namespace for all provisioned objects
    pub namespace: String,
    /// Prefix tag for derived identities (identifies the resource class)
    pub name_prefix: String,
    /// Exposure configuration
    pub exposure: ExposureConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            name_prefix: crate::DEFAULT_NAME_PREFIX.to_string(),
            exposure: ExposureConfig {
                mode: ExposureMode::NodePort,
                http_node_port: Some(crate::DEFAULT_HTTP_NODE_PORT),
                ssh_node_port: Some(crate::DEFAULT_SSH_NODE_PORT),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: operators fat-finger EXPOSURE_MODE; the API must come up
    /// anyway, on the default exposure.
    #[test]
    fn story_unknown_exposure_mode_coerces_to_node_port() {
        assert_eq!(ExposureMode::parse_lenient("node-port"), ExposureMode::NodePort);
        assert_eq!(
            ExposureMode::parse_lenient("load-balancer"),
            ExposureMode::LoadBalancer
        );
        assert_eq!(ExposureMode::parse_lenient("LoadBalancer"), ExposureMode::LoadBalancer);
        assert_eq!(ExposureMode::parse_lenient("ingress"), ExposureMode::NodePort);
        assert_eq!(ExposureMode::parse_lenient(""), ExposureMode::NodePort);
    }

    /// Story: pinned ports at the range boundaries - 30000 and 32767 are the
    /// cluster's inclusive limits, one past either end is rejected.
    #[test]
    fn story_node_port_range_boundaries() {
        let mut config = ExposureConfig {
            mode: ExposureMode::NodePort,
            http_node_port: Some(30000),
            ssh_node_port: Some(32767),
        };
        assert!(config.validate().is_ok());

        config.http_node_port = Some(29999);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("30000..32767"));

        config.http_node_port = Some(30000);
        config.ssh_node_port = Some(32768);
        assert!(config.validate().is_err());
    }

    /// Story: pins are only meaningful for NodePort services; a stale pin in
    /// the environment must not break load-balancer deployments.
    #[test]
    fn story_pins_ignored_in_load_balancer_mode() {
        let config = ExposureConfig {
            mode: ExposureMode::LoadBalancer,
            http_node_port: Some(40000),
            ssh_node_port: None,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn story_exposure_mode_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ExposureMode::NodePort).unwrap(),
            "\"node-port\""
        );
        assert_eq!(
            serde_json::to_string(&ExposureMode::LoadBalancer).unwrap(),
            "\"load-balancer\""
        );
    }

    #[test]
    fn story_default_settings_match_documented_fallbacks() {
        let settings = Settings::default();
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.name_prefix, "client");
        assert_eq!(settings.exposure.http_node_port, Some(30081));
        assert_eq!(settings.exposure.ssh_node_port, Some(30022));
    }
}
