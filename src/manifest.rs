//! Declarative manifest rendering for provisioned workloads
//!
//! This module defines the Kubernetes resource types a provisioning request
//! compiles into:
//! - Pod: the single-container workload unit
//! - Service: network exposure for the HTTP and SSH ports
//!
//! Building a [`WorkloadManifest`] is a pure function of its inputs - no
//! cluster calls, no clock, no environment. That isolation is what makes the
//! builder testable without a live cluster, and it keeps the rendered YAML
//! byte-stable for a fixed input (field order follows struct declaration
//! order).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ExposureConfig, ExposureMode};
use crate::error::Error;
use crate::names::DerivedIdentity;
use crate::{Result, APP_PORT};

/// Container name inside every provisioned pod
pub const CONTAINER_NAME: &str = "app";

/// Environment variable carrying the fixed application port.
///
/// The provisioned demo images read `MODEL_PORT` for their HTTP listener, so
/// the name is part of the contract with those containers.
pub const ENV_APP_PORT: &str = "MODEL_PORT";

/// Environment variable carrying the chosen SSH port
pub const ENV_SSH_PORT: &str = "SSH_PORT";

/// Volume name for the mounted SSH credential
pub const SSH_VOLUME_NAME: &str = "ssh-keys";

/// Path the public key is mounted at inside the container
pub const SSH_KEY_MOUNT_PATH: &str = "/home/ubuntu/.ssh/authorized_keys";

/// Secret data key (and subPath) holding the public key
pub const SSH_KEY_DATA_KEY: &str = "authorized_keys";

/// File mode for the mounted key (0644)
const SSH_KEY_FILE_MODE: i32 = 0o644;

// =============================================================================
// Kubernetes Resource Types
// =============================================================================

/// Object metadata (name and labels; namespace is supplied at apply time)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Kubernetes Pod
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: PodSpec,
}

/// Pod spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers
    pub containers: Vec<Container>,
    /// Volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Container spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    pub image: String,
    /// Pull policy
    pub image_pull_policy: String,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Declared container ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    /// Volume mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

/// Environment variable
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Variable value
    pub value: String,
}

/// Container port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port number
    pub container_port: u16,
}

/// Volume mount
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume name
    pub name: String,
    /// Mount path
    pub mount_path: String,
    /// Sub-path within the volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// Volume
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// Secret source
    pub secret: SecretVolumeSource,
}

/// Secret volume source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// Secret name
    pub secret_name: String,
    /// Default file mode
    pub default_mode: i32,
}

/// Kubernetes Service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ServiceSpec,
}

/// Service spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Selector
    pub selector: BTreeMap<String, String>,
    /// Service type (NodePort or LoadBalancer)
    #[serde(rename = "type")]
    pub type_: String,
    /// Ports
    pub ports: Vec<ServicePort>,
}

/// Service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    /// Port name
    pub name: String,
    /// Protocol
    pub protocol: String,
    /// Port number
    pub port: u16,
    /// Target port on the pod
    pub target_port: u16,
    /// Pinned NodePort, when the exposure mode allows one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,
}

// =============================================================================
// Workload Manifest
// =============================================================================

/// Immutable rendered spec for one provisioning request: exactly one Pod and
/// one Service, in that order.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadManifest {
    /// The workload unit
    pub pod: Pod,
    /// The exposing service
    pub service: Service,
}

impl WorkloadManifest {
    /// Compile a request into its two cluster objects.
    ///
    /// Pure: identical inputs produce an identical manifest.
    pub fn build(
        identity: &DerivedIdentity,
        image: &str,
        ssh_port: u16,
        exposure: &ExposureConfig,
    ) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), identity.label.clone());

        let pod = Pod {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            metadata: ObjectMeta {
                name: identity.pod.clone(),
                labels: labels.clone(),
            },
            spec: PodSpec {
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: image.to_string(),
                    // Pull only if absent locally: these are ephemeral demo
                    // workloads recreated often from the same image.
                    image_pull_policy: "IfNotPresent".to_string(),
                    env: vec![
                        EnvVar {
                            name: ENV_APP_PORT.to_string(),
                            value: APP_PORT.to_string(),
                        },
                        EnvVar {
                            name: ENV_SSH_PORT.to_string(),
                            value: ssh_port.to_string(),
                        },
                    ],
                    ports: vec![
                        ContainerPort {
                            container_port: APP_PORT,
                        },
                        ContainerPort {
                            container_port: ssh_port,
                        },
                    ],
                    volume_mounts: vec![VolumeMount {
                        name: SSH_VOLUME_NAME.to_string(),
                        mount_path: SSH_KEY_MOUNT_PATH.to_string(),
                        sub_path: Some(SSH_KEY_DATA_KEY.to_string()),
                    }],
                }],
                volumes: vec![Volume {
                    name: SSH_VOLUME_NAME.to_string(),
                    secret: SecretVolumeSource {
                        secret_name: identity.secret.clone(),
                        default_mode: SSH_KEY_FILE_MODE,
                    },
                }],
            },
        };

        let node_port = |pin: Option<u16>| match exposure.mode {
            ExposureMode::NodePort => pin,
            ExposureMode::LoadBalancer => None,
        };

        let service = Service {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            metadata: ObjectMeta {
                name: identity.service.clone(),
                labels: BTreeMap::new(),
            },
            spec: ServiceSpec {
                selector: labels,
                type_: exposure.mode.service_type().to_string(),
                ports: vec![
                    ServicePort {
                        name: "http".to_string(),
                        protocol: "TCP".to_string(),
                        port: APP_PORT,
                        target_port: APP_PORT,
                        node_port: node_port(exposure.http_node_port),
                    },
                    ServicePort {
                        name: "ssh".to_string(),
                        protocol: "TCP".to_string(),
                        port: ssh_port,
                        target_port: ssh_port,
                        node_port: node_port(exposure.ssh_node_port),
                    },
                ],
            },
        };

        Self { pod, service }
    }

    /// Render the manifest as two YAML documents (Pod first, then Service)
    /// joined by an explicit `---` separator.
    pub fn render(&self) -> Result<String> {
        let pod = serde_yaml::to_string(&self.pod)
            .map_err(|e| Error::serialization(format!("Pod: {e}")))?;
        let service = serde_yaml::to_string(&self.service)
            .map_err(|e| Error::serialization(format!("Service: {e}")))?;
        Ok(format!("{pod}---\n{service}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DerivedIdentity {
        DerivedIdentity::derive_at("docker.io/acme/demo:latest", "client", 0x6543_2100)
    }

    fn node_port_exposure() -> ExposureConfig {
        ExposureConfig {
            mode: ExposureMode::NodePort,
            http_node_port: Some(30081),
            ssh_node_port: Some(30022),
        }
    }

    // =========================================================================
    // Story: The Builder Is Pure
    // =========================================================================

    /// Identical inputs render byte-identical output - the property the
    /// delete-then-apply pipeline relies on for reproducibility.
    #[test]
    fn story_identical_inputs_render_identical_bytes() {
        let id = identity();
        let exposure = node_port_exposure();

        let a = WorkloadManifest::build(&id, "docker.io/acme/demo:latest", 22, &exposure);
        let b = WorkloadManifest::build(&id, "docker.io/acme/demo:latest", 22, &exposure);

        assert_eq!(a, b);
        assert_eq!(a.render().unwrap(), b.render().unwrap());
    }

    // =========================================================================
    // Story: Pod Shape
    // =========================================================================

    #[test]
    fn story_pod_declares_both_ports_and_env() {
        let manifest =
            WorkloadManifest::build(&identity(), "docker.io/acme/demo:latest", 2222, &node_port_exposure());

        let container = &manifest.pod.spec.containers[0];
        assert_eq!(container.name, "app");
        assert_eq!(container.image, "docker.io/acme/demo:latest");
        assert_eq!(container.image_pull_policy, "IfNotPresent");

        let ports: Vec<u16> = container.ports.iter().map(|p| p.container_port).collect();
        assert_eq!(ports, vec![8080, 2222]);

        let env: Vec<(&str, &str)> = container
            .env
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
            .collect();
        assert_eq!(env, vec![("MODEL_PORT", "8080"), ("SSH_PORT", "2222")]);
    }

    #[test]
    fn story_pod_mounts_the_identity_scoped_secret() {
        let id = identity();
        let manifest = WorkloadManifest::build(&id, "img", 22, &node_port_exposure());

        let mount = &manifest.pod.spec.containers[0].volume_mounts[0];
        assert_eq!(mount.mount_path, "/home/ubuntu/.ssh/authorized_keys");
        assert_eq!(mount.sub_path.as_deref(), Some("authorized_keys"));

        let volume = &manifest.pod.spec.volumes[0];
        assert_eq!(volume.name, mount.name);
        assert_eq!(volume.secret.secret_name, id.secret);
        assert_eq!(volume.secret.default_mode, 0o644);
    }

    // =========================================================================
    // Story: Service Shape and NodePort Pinning
    // =========================================================================

    #[test]
    fn story_service_selector_matches_pod_label() {
        let id = identity();
        let manifest = WorkloadManifest::build(&id, "img", 22, &node_port_exposure());

        assert_eq!(
            manifest.service.spec.selector.get("app"),
            manifest.pod.metadata.labels.get("app")
        );
        assert_eq!(
            manifest.service.spec.selector.get("app"),
            Some(&id.label)
        );
    }

    #[test]
    fn story_node_ports_pinned_only_in_node_port_mode() {
        let id = identity();

        let manifest = WorkloadManifest::build(&id, "img", 22, &node_port_exposure());
        assert_eq!(manifest.service.spec.type_, "NodePort");
        assert_eq!(manifest.service.spec.ports[0].node_port, Some(30081));
        assert_eq!(manifest.service.spec.ports[1].node_port, Some(30022));

        let lb = ExposureConfig {
            mode: ExposureMode::LoadBalancer,
            http_node_port: Some(30081),
            ssh_node_port: Some(30022),
        };
        let manifest = WorkloadManifest::build(&id, "img", 22, &lb);
        assert_eq!(manifest.service.spec.type_, "LoadBalancer");
        assert_eq!(manifest.service.spec.ports[0].node_port, None);
        assert_eq!(manifest.service.spec.ports[1].node_port, None);
    }

    #[test]
    fn story_unpinned_ports_left_for_the_cluster_to_assign() {
        let id = identity();
        let exposure = ExposureConfig {
            mode: ExposureMode::NodePort,
            http_node_port: None,
            ssh_node_port: None,
        };
        let manifest = WorkloadManifest::build(&id, "img", 22, &exposure);
        assert_eq!(manifest.service.spec.ports[0].node_port, None);
        assert_eq!(manifest.service.spec.ports[1].node_port, None);

        // And the rendered YAML omits the field entirely
        let yaml = manifest.render().unwrap();
        assert!(!yaml.contains("nodePort"));
    }

    // =========================================================================
    // Story: Rendered Output
    // =========================================================================

    #[test]
    fn story_render_emits_pod_then_service_with_separator() {
        let manifest = WorkloadManifest::build(&identity(), "img", 22, &node_port_exposure());
        let yaml = manifest.render().unwrap();

        let docs: Vec<&str> = yaml.split("---\n").collect();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("kind: Pod"));
        assert!(docs[1].contains("kind: Service"));

        // camelCase wire names, not Rust field names
        assert!(yaml.contains("imagePullPolicy: IfNotPresent"));
        assert!(yaml.contains("containerPort: 8080"));
        assert!(yaml.contains("secretName:"));
        assert!(yaml.contains("targetPort: 22"));
        assert!(yaml.contains("nodePort: 30081"));
    }
}
