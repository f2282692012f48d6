//! The provisioning pipeline
//!
//! One request walks a fixed sequence: validate, derive names, tear down the
//! previous Service, Pod, and credential Secret, upsert the fresh SSH
//! credential, apply the manifest, then read back the live Service to report
//! reachable endpoints.
//!
//! The pipeline does not roll back on partial failure. A failed apply leaves
//! the secret in place; the next request for the same identity overwrites
//! everything via the delete-then-apply cycle, so cleanup is deferred to the
//! retry rather than attempted mid-error.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cluster::{ClusterBackend, ObjectKind};
use crate::config::{ExposureMode, Settings};
use crate::endpoints::{self, Endpoints, ServiceView};
use crate::error::Error;
use crate::manifest::{WorkloadManifest, SSH_KEY_DATA_KEY};
use crate::names::DerivedIdentity;
use crate::{
    Result, APP_PORT, DEFAULT_HTTP_NODE_PORT, DEFAULT_SSH_NODE_PORT, DEFAULT_SSH_PORT,
};

/// A request to provision one workload
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    /// Full image reference to run
    #[serde(alias = "container_img_url")]
    pub image: String,
    /// SSH public key granted access to the workload
    pub ssh_public_key: String,
    /// SSH daemon port inside the container (defaults to 22)
    #[serde(default)]
    pub ssh_port: Option<u16>,
}

/// Everything a caller needs to reach the workload it just provisioned
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionResult {
    /// Name of the created Pod
    pub pod_name: String,
    /// Name of the created Service
    pub service_name: String,
    /// Name of the Secret holding the caller's public key
    pub secret_name: String,
    /// Namespace everything landed in
    pub namespace: String,
    /// In-cluster application port
    pub app_port: u16,
    /// In-cluster SSH port
    pub ssh_port: u16,
    /// How the service is exposed
    pub exposure: ExposureMode,
    /// External port for HTTP (node-port mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_http_port: Option<u16>,
    /// External port for SSH (node-port mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_ssh_port: Option<u16>,
    /// External address (load-balancer mode; absent while assignment is
    /// pending)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_address: Option<String>,
}

/// Orchestrates provisioning requests against a cluster backend.
///
/// Requests for distinct identities run concurrently; requests colliding on
/// the same derived identity serialize on a per-label lock so interleaved
/// delete/apply sequences cannot corrupt each other.
pub struct Provisioner {
    backend: Arc<dyn ClusterBackend>,
    settings: Settings,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Provisioner {
    /// Create a provisioner over the given backend and settings
    pub fn new(backend: Arc<dyn ClusterBackend>, settings: Settings) -> Self {
        Self {
            backend,
            settings,
            locks: DashMap::new(),
        }
    }

    /// The settings this provisioner was started with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the full provisioning pipeline for one request.
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionResult> {
        let image = request.image.trim();
        if image.is_empty() {
            return Err(Error::validation("image is required"));
        }
        let ssh_key = request.ssh_public_key.trim();
        if ssh_key.is_empty() {
            return Err(Error::validation("ssh_public_key is required"));
        }
        let ssh_port = request.ssh_port.unwrap_or(DEFAULT_SSH_PORT);
        if ssh_port == 0 {
            return Err(Error::validation("ssh_port must be nonzero"));
        }
        if ssh_port == APP_PORT {
            // Both the Pod's containerPorts and the Service's two ports
            // would collide, and the API server rejects that at apply time.
            return Err(Error::validation(format!(
                "ssh_port must differ from the application port {APP_PORT}"
            )));
        }
        self.settings.exposure.validate()?;

        let identity = DerivedIdentity::derive(image, &self.settings.name_prefix);
        let namespace = &self.settings.namespace;
        info!(
            label = %identity.label,
            namespace = %namespace,
            image = %image,
            "provisioning workload"
        );

        let lock = self
            .locks
            .entry(identity.label.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let outcome = {
            let _guard = lock.lock().await;
            self.apply_cycle(&identity, image, ssh_key, ssh_port, namespace)
                .await
        };
        drop(lock);
        // Reap the lock entry unless another request for the same label still
        // holds a clone; that request reaps on its own way out. Labels carry
        // a per-second suffix, so without this the table grows per request.
        self.locks
            .remove_if(&identity.label, |_, held| Arc::strong_count(held) == 1);

        let endpoints = outcome?;
        info!(pod = %identity.pod, service = %identity.service, "workload provisioned");

        let (connect_http_port, connect_ssh_port, external_address) = match endpoints {
            Endpoints::NodePorts { http, ssh } => (Some(http), Some(ssh), None),
            Endpoints::LoadBalancer { address } => (None, None, address),
        };

        Ok(ProvisionResult {
            pod_name: identity.pod,
            service_name: identity.service,
            secret_name: identity.secret,
            namespace: namespace.clone(),
            app_port: APP_PORT,
            ssh_port,
            exposure: self.settings.exposure.mode,
            connect_http_port,
            connect_ssh_port,
            external_address,
        })
    }

    /// One locked delete-then-apply cycle, returning the resolved endpoints.
    async fn apply_cycle(
        &self,
        identity: &DerivedIdentity,
        image: &str,
        ssh_key: &str,
        ssh_port: u16,
        namespace: &str,
    ) -> Result<Endpoints> {
        // Service before Pod, so the selector stops routing before the
        // workload goes away; the superseded credential goes with them.
        self.backend
            .delete_if_exists(ObjectKind::Service, &identity.service, namespace)
            .await
            .map_err(|e| e.in_step("cleanup"))?;
        self.backend
            .delete_if_exists(ObjectKind::Pod, &identity.pod, namespace)
            .await
            .map_err(|e| e.in_step("cleanup"))?;
        self.backend
            .delete_if_exists(ObjectKind::Secret, &identity.secret, namespace)
            .await
            .map_err(|e| e.in_step("cleanup"))?;

        self.backend
            .upsert_secret(&identity.secret, SSH_KEY_DATA_KEY, ssh_key, namespace)
            .await
            .map_err(|e| e.in_step("secret"))?;

        let manifest = WorkloadManifest::build(identity, image, ssh_port, &self.settings.exposure);
        let rendered = manifest.render().map_err(|e| e.in_step("apply"))?;
        self.backend
            .apply_manifest(&rendered, namespace)
            .await
            .map_err(|e| e.in_step("apply"))?;

        Ok(self.resolve_endpoints(identity, namespace).await)
    }

    /// Read back the live Service and resolve reachable endpoints.
    ///
    /// Failures here never fail the request: the objects are already applied,
    /// so a read hiccup degrades to the pinned fallback ports (or a pending
    /// load-balancer address) with a warning.
    async fn resolve_endpoints(&self, identity: &DerivedIdentity, namespace: &str) -> Endpoints {
        let view = match self
            .backend
            .get_object(ObjectKind::Service, &identity.service, namespace)
            .await
        {
            Ok(Some(value)) => ServiceView::from_object(value),
            Ok(None) => {
                warn!(service = %identity.service, "service not visible after apply");
                None
            }
            Err(e) => {
                warn!(service = %identity.service, error = %e, "service read-back failed");
                None
            }
        };

        let exposure = &self.settings.exposure;
        endpoints::resolve(
            view.as_ref(),
            exposure,
            exposure.http_node_port.unwrap_or(DEFAULT_HTTP_NODE_PORT),
            exposure.ssh_node_port.unwrap_or(DEFAULT_SSH_NODE_PORT),
        )
    }
}
