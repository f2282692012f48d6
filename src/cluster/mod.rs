//! Cluster control-plane boundary
//!
//! The orchestrator touches the cluster through exactly four operations,
//! expressed as a trait so the pipeline can be exercised against a recording
//! mock in tests and so a different transport could substitute without
//! touching orchestration logic. The production implementation,
//! [`KubeBackend`], talks to the API server natively with kube-rs.

mod kube_backend;

pub use kube_backend::KubeBackend;

use async_trait::async_trait;

use crate::Result;

/// The object kinds the orchestrator manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Workload unit
    Pod,
    /// Network-exposing service
    Service,
    /// Credential store
    Secret,
}

impl ObjectKind {
    /// Kubernetes kind string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Service => "Service",
            Self::Secret => "Secret",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Narrow interface to the cluster control plane.
///
/// Implementations must make every operation idempotent from the caller's
/// perspective: deleting a missing object succeeds, upserting an existing
/// secret overwrites it, applying an existing object updates it.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Delete an object, treating "not found" as success.
    async fn delete_if_exists(&self, kind: ObjectKind, name: &str, namespace: &str) -> Result<()>;

    /// Create or overwrite an Opaque secret storing `value` under `key`.
    async fn upsert_secret(
        &self,
        name: &str,
        key: &str,
        value: &str,
        namespace: &str,
    ) -> Result<()>;

    /// Apply a multi-document YAML manifest into the namespace.
    async fn apply_manifest(&self, manifest: &str, namespace: &str) -> Result<()>;

    /// Fetch an object as structured data, or `None` if it does not exist.
    async fn get_object(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<serde_json::Value>>;
}
