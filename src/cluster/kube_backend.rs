//! Native kube-rs implementation of the control-plane boundary
//!
//! Provides kubectl-equivalent operations without shelling out to kubectl.
//! Deletes tolerate 404s, and both the secret upsert and the manifest apply
//! use server-side apply so re-provisioning never fails on "already exists".

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret, Service};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ClusterBackend, ObjectKind};
use crate::error::Error;
use crate::Result;

/// Field manager for server-side apply
const FIELD_MANAGER: &str = "berth";

/// Connection timeout for the API server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout for API calls
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Control-plane access via the Kubernetes API
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a backend from an optional kubeconfig path, falling back to
    /// in-cluster / environment inference.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let mut config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::cluster("connect", format!("failed to read kubeconfig: {e}"))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        Error::cluster("connect", format!("failed to load kubeconfig: {e}"))
                    })?
            }
            None => Config::infer().await.map_err(|e| {
                Error::cluster("connect", format!("failed to infer cluster config: {e}"))
            })?,
        };
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .map_err(|e| Error::cluster("connect", format!("failed to create client: {e}")))?;
        Ok(Self::new(client))
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Delete one object, mapping 404 to success.
async fn delete_ignore_missing<K>(api: Api<K>, name: &str) -> Result<()>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Parse `apiVersion` into (group, version)
fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from a manifest's apiVersion and kind.
///
/// Simple pluralization is sufficient here: the orchestrator only ever
/// applies core-v1 Pods and Services.
fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    let lower = kind.to_lowercase();
    let plural = if lower.ends_with('s') {
        format!("{lower}es")
    } else {
        format!("{lower}s")
    };
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural,
    }
}

#[async_trait]
impl ClusterBackend for KubeBackend {
    async fn delete_if_exists(&self, kind: ObjectKind, name: &str, namespace: &str) -> Result<()> {
        debug!(kind = %kind, name = %name, namespace = %namespace, "deleting if exists");
        match kind {
            ObjectKind::Pod => delete_ignore_missing(self.api::<Pod>(namespace), name).await,
            ObjectKind::Service => {
                delete_ignore_missing(self.api::<Service>(namespace), name).await
            }
            ObjectKind::Secret => delete_ignore_missing(self.api::<Secret>(namespace), name).await,
        }
    }

    async fn upsert_secret(
        &self,
        name: &str,
        key: &str,
        value: &str,
        namespace: &str,
    ) -> Result<()> {
        debug!(name = %name, namespace = %namespace, "upserting secret");
        let secret = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": name },
            "type": "Opaque",
            "stringData": { key: value },
        });
        let api = self.api::<Secret>(namespace);
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&secret),
        )
        .await?;
        Ok(())
    }

    async fn apply_manifest(&self, manifest: &str, namespace: &str) -> Result<()> {
        for doc in manifest.split("\n---") {
            let doc = doc.trim();
            // Skip empty or comment-only documents
            if !doc.contains("apiVersion") {
                continue;
            }

            let value: serde_json::Value = serde_yaml::from_str(doc)
                .map_err(|e| Error::serialization(format!("invalid manifest YAML: {e}")))?;

            let api_version = value
                .get("apiVersion")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::serialization("manifest missing apiVersion"))?;
            let kind = value
                .get("kind")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::serialization("manifest missing kind"))?;
            let name = value
                .pointer("/metadata/name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::serialization("manifest missing metadata.name"))?;

            let ar = build_api_resource(api_version, kind);
            let api: Api<DynamicObject> =
                Api::namespaced_with(self.client.clone(), namespace, &ar);
            debug!(kind = %kind, name = %name, namespace = %namespace, "applying manifest");
            api.patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&value),
            )
            .await?;
        }
        Ok(())
    }

    async fn get_object(
        &self,
        kind: ObjectKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<serde_json::Value>> {
        let ar = build_api_resource("v1", kind.as_str());
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        match api.get(name).await {
            Ok(obj) => {
                let value = serde_json::to_value(&obj)
                    .map_err(|e| Error::serialization(format!("{kind}/{name}: {e}")))?;
                Ok(Some(value))
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
