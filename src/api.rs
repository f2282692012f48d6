//! HTTP API surface
//!
//! Two routes: `POST /provision` runs the pipeline, `GET /healthz` answers
//! liveness probes. All domain errors map through
//! [`Error`](crate::Error)'s `IntoResponse` impl, so handlers just
//! return `Result`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::provision::{ProvisionRequest, ProvisionResult, Provisioner};
use crate::Result;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// The provisioning pipeline
    pub provisioner: Arc<Provisioner>,
}

/// Build the API router over the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/provision", post(provision))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// `POST /provision`: run the full pipeline for one request
async fn provision(
    State(state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<Json<ProvisionResult>> {
    info!(image = %request.image, "provision request received");
    let result = state.provisioner.provision(&request).await?;
    Ok(Json(result))
}

/// `GET /healthz`: liveness probe
async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use async_trait::async_trait;

    use crate::cluster::{ClusterBackend, ObjectKind};
    use crate::config::Settings;

    /// Backend that accepts everything and reports no live service
    struct NullBackend;

    #[async_trait]
    impl ClusterBackend for NullBackend {
        async fn delete_if_exists(
            &self,
            _kind: ObjectKind,
            _name: &str,
            _namespace: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn upsert_secret(
            &self,
            _name: &str,
            _key: &str,
            _value: &str,
            _namespace: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn apply_manifest(&self, _manifest: &str, _namespace: &str) -> Result<()> {
            Ok(())
        }

        async fn get_object(
            &self,
            _kind: ObjectKind,
            _name: &str,
            _namespace: &str,
        ) -> Result<Option<serde_json::Value>> {
            Ok(None)
        }
    }

    fn app() -> Router {
        let provisioner = Arc::new(Provisioner::new(Arc::new(NullBackend), Settings::default()));
        router(AppState { provisioner })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn story_healthz_answers_ok() {
        let response = app()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Story: a well-formed request comes back 200 with the names and
    /// connection ports the caller needs.
    #[tokio::test]
    async fn story_provision_returns_names_and_ports() {
        let request = Request::post("/provision")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "image": "docker.io/acme/demo:latest",
                    "ssh_public_key": "ssh-ed25519 AAAA user@host"
                })
                .to_string(),
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert!(json["pod_name"].as_str().unwrap().ends_with("-pod"));
        assert!(json["service_name"].as_str().unwrap().ends_with("-svc"));
        assert!(json["secret_name"].as_str().unwrap().ends_with("-ssh"));
        assert_eq!(json["namespace"], "default");
        assert_eq!(json["app_port"], 8080);
        assert_eq!(json["ssh_port"], 22);
        assert_eq!(json["connect_http_port"], 30081);
        assert_eq!(json["connect_ssh_port"], 30022);
    }

    /// Story: a blank key is a 400 with a JSON error body, not a 500.
    #[tokio::test]
    async fn story_invalid_request_maps_to_bad_request() {
        let request = Request::post("/provision")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "image": "docker.io/acme/demo:latest",
                    "ssh_public_key": "   "
                })
                .to_string(),
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("ssh_public_key"));
    }
}
