//! Berth - provisioning API for ephemeral SSH-accessible workloads
//!
//! Berth exposes a single synchronous HTTP operation: given a container image
//! reference and an SSH public key, it names, (re)creates, and exposes a
//! single-container workload in a shared Kubernetes cluster, then reports the
//! externally reachable endpoints.
//!
//! # Architecture
//!
//! A request flows through a fixed pipeline:
//! - [`names`] derives a cluster-legal identity from the image reference
//! - [`manifest`] renders the Pod and Service declaratively (pure, no I/O)
//! - [`cluster`] is the narrow control-plane boundary (four operations)
//! - [`provision`] runs cleanup, secret upsert, apply, and endpoint
//!   resolution in order, terminal on first failure
//! - [`endpoints`] reads back the assigned NodePorts or LoadBalancer address
//! - [`api`] is the HTTP surface composing the above
//!
//! All state lives in the cluster; the orchestrator itself is stateless
//! across requests. Re-provisioning a name is delete-then-recreate, never an
//! in-place update.

#![deny(missing_docs)]

pub mod api;
pub mod cluster;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod manifest;
pub mod names;
pub mod provision;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Centralized so the manifest builder, resolver, and CLI defaults stay
// consistent with each other and with test fixtures.

/// Fixed HTTP port every provisioned container serves its application on
pub const APP_PORT: u16 = 8080;

/// Default SSH port inside the container when the request omits one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Fallback pinned NodePort for the HTTP service port
pub const DEFAULT_HTTP_NODE_PORT: u16 = 30081;

/// Fallback pinned NodePort for the SSH service port
pub const DEFAULT_SSH_NODE_PORT: u16 = 30022;

/// Lowest NodePort number the cluster will allocate
pub const NODE_PORT_MIN: u16 = 30000;

/// Highest NodePort number the cluster will allocate
pub const NODE_PORT_MAX: u16 = 32767;

/// Default bind address for the provisioning API
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8088";

/// Default name prefix for derived identities
pub const DEFAULT_NAME_PREFIX: &str = "client";
